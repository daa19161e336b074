/// Per-execution scratch directories
///
/// Each stale job gets a fresh directory named after its label. The
/// directory is removed when the guard is closed or dropped, so it cannot
/// outlive the execution even if the callback fails or panics.
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use super::error::{JobError, Result};

pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Create `<root>/<label>-XXXXXX`
    pub fn create(root: &Path, label: &str) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| JobError::io(root, e))?;

        let prefix = format!("{}-", sanitize_label(label));
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(root)
            .map_err(|e| JobError::io(root, e))?;
        let path = dir.path().to_path_buf();

        debug!(operation = "scratch", path = %path.display(), "created scratch directory");

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now, reporting failures
    pub fn close(mut self) -> Result<()> {
        match self.dir.take() {
            Some(dir) => dir.close().map_err(|e| JobError::io(&self.path, e)),
            None => Ok(()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(
                    operation = "scratch",
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove scratch directory"
                );
            }
        }
    }
}

/// Keep labels usable as a file name prefix
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scratch_removed_on_close() {
        let root = tempfile::TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), "injected").unwrap();
        let path = scratch.path().to_path_buf();

        fs::write(path.join("injected.js"), "bundle").unwrap();
        assert!(path.is_dir());

        scratch.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let root = tempfile::TempDir::new().unwrap();
        let path = {
            let scratch = ScratchDir::create(root.path(), "injected").unwrap();
            fs::create_dir_all(scratch.path().join("nested/deeper")).unwrap();
            scratch.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_names_unique_and_prefixed() {
        let root = tempfile::TempDir::new().unwrap();
        let a = ScratchDir::create(root.path(), "types").unwrap();
        let b = ScratchDir::create(root.path(), "types").unwrap();

        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("types-"));
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label(""), "job");
        assert_eq!(sanitize_label("src/generated"), "src-generated");
        assert_eq!(sanitize_label("version_ts"), "version_ts");
    }
}
