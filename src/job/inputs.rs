/// Input pattern resolution
///
/// Expands declared glob patterns into the sorted, deduplicated file list a
/// job's fingerprint is computed over.
use glob::glob;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::error::{JobError, Result};

/// Expands input patterns into concrete files
///
/// Implementations must return an empty list for patterns that match
/// nothing, and must return paths sorted so callers never observe
/// filesystem iteration order.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, patterns: &[String]) -> Result<Vec<PathBuf>>;
}

/// Glob-based resolver rooted at a project directory
#[derive(Debug, Clone)]
pub struct GlobResolver {
    base_dir: PathBuf,
}

impl GlobResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl PathResolver for GlobResolver {
    fn resolve(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        // BTreeSet gives both dedup and ordering
        let mut files = BTreeSet::new();
        for pattern in patterns {
            files.extend(expand_glob(pattern, &self.base_dir)?);
        }
        Ok(files.into_iter().collect())
    }
}

/// Expand a single glob pattern relative to base directory
///
/// Only regular files are returned; directories matched by the pattern are
/// skipped.
pub fn expand_glob(pattern: &str, base_dir: &Path) -> Result<Vec<PathBuf>> {
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        base_dir.join(pattern).to_string_lossy().to_string()
    };

    let entries = glob(&full_pattern).map_err(|e| JobError::Resolution {
        pattern: pattern.to_string(),
        source: Box::new(e),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| JobError::Resolution {
            pattern: pattern.to_string(),
            source: Box::new(e),
        })?;

        if path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    #[test]
    fn test_resolve_sorted_and_deduplicated() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/b.ts");
        touch(temp.path(), "src/a.ts");
        touch(temp.path(), "src/nested/c.ts");

        let resolver = GlobResolver::new(temp.path());
        let files = resolver
            .resolve(&["src/**/*.ts".to_string(), "src/a.ts".to_string()])
            .unwrap();

        assert_eq!(
            files,
            vec![
                temp.path().join("src/a.ts"),
                temp.path().join("src/b.ts"),
                temp.path().join("src/nested/c.ts"),
            ]
        );
    }

    #[test]
    fn test_resolve_independent_of_pattern_order() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "package.json");
        touch(temp.path(), "src/templates/version.ts.tmpl");

        let resolver = GlobResolver::new(temp.path());
        let forward = resolver
            .resolve(&[
                "package.json".to_string(),
                "src/templates/*.tmpl".to_string(),
            ])
            .unwrap();
        let reverse = resolver
            .resolve(&[
                "src/templates/*.tmpl".to_string(),
                "package.json".to_string(),
            ])
            .unwrap();

        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        let temp = TempDir::new().unwrap();
        let resolver = GlobResolver::new(temp.path());

        let files = resolver.resolve(&["missing/**/*.ts".to_string()]).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_directories_are_skipped() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/generated")).unwrap();
        touch(temp.path(), "src/index.ts");

        let resolver = GlobResolver::new(temp.path());
        let files = resolver.resolve(&["src/*".to_string()]).unwrap();

        assert_eq!(files, vec![temp.path().join("src/index.ts")]);
    }

    #[test]
    fn test_invalid_pattern_is_resolution_error() {
        let temp = TempDir::new().unwrap();
        let resolver = GlobResolver::new(temp.path());

        let err = resolver.resolve(&["src/[".to_string()]).unwrap_err();
        assert!(matches!(err, JobError::Resolution { pattern, .. } if pattern == "src/["));
    }
}
