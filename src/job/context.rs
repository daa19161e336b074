use std::io::Write;
use std::path::{Path, PathBuf};

/// What a job callback gets to work with
///
/// Paths are absolute. `outputs` are the declared outputs joined onto the
/// project root, in declaration order.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub label: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub scratch_dir: PathBuf,
}

impl JobContext {
    /// First declared output
    pub fn output(&self) -> &Path {
        // outputs is non-empty for every built job
        &self.outputs[0]
    }

    /// First input whose path ends with `suffix`
    pub fn input_ending_with(&self, suffix: &str) -> Option<&Path> {
        self.inputs
            .iter()
            .find(|p| p.to_string_lossy().ends_with(suffix))
            .map(PathBuf::as_path)
    }

    /// Replace output `index` atomically
    ///
    /// Contents are staged in the scratch directory and renamed into place,
    /// so readers never see a half-written file.
    pub async fn write_output(
        &self,
        index: usize,
        contents: impl Into<Vec<u8>>,
    ) -> anyhow::Result<()> {
        let target = self
            .outputs
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("Job '{}' has no output #{}", self.label, index))?
            .clone();
        let scratch = self.scratch_dir.clone();
        let contents = contents.into();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            use anyhow::Context;

            let mut staged = tempfile::NamedTempFile::new_in(&scratch)
                .with_context(|| format!("Failed to stage output in {}", scratch.display()))?;
            staged.write_all(&contents)?;
            staged
                .persist(&target)
                .with_context(|| format!("Failed to move output into {}", target.display()))?;
            Ok(())
        })
        .await?
    }
}
