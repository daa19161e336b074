pub mod clean;
pub mod init;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regen::config::{JobConfig, RegenConfig};
use regen::config_discovery::{load_config_with_discovery, LoadedConfig};
use regen::job::{GlobResolver, JobRunner, JsonFileStore};

use crate::cli::CommonConfigArgs;

/// A loaded project: configuration, root and state directory
pub struct Project {
    loaded: LoadedConfig,
    state_dir: PathBuf,
}

impl Project {
    pub fn load(args: &CommonConfigArgs) -> Result<Self> {
        let loaded = load_config_with_discovery(args.config.as_deref())?;

        // CLI/env override is relative to cwd, the config value to the root
        let state_dir = match &args.state_dir {
            Some(dir) => std::path::absolute(dir)
                .with_context(|| format!("Invalid state directory: {}", dir.display()))?,
            None => loaded.config.state_dir(&loaded.root),
        };

        Ok(Self { loaded, state_dir })
    }

    pub fn config(&self) -> &RegenConfig {
        &self.loaded.config
    }

    pub fn root(&self) -> &Path {
        &self.loaded.root
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn records_dir(&self) -> PathBuf {
        self.state_dir.join("records")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.state_dir.join("scratch")
    }

    pub fn store(&self) -> Result<JsonFileStore> {
        JsonFileStore::new(self.records_dir()).context("Failed to open record store")
    }

    pub fn resolver(&self) -> GlobResolver {
        GlobResolver::new(self.root())
    }

    pub fn runner(&self) -> Result<JobRunner> {
        Ok(JobRunner::new(self.root(), Arc::new(self.store()?))
            .with_resolver(Arc::new(self.resolver()))
            .with_scratch_root(self.scratch_dir())
            .with_hash_method(self.config().state.hash))
    }

    /// Jobs to act on, in declaration order
    ///
    /// An empty `only` selects every job.
    pub fn select_jobs(&self, only: &[String]) -> Result<Vec<&JobConfig>> {
        let jobs = &self.config().jobs;

        if let Some(unknown) = only
            .iter()
            .find(|label| !jobs.iter().any(|job| &job.label == *label))
        {
            anyhow::bail!(
                "Unknown job label: {} (known: {})",
                unknown,
                jobs.iter()
                    .map(|job| job.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(jobs
            .iter()
            .filter(|job| only.is_empty() || only.contains(&job.label))
            .collect())
    }
}
