use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::RegenConfig;

/// Name of the pipeline file looked up by discovery
pub const CONFIG_FILE_NAME: &str = "regen.toml";

/// Discovers the pipeline file by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        // Try to go up one level
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    Ok(None)
}

/// A validated configuration and the project root it applies to
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: RegenConfig,
    pub path: PathBuf,
    /// Directory holding the config file; patterns and outputs resolve here
    pub root: PathBuf,
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path.
/// Otherwise, auto-discovers config by traversing up directory tree from cwd.
pub fn load_config_with_discovery(explicit_path: Option<&Path>) -> Result<LoadedConfig> {
    let current_dir =
        std::env::current_dir().context("Failed to get current directory for config discovery")?;

    let path = match explicit_path {
        Some(path) => current_dir.join(path),
        None => discover_config(&current_dir)?.with_context(|| {
            format!(
                "No {} found in {} or any parent directory",
                CONFIG_FILE_NAME,
                current_dir.display()
            )
        })?,
    };

    let config = RegenConfig::from_file(&path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;

    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| current_dir.clone());

    tracing::debug!(config = %path.display(), root = %root.display(), "loaded configuration");

    Ok(LoadedConfig { config, path, root })
}
