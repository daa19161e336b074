// Library interface for regen
// The CLI and integration tests build on these modules.

pub mod cli_utils;
pub mod command;
pub mod config;
pub mod config_discovery;
pub mod job;
pub mod logging;

// Re-export commonly used types
pub use config::RegenConfig;
pub use config_discovery::{discover_config, load_config_with_discovery, LoadedConfig};
pub use job::{job, JobError, JobOutcome, JobRunner};
