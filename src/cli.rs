use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// regen - Incremental source generation
///
/// Runs the generation jobs declared in regen.toml, skipping every job whose
/// inputs are unchanged since its last successful run.
#[derive(Parser, Debug)]
#[command(name = "regen")]
#[command(author = "Tuist Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incremental source generation jobs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Configuration arguments shared across commands
#[derive(Parser, Debug, Clone)]
pub struct CommonConfigArgs {
    /// Config file path (default: nearest regen.toml)
    #[arg(short = 'c', long, env = "REGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// State directory holding records and scratch space
    #[arg(long, env = "REGEN_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run stale jobs in declaration order
    Run(RunArgs),

    /// Show which jobs are fresh and which would run
    Status(StatusArgs),

    /// Forget all job records and remove leftover scratch directories
    Clean(CleanArgs),

    /// Write an example regen.toml
    Init(InitArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonConfigArgs,

    /// Run every selected job even if it is up to date
    #[arg(short, long)]
    pub force: bool,

    /// Only run jobs with these labels (repeatable)
    #[arg(long = "only", value_name = "LABEL")]
    pub only: Vec<String>,

    /// Show what would run without executing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing regen.toml
    #[arg(long)]
    pub force: bool,
}
