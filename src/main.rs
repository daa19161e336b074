mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use regen::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    logging::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Run(args) => commands::run::run(&args).await,
        Commands::Status(args) => commands::status::run(&args).await,
        Commands::Clean(args) => commands::clean::run(&args).await,
        Commands::Init(args) => commands::init::run(args),
    }
}
