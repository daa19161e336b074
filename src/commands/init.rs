use anyhow::{Context, Result};
use std::path::Path;

use regen::config::RegenConfig;
use regen::config_discovery::CONFIG_FILE_NAME;

use crate::cli::InitArgs;
use regen::cli_utils::regen_prefix;

pub fn run(args: InitArgs) -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            CONFIG_FILE_NAME
        );
    }

    let content = format!(
        "# regen configuration\n# Jobs run in declaration order; each is skipped while its inputs are unchanged.\n\n{}",
        RegenConfig::example()?
    );

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    eprintln!("{} Created {}", regen_prefix(), CONFIG_FILE_NAME);
    Ok(())
}
