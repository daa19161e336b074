/// `regen clean` command implementation
///
/// Forgets every job record so the next run regenerates everything, and
/// removes scratch directories left behind by killed runs.
use anyhow::{Context, Result};
use regen::job::RecordStore;

use super::Project;
use crate::cli::CleanArgs;
use regen::cli_utils::regen_prefix;

pub async fn run(args: &CleanArgs) -> Result<()> {
    let project = Project::load(&args.common)?;
    let store = project.store()?;

    let removed = store.clear().context("Failed to clear job records")?;

    let scratch_dir = project.scratch_dir();
    let scratch_exists = tokio::fs::try_exists(&scratch_dir)
        .await
        .with_context(|| format!("Failed to inspect {}", scratch_dir.display()))?;
    if scratch_exists {
        tokio::fs::remove_dir_all(&scratch_dir)
            .await
            .with_context(|| format!("Failed to remove {}", scratch_dir.display()))?;
    }

    eprintln!(
        "{} Removed {} record{} from {}",
        regen_prefix(),
        removed,
        if removed == 1 { "" } else { "s" },
        project.state_dir().display()
    );

    Ok(())
}
