/// `regen status` command implementation
///
/// Prints one line per job: its label and whether it would run.
use anyhow::Result;

use super::Project;
use crate::cli::StatusArgs;

pub async fn run(args: &StatusArgs) -> Result<()> {
    let project = Project::load(&args.common)?;
    let runner = project.runner()?;
    let resolver = project.resolver();

    let width = project
        .config()
        .jobs
        .iter()
        .map(|job| job.label.len())
        .max()
        .unwrap_or(0);

    for job_config in project.select_jobs(&[])? {
        let description = job_config.description(&resolver, project.root())?;
        let verdict = runner.status(&description).await?;
        println!("{:width$}  {}", job_config.label, verdict, width = width);
    }

    Ok(())
}
