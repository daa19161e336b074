/// `regen run` command implementation
///
/// Runs the selected jobs in declaration order, stopping at the first
/// failure. Up-to-date jobs are skipped.
use anyhow::Result;
use std::time::Instant;

use regen::command::CommandExecutor;
use regen::job::{job, JobContext, JobOutcome};

use super::Project;
use crate::cli::RunArgs;
use regen::cli_utils::regen_prefix;

pub async fn run(args: &RunArgs) -> Result<()> {
    let project = Project::load(&args.common)?;
    let jobs = project.select_jobs(&args.only)?;

    if jobs.is_empty() {
        eprintln!("{} No jobs declared", regen_prefix());
        return Ok(());
    }

    let runner = project.runner()?.force(args.force);
    let resolver = project.resolver();
    let executor = CommandExecutor::new(&project.config().state.shell, project.root());

    let start = Instant::now();
    let mut ran = 0;
    let mut skipped = 0;

    for job_config in jobs {
        let value = job_config.extra_value(&resolver, project.root())?;
        let timeout = job_config.timeout()?;
        let executor = &executor;

        let builder = job(job_config.label.as_str(), move |ctx: JobContext| async move {
            executor
                .execute(&job_config.command, &ctx, &job_config.env, timeout)
                .await
        })
        .inputs(job_config.inputs.iter().cloned())
        .outputs(job_config.outputs.iter().cloned())
        .value(value);

        if args.dry_run {
            let verdict = runner.status(&builder.describe()?).await?;
            if verdict.is_fresh() {
                eprintln!("{} {}: up to date", regen_prefix(), job_config.label);
                skipped += 1;
            } else {
                eprintln!("{} {}: would run, {}", regen_prefix(), job_config.label, verdict);
                ran += 1;
            }
            continue;
        }

        match builder.build(&runner).await? {
            JobOutcome::Skipped { fingerprint } => {
                eprintln!(
                    "{} {}: up to date ({})",
                    regen_prefix(),
                    job_config.label,
                    fingerprint.short()
                );
                skipped += 1;
            }
            JobOutcome::Ran {
                reason, duration, ..
            } => {
                eprintln!(
                    "{} {}: generated in {:.2}s ({})",
                    regen_prefix(),
                    job_config.label,
                    duration.as_secs_f64(),
                    reason
                );
                ran += 1;
            }
        }
    }

    let verb = if args.dry_run { "would run" } else { "ran" };
    eprintln!(
        "{} {} {}, {} up to date | {:.2}s",
        regen_prefix(),
        ran,
        verb,
        skipped,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
