/// Fluent job construction
///
/// ```no_run
/// # async fn example(runner: &regen::job::JobRunner) -> Result<(), regen::job::JobError> {
/// use regen::job::job;
///
/// job("version", |ctx| async move {
///     let manifest = tokio::fs::read_to_string(&ctx.inputs[0]).await?;
///     ctx.write_output(0, manifest).await
/// })
/// .inputs(["package.json"])
/// .outputs(["src/generated/version.ts"])
/// .build(runner)
/// .await?;
/// # Ok(())
/// # }
/// ```
use std::future::Future;

use super::context::JobContext;
use super::error::{JobError, Result};
use super::executor::{JobOutcome, JobRunner};

/// Immutable description of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    label: String,
    input_patterns: Vec<String>,
    outputs: Vec<String>,
    extra_value: String,
}

impl JobDescription {
    /// Validate and freeze a job declaration
    pub fn new(
        label: impl Into<String>,
        input_patterns: Vec<String>,
        outputs: Vec<String>,
        extra_value: impl Into<String>,
    ) -> Result<Self> {
        let label = label.into();

        if outputs.is_empty() {
            return Err(JobError::Configuration(format!(
                "Job '{}' must declare at least one output",
                label
            )));
        }
        if outputs.iter().any(|o| o.trim().is_empty()) {
            return Err(JobError::Configuration(format!(
                "Job '{}' declares an empty output path",
                label
            )));
        }

        Ok(Self {
            label,
            input_patterns,
            outputs,
            extra_value: extra_value.into(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn input_patterns(&self) -> &[String] {
        &self.input_patterns
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn extra_value(&self) -> &str {
        &self.extra_value
    }
}

/// Settings accumulated by [`JobBuilder`] before they are frozen
#[derive(Debug, Clone, Default)]
struct JobSpec {
    label: String,
    inputs: Vec<String>,
    outputs: Option<Vec<String>>,
    value: String,
}

/// Start declaring a job
///
/// The callback runs only when the job is stale.
pub fn job<F, Fut>(label: impl Into<String>, callback: F) -> JobBuilder<F>
where
    F: FnOnce(JobContext) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    JobBuilder {
        spec: JobSpec {
            label: label.into(),
            ..Default::default()
        },
        callback,
    }
}

/// Builder returned by [`job`]
///
/// `build` consumes the builder, so a declaration runs at most once.
#[must_use = "a job does nothing until `build` is awaited"]
pub struct JobBuilder<F> {
    spec: JobSpec,
    callback: F,
}

impl<F, Fut> JobBuilder<F>
where
    F: FnOnce(JobContext) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    /// Glob patterns, relative to the runner's root
    pub fn inputs<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.inputs = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn outputs<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.outputs = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Extra cache-busting value mixed into the fingerprint
    pub fn value(mut self, extra: impl Into<String>) -> Self {
        self.spec.value = extra.into();
        self
    }

    /// Freeze the declaration without running it
    pub fn describe(&self) -> Result<JobDescription> {
        let outputs = self.spec.outputs.clone().ok_or_else(|| {
            JobError::Configuration(format!(
                "Job '{}' was built without calling .outputs()",
                self.spec.label
            ))
        })?;

        JobDescription::new(
            self.spec.label.clone(),
            self.spec.inputs.clone(),
            outputs,
            self.spec.value.clone(),
        )
    }

    /// Run the job if it is stale
    pub async fn build(self, runner: &JobRunner) -> Result<JobOutcome> {
        let description = self.describe()?;
        runner.run(description, self.callback).await
    }
}
