/// Job execution
///
/// Runs one job description end to end: resolve inputs, fingerprint them,
/// prepare output directories, consult the staleness check, and run the
/// callback inside a scratch directory when the job is stale.
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::builder::JobDescription;
use super::context::JobContext;
use super::error::{JobError, Result};
use super::fingerprint::{fingerprint, Fingerprint, HashMethod};
use super::inputs::{GlobResolver, PathResolver};
use super::scratch::ScratchDir;
use super::staleness::{self, StaleReason, Verdict};
use super::store::{JobRecord, RecordKey, RecordStore};

/// Default location of scratch directories, relative to the root
pub const DEFAULT_SCRATCH_DIR: &str = ".regen/scratch";

/// How a `build()` settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Previous outputs were still valid; the callback did not run
    Skipped { fingerprint: Fingerprint },
    Ran {
        fingerprint: Fingerprint,
        reason: StaleReason,
        duration: Duration,
    },
}

impl JobOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, JobOutcome::Ran { .. })
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            JobOutcome::Skipped { fingerprint } | JobOutcome::Ran { fingerprint, .. } => {
                fingerprint
            }
        }
    }
}

/// Everything a job needs besides its own description
///
/// The record store is passed in explicitly; runners sharing a store see
/// each other's records.
pub struct JobRunner {
    root: PathBuf,
    store: Arc<dyn RecordStore>,
    resolver: Arc<dyn PathResolver>,
    scratch_root: PathBuf,
    hash_method: HashMethod,
    force: bool,
}

impl JobRunner {
    /// Runner rooted at `root`, resolving inputs with [`GlobResolver`]
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn RecordStore>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);

        Self {
            resolver: Arc::new(GlobResolver::new(&root)),
            scratch_root: root.join(DEFAULT_SCRATCH_DIR),
            root,
            store,
            hash_method: HashMethod::default(),
            force: false,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    pub fn with_hash_method(mut self, hash_method: HashMethod) -> Self {
        self.hash_method = hash_method;
        self
    }

    /// Treat every job as stale
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Report the verdict for a job without running or creating anything
    pub async fn status(&self, description: &JobDescription) -> Result<Verdict> {
        let (_, fingerprint) = self.fingerprint_inputs(description).await?;
        self.verdict(description, &fingerprint).await
    }

    /// Execute one job
    pub async fn run<F, Fut>(
        &self,
        description: JobDescription,
        callback: F,
    ) -> Result<JobOutcome>
    where
        F: FnOnce(JobContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let label = description.label().to_string();

        let (inputs, fingerprint) = self.fingerprint_inputs(&description).await?;
        debug!(
            job = %label,
            operation = "fingerprint",
            fingerprint = %fingerprint.short(),
            input_count = inputs.len(),
            "fingerprinted inputs"
        );

        let outputs = self.absolute_outputs(&description);
        for output in &outputs {
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| JobError::io(parent, e))?;
            }
        }

        let reason = match self.verdict(&description, &fingerprint).await? {
            Verdict::Fresh => {
                info!(
                    job = %label,
                    operation = "check",
                    status = "fresh",
                    fingerprint = %fingerprint.short(),
                    "up to date, skipping"
                );
                return Ok(JobOutcome::Skipped { fingerprint });
            }
            Verdict::Stale(reason) => reason,
        };

        info!(
            job = %label,
            operation = "check",
            status = "stale",
            reason = %reason,
            "running job"
        );

        let start = Instant::now();
        let scratch_root = self.scratch_root.clone();
        let scratch_label = label.clone();
        let scratch = off_runtime(&self.scratch_root, move || {
            ScratchDir::create(&scratch_root, &scratch_label)
        })
        .await?;
        let context = JobContext {
            label: label.clone(),
            inputs,
            outputs,
            scratch_dir: scratch.path().to_path_buf(),
        };

        let result = callback(context).await;
        let released = off_runtime(&self.scratch_root, move || scratch.close()).await;
        let duration = start.elapsed();
        let key = RecordKey::new(&label, description.outputs());

        if let Err(e) = result {
            warn!(
                job = %label,
                operation = "run",
                status = "error",
                error = %e,
                "job failed"
            );
            self.mark_incomplete(&key, &fingerprint, duration).await;
            if let Err(release_err) = released {
                warn!(
                    job = %label,
                    operation = "scratch",
                    error = %release_err,
                    "scratch cleanup failed"
                );
            }
            return Err(JobError::callback(&label, e));
        }

        released?;

        let record = JobRecord::new(key, fingerprint.clone(), true, duration.as_millis() as u64);
        self.persist(record).await?;

        info!(
            job = %label,
            operation = "run",
            status = "success",
            fingerprint = %fingerprint.short(),
            duration_ms = duration.as_millis() as u64,
            "job completed"
        );

        Ok(JobOutcome::Ran {
            fingerprint,
            reason,
            duration,
        })
    }

    async fn fingerprint_inputs(
        &self,
        description: &JobDescription,
    ) -> Result<(Vec<PathBuf>, Fingerprint)> {
        let inputs = self.resolve(description.input_patterns()).await?;
        debug!(
            job = %description.label(),
            operation = "resolve",
            input_count = inputs.len(),
            "resolved input patterns"
        );

        let fingerprint = fingerprint(
            &inputs,
            description.extra_value(),
            &self.root,
            self.hash_method,
        )
        .await?;

        Ok((inputs, fingerprint))
    }

    async fn resolve(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        // Glob traversal blocks; keep it off the async worker
        let resolver = Arc::clone(&self.resolver);
        let owned = patterns.to_vec();
        tokio::task::spawn_blocking(move || resolver.resolve(&owned))
            .await
            .map_err(|e| JobError::Resolution {
                pattern: patterns.join(", "),
                source: Box::new(e),
            })?
    }

    async fn verdict(
        &self,
        description: &JobDescription,
        fingerprint: &Fingerprint,
    ) -> Result<Verdict> {
        if self.force {
            return Ok(Verdict::Stale(StaleReason::Forced));
        }

        let key = RecordKey::new(description.label(), description.outputs());
        let outputs = self.absolute_outputs(description);
        staleness::check(self.store.as_ref(), &key, &outputs, fingerprint).await
    }

    fn absolute_outputs(&self, description: &JobDescription) -> Vec<PathBuf> {
        description
            .outputs()
            .iter()
            .map(|output| self.root.join(output))
            .collect()
    }

    /// Write a record without blocking the async workers
    async fn persist(&self, record: JobRecord) -> Result<()> {
        let store = Arc::clone(&self.store);
        let key = record.key.to_string();

        tokio::task::spawn_blocking(move || store.put(&record))
            .await
            .map_err(|e| JobError::Persistence {
                key,
                source: Box::new(e),
            })?
    }

    /// Make sure an older success record can't vouch for half-written outputs
    async fn mark_incomplete(
        &self,
        key: &RecordKey,
        fingerprint: &Fingerprint,
        duration: Duration,
    ) {
        let record = JobRecord::new(
            key.clone(),
            fingerprint.clone(),
            false,
            duration.as_millis() as u64,
        );
        if let Err(e) = self.persist(record).await {
            warn!(
                job = %key.label,
                operation = "persist",
                status = "error",
                error = %e,
                "failed to record job failure"
            );
        }
    }
}

/// Run blocking filesystem work on the blocking pool
async fn off_runtime<T, F>(path: &Path, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| JobError::io(path, std::io::Error::other(e)))?
}
