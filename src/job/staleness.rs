/// Staleness check
///
/// Decides whether a job's previous result can be reused. The checks run in
/// a fixed order and the first one that fails names the reason.
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::{JobError, Result};
use super::fingerprint::Fingerprint;
use super::store::{JobRecord, RecordKey, RecordStore};

/// Why a job has to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    NoRecord,
    /// Previous run failed or never finished
    Incomplete,
    MissingOutput(PathBuf),
    FingerprintChanged { previous: Fingerprint },
    Forced,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NoRecord => write!(f, "no previous run"),
            StaleReason::Incomplete => write!(f, "previous run did not complete"),
            StaleReason::MissingOutput(path) => write!(f, "output missing: {}", path.display()),
            StaleReason::FingerprintChanged { previous } => {
                write!(f, "inputs changed since {}", previous.short())
            }
            StaleReason::Forced => write!(f, "forced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Outputs are current; skip the callback
    Fresh,
    Stale(StaleReason),
}

impl Verdict {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Verdict::Fresh)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Fresh => write!(f, "fresh"),
            Verdict::Stale(reason) => write!(f, "stale ({})", reason),
        }
    }
}

/// Look up the job's record and judge it
pub async fn check(
    store: &dyn RecordStore,
    key: &RecordKey,
    outputs: &[PathBuf],
    fingerprint: &Fingerprint,
) -> Result<Verdict> {
    let record = store.get(key)?;
    assess(record.as_ref(), outputs, fingerprint).await
}

/// Judge an already-loaded record
///
/// Output existence is checked before the fingerprint: a deleted output
/// forces a rerun even when nothing else changed.
pub async fn assess(
    record: Option<&JobRecord>,
    outputs: &[PathBuf],
    fingerprint: &Fingerprint,
) -> Result<Verdict> {
    let Some(record) = record else {
        return Ok(Verdict::Stale(StaleReason::NoRecord));
    };

    if !record.completed_successfully {
        return Ok(Verdict::Stale(StaleReason::Incomplete));
    }

    for output in outputs {
        if !output_exists(output).await? {
            return Ok(Verdict::Stale(StaleReason::MissingOutput(output.clone())));
        }
    }

    if record.fingerprint != *fingerprint {
        return Ok(Verdict::Stale(StaleReason::FingerprintChanged {
            previous: record.fingerprint.clone(),
        }));
    }

    Ok(Verdict::Fresh)
}

async fn output_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| JobError::io(path, e))
}
