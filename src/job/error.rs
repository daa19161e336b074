use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause carried by [`JobError::Callback`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by `build()` and the job runner
///
/// Every variant propagates to the caller; the runner never retries.
#[derive(Error, Debug)]
pub enum JobError {
    /// Malformed job declaration (missing outputs, bad label, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to resolve input pattern '{pattern}': {source}")]
    Resolution {
        pattern: String,
        #[source]
        source: BoxError,
    },

    /// The job callback failed; `source` is whatever it returned
    #[error("Job '{label}' failed")]
    Callback {
        label: String,
        #[source]
        source: BoxError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record store write failed after the callback succeeded
    #[error("Failed to persist record {key}: {source}")]
    Persistence {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl JobError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn callback(label: &str, source: anyhow::Error) -> Self {
        JobError::Callback {
            label: label.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T, E = JobError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_callback_error_keeps_cause_chain() {
        let cause = anyhow::anyhow!("esbuild exited with 1").context("bundling injected.ts");
        let err = JobError::callback("injected", cause);

        assert_eq!(err.to_string(), "Job 'injected' failed");

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "bundling injected.ts");
        assert_eq!(
            source.source().unwrap().to_string(),
            "esbuild exited with 1"
        );
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = JobError::io(
            "/tmp/out/x.js",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/out/x.js"));
    }
}
