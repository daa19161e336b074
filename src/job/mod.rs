//! Incremental generation jobs
//!
//! A job declares input patterns, output paths and an optional extra value.
//! When it is built, the runner fingerprints the resolved inputs and skips
//! the callback entirely if a previous successful run left the same
//! fingerprint behind and every output still exists.
//!
//! ```text
//! job(label, callback) -> JobBuilder -> JobDescription
//!                                          |
//!                      JobRunner::run: resolve -> fingerprint -> mkdir -p
//!                                      -> check -> [scratch + callback] -> record
//! ```

pub mod builder;
pub mod context;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod inputs;
pub mod scratch;
pub mod staleness;
pub mod store;

pub use builder::{job, JobBuilder, JobDescription};
pub use context::JobContext;
pub use error::JobError;
pub use executor::{JobOutcome, JobRunner};
pub use fingerprint::{Fingerprint, HashMethod};
pub use inputs::{GlobResolver, PathResolver};
pub use staleness::{StaleReason, Verdict};
pub use store::{JobRecord, JsonFileStore, MemoryStore, RecordKey, RecordStore};
