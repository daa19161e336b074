/// Persisted job records
///
/// The record store is the only state shared between runs. It maps a job
/// identity (label plus sorted outputs) to the fingerprint of its last run.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

use super::error::{BoxError, JobError, Result};
use super::fingerprint::Fingerprint;

/// Current on-disk record format
pub const RECORD_VERSION: u32 = 1;

/// Identity of a job in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub label: String,
    /// Sorted, as declared (not re-resolved)
    pub outputs: Vec<String>,
}

impl RecordKey {
    pub fn new(label: &str, outputs: &[String]) -> Self {
        let mut outputs = outputs.to_vec();
        outputs.sort();
        Self {
            label: label.to_string(),
            outputs,
        }
    }

    /// Stable hex digest used as the storage file name
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.label.as_bytes());
        for output in &self.outputs {
            hasher.update([0u8]);
            hasher.update(output.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.label, self.outputs.join(", "))
    }
}

/// What a previous run left behind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub version: u32,
    pub key: RecordKey,
    pub fingerprint: Fingerprint,
    pub completed_successfully: bool,
    pub updated_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl JobRecord {
    pub fn new(
        key: RecordKey,
        fingerprint: Fingerprint,
        completed_successfully: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            version: RECORD_VERSION,
            key,
            fingerprint,
            completed_successfully,
            updated_at: Utc::now(),
            duration_ms,
        }
    }
}

/// Durable key -> record mapping
///
/// `put` must either land fully or leave the prior record in place.
pub trait RecordStore: Send + Sync {
    fn get(&self, key: &RecordKey) -> Result<Option<JobRecord>>;

    fn put(&self, record: &JobRecord) -> Result<()>;

    /// Drop every record; returns how many were removed
    fn clear(&self) -> Result<usize>;
}

/// One JSON file per record under a directory
pub struct JsonFileStore {
    records_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(records_dir: impl Into<PathBuf>) -> Result<Self> {
        let records_dir = records_dir.into();
        fs::create_dir_all(&records_dir).map_err(|e| JobError::io(&records_dir, e))?;

        Ok(Self { records_dir })
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.records_dir.join(format!("{}.json", key.digest()))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> std::result::Result<(), BoxError> {
        // Same directory as the target so the rename stays on one filesystem
        let mut temp = tempfile::NamedTempFile::new_in(&self.records_dir)?;
        temp.write_all(contents)?;
        temp.as_file().sync_all()?;
        temp.persist(path)?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn get(&self, key: &RecordKey) -> Result<Option<JobRecord>> {
        let path = self.record_path(key);

        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(JobError::io(&path, e)),
        };

        match serde_json::from_str::<JobRecord>(&json) {
            Ok(record) if !record.fingerprint.is_well_formed() => {
                warn!(
                    operation = "store.get",
                    record = %path.display(),
                    "ignoring record with a malformed fingerprint"
                );
                Ok(None)
            }
            Ok(record) if record.version == RECORD_VERSION && record.key == *key => {
                Ok(Some(record))
            }
            Ok(record) => {
                warn!(
                    operation = "store.get",
                    record = %path.display(),
                    version = record.version,
                    "ignoring record from another format or key"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(
                    operation = "store.get",
                    record = %path.display(),
                    error = %e,
                    "ignoring unreadable record"
                );
                Ok(None)
            }
        }
    }

    fn put(&self, record: &JobRecord) -> Result<()> {
        let path = self.record_path(&record.key);
        let persistence = |source: BoxError| JobError::Persistence {
            key: record.key.to_string(),
            source,
        };

        let json = serde_json::to_vec_pretty(record).map_err(|e| persistence(e.into()))?;
        self.write_atomic(&path, &json).map_err(persistence)
    }

    fn clear(&self) -> Result<usize> {
        let entries =
            fs::read_dir(&self.records_dir).map_err(|e| JobError::io(&self.records_dir, e))?;

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| JobError::io(&self.records_dir, e))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path).map_err(|e| JobError::io(&path, e))?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Store operation, as logged by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Get(RecordKey),
    Put(RecordKey, bool),
}

/// In-process store that logs every access
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordKey, JobRecord>>,
    ops: Mutex<Vec<StoreOp>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every get/put seen so far, in order
    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn record(&self, key: &RecordKey) -> Option<JobRecord> {
        self.records().get(key).cloned()
    }

    // A panicking test thread must not hide the records from the assertions
    fn records(&self) -> MutexGuard<'_, HashMap<RecordKey, JobRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, op: StoreOp) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &RecordKey) -> Result<Option<JobRecord>> {
        self.log(StoreOp::Get(key.clone()));
        Ok(self.records().get(key).cloned())
    }

    fn put(&self, record: &JobRecord) -> Result<()> {
        self.log(StoreOp::Put(
            record.key.clone(),
            record.completed_successfully,
        ));
        self.records().insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let mut records = self.records();
        let removed = records.len();
        records.clear();
        Ok(removed)
    }
}
