/// Fingerprint computation
///
/// A fingerprint digests a job's resolved inputs together with its opaque
/// extra value. It is what the staleness check compares against the record
/// left by the previous run.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::error::{JobError, Result};

/// How input files enter the fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMethod {
    /// Hash file contents - most accurate
    #[default]
    Content,
    /// Hash modification time only - fast for large files
    Mtime,
}

/// Hex-encoded digest of a job's inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }

    /// Non-empty lowercase hex, as produced by [`fingerprint_with`]
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Compute a SHA-256 fingerprint
///
/// `inputs` must already be sorted (see [`super::inputs::PathResolver`]).
/// Paths are hashed relative to `base_dir` so moving the project does not
/// invalidate every job.
pub async fn fingerprint(
    inputs: &[PathBuf],
    extra_value: &str,
    base_dir: &Path,
    method: HashMethod,
) -> Result<Fingerprint> {
    fingerprint_with::<Sha256>(inputs, extra_value, base_dir, method).await
}

/// Compute a fingerprint with any `sha2`-style digest
pub async fn fingerprint_with<D: Digest>(
    inputs: &[PathBuf],
    extra_value: &str,
    base_dir: &Path,
    method: HashMethod,
) -> Result<Fingerprint> {
    let mut hasher = D::new();

    for file in inputs {
        let rel_path = file
            .strip_prefix(base_dir)
            .unwrap_or(file)
            .to_string_lossy();
        update_framed(&mut hasher, rel_path.as_bytes());

        let file_hash = match method {
            HashMethod::Content => hash_file_content::<D>(file).await?,
            HashMethod::Mtime => hash_file_mtime::<D>(file).await?,
        };
        update_framed(&mut hasher, &file_hash);
    }

    // Separates the extra value from the file section
    hasher.update(b"\0value\0");
    update_framed(&mut hasher, extra_value.as_bytes());

    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Length-prefix each field so adjacent fields can't run together
fn update_framed<D: Digest>(hasher: &mut D, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

async fn hash_file_content<D: Digest>(path: &Path) -> Result<Vec<u8>> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| JobError::io(path, e))?;

    Ok(D::digest(&content).to_vec())
}

async fn hash_file_mtime<D: Digest>(path: &Path) -> Result<Vec<u8>> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| JobError::io(path, e))?;
    let mtime = metadata.modified().map_err(|e| JobError::io(path, e))?;

    // Pre-epoch timestamps collapse to zero rather than failing
    let nanos = mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    Ok(D::digest(nanos.to_le_bytes()).to_vec())
}
