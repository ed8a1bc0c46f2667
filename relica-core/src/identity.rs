//! File identity and content hashing.
//!
//! Every stored object is named by a [`FileId`]. Original uploads mint a fresh
//! ULID; replica deliveries reuse the identifier chosen by the origin node so
//! that all copies of a file share one name across the cluster.

use crate::error::{RelicaError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use ulid::Ulid;

const MAX_FILE_ID_LEN: usize = 128;

/// Opaque identifier of one logical file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn mint() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Validate an identifier supplied by a caller.
    ///
    /// Identifiers become file names inside the data directory, so only ASCII
    /// alphanumerics, `-` and `_` are accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(RelicaError::InvalidRequest(
                "file_id cannot be empty".to_string(),
            ));
        }
        if raw.len() > MAX_FILE_ID_LEN {
            return Err(RelicaError::InvalidRequest(format!(
                "file_id longer than {} characters",
                MAX_FILE_ID_LEN
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(RelicaError::InvalidRequest(format!(
                "file_id contains invalid character {:?}",
                bad
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pick the identifier for an incoming write.
///
/// A caller-supplied id wins (replica delivery keeps the origin's id);
/// otherwise a new one is minted.
pub fn assign_identity(supplied: Option<&str>) -> Result<FileId> {
    match supplied {
        Some(raw) => FileId::parse(raw),
        None => Ok(FileId::mint()),
    }
}

/// Running SHA-256 over a payload fed in slices, plus its length.
pub struct ContentDigest {
    hasher: Sha256,
    size_bytes: u64,
}

impl ContentDigest {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            size_bytes: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.size_bytes += data.len() as u64;
    }

    /// Returns `(size_bytes, hex_sha256)`.
    pub fn finalize(self) -> (u64, String) {
        (self.size_bytes, hex::encode(self.hasher.finalize()))
    }
}

impl Default for ContentDigest {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute SHA256 hash of data
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
