use crate::error::Result;
use crate::identity::FileId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// One stored file on this node, as recorded in its sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub file_id: FileId,
    pub stored_name: String,
    pub original_filename: String,
    pub size_bytes: u64,
    pub checksum_sha256: String,
    pub stored_at: chrono::DateTime<chrono::Utc>,
}

/// Sidecar records, one JSON file per identifier next to the data object.
pub struct MetadataStore {
    base_path: PathBuf,
}

impl MetadataStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn sidecar_path(&self, file_id: &FileId) -> PathBuf {
        self.base_path.join(format!("{}{}", file_id.as_str(), SIDECAR_SUFFIX))
    }

    /// Write (or overwrite) the sidecar for `object`.
    pub async fn put(&self, object: &StoredObject) -> Result<()> {
        let path = self.sidecar_path(&object.file_id);
        let payload = serde_json::to_vec_pretty(object)?;

        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&payload).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    pub async fn get(&self, file_id: &FileId) -> Result<Option<StoredObject>> {
        let path = self.sidecar_path(file_id);
        let payload = match fs::read(&path).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_slice(&payload)?))
    }

    /// Returns whether a sidecar was actually removed.
    pub async fn remove(&self, file_id: &FileId) -> Result<bool> {
        match fs::remove_file(self.sidecar_path(file_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn is_sidecar_name(name: &str) -> bool {
    name.ends_with(SIDECAR_SUFFIX) || name.ends_with(".meta.json.tmp")
}

/// Identifier part of a file name in the data directory.
pub(crate) fn file_id_prefix(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

pub(crate) fn sidecar_exists_for(base_path: &Path, name: &str) -> bool {
    base_path
        .join(format!("{}{}", file_id_prefix(name), SIDECAR_SUFFIX))
        .exists()
}
