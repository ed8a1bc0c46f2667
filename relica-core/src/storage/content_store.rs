use crate::error::{RelicaError, Result};
use crate::identity::{ContentDigest, FileId};
use crate::storage::metadata_store::{
    MetadataStore, StoredObject, is_sidecar_name, sidecar_exists_for,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use ulid::Ulid;

/// Upper bound on a single write/hash step while ingesting a body.
pub const STREAM_CHUNK_SIZE: usize = 1024 * 1024;

const PARTIAL_SUFFIX: &str = ".partial";
const MAX_EXTENSION_LEN: usize = 16;

/// ContentStore keeps one data object plus one sidecar per file identifier
/// in a node-private directory:
///
/// - `{file_id}[.{ext}]` payload bytes
/// - `{file_id}.meta.json` sidecar
/// - `.{stored_name}.{ulid}.partial` upload in flight, invisible to readers
pub struct ContentStore {
    base_path: PathBuf,
    metadata: MetadataStore,
}

impl ContentStore {
    /// Open (creating if needed) the data directory and drop partial files
    /// left behind by interrupted uploads.
    pub fn open(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;

        let mut swept = 0usize;
        let mut objects = 0usize;
        let mut without_metadata = 0usize;
        for entry in std::fs::read_dir(&base_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            if is_partial_name(&name) {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => swept += 1,
                    Err(e) => tracing::warn!("Failed to sweep partial upload {}: {}", name, e),
                }
                continue;
            }

            if is_sidecar_name(&name) {
                continue;
            }

            objects += 1;
            if !sidecar_exists_for(&base_path, &name) {
                without_metadata += 1;
            }
        }

        tracing::info!(
            "Opened content store at {:?}: {} objects ({} without metadata), swept {} partial uploads",
            base_path,
            objects,
            without_metadata,
            swept
        );

        Ok(Self {
            metadata: MetadataStore::new(base_path.clone()),
            base_path,
        })
    }

    /// Get the base path for the store
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Stream `body` to disk under `file_id`, hashing the same slices that
    /// are written. The sidecar is only written once the data object has
    /// been synced and renamed into place.
    pub async fn put<S>(
        &self,
        file_id: &FileId,
        original_filename: &str,
        body: S,
    ) -> Result<StoredObject>
    where
        S: Stream<Item = std::io::Result<Bytes>>,
    {
        let stored_name = stored_name_for(file_id, original_filename);
        let final_path = self.base_path.join(&stored_name);
        let partial_path = self
            .base_path
            .join(format!(".{}.{}{}", stored_name, Ulid::new(), PARTIAL_SUFFIX));

        let (size_bytes, checksum_sha256) = match write_partial(&partial_path, body).await {
            Ok(written) => written,
            Err(e) => {
                discard_partial(&partial_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&partial_path, &final_path).await {
            discard_partial(&partial_path).await;
            return Err(e.into());
        }

        self.remove_stale_objects(file_id, &stored_name).await;

        let object = StoredObject {
            file_id: file_id.clone(),
            stored_name,
            original_filename: original_filename.to_string(),
            size_bytes,
            checksum_sha256,
            stored_at: chrono::Utc::now(),
        };
        self.metadata.put(&object).await?;

        tracing::debug!(
            "Stored {} as {} ({} bytes, sha256 {})",
            object.file_id,
            object.stored_name,
            object.size_bytes,
            object.checksum_sha256
        );
        Ok(object)
    }

    /// Find the data object for `file_id`.
    ///
    /// If more than one candidate exists the first one in directory order
    /// wins; that only happens after a crash between rename and stale-object
    /// cleanup.
    pub async fn resolve(&self, file_id: &FileId) -> Result<PathBuf> {
        self.data_candidates(file_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RelicaError::FileNotFound(file_id.to_string()))
    }

    pub async fn get_metadata(&self, file_id: &FileId) -> Result<Option<StoredObject>> {
        self.metadata.get(file_id).await
    }

    /// Remove the data object, then try to remove the sidecar. Only the data
    /// removal outcome is reported.
    pub async fn delete(&self, file_id: &FileId) -> Result<PathBuf> {
        let path = self.resolve(file_id).await?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RelicaError::FileNotFound(file_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.metadata.remove(file_id).await {
            tracing::warn!("Failed to remove metadata for {}: {}", file_id, e);
        }

        tracing::debug!("Deleted {} ({:?})", file_id, path);
        Ok(path)
    }

    async fn data_candidates(&self, file_id: &FileId) -> Result<Vec<PathBuf>> {
        let mut candidates = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_data_name_for(name, file_id) {
                    candidates.push(entry.path());
                }
            }
        }

        Ok(candidates)
    }

    /// A replica may arrive with a different extension than an earlier copy
    /// of the same identifier; keep only the object just written.
    async fn remove_stale_objects(&self, file_id: &FileId, keep: &str) {
        let candidates = match self.data_candidates(file_id).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("Failed to scan for stale objects of {}: {}", file_id, e);
                return;
            }
        };

        for path in candidates {
            if path.file_name().and_then(|name| name.to_str()) == Some(keep) {
                continue;
            }
            if let Err(e) = fs::remove_file(&path).await {
                tracing::warn!("Failed to remove stale object {:?}: {}", path, e);
            }
        }
    }
}

async fn write_partial<S>(path: &Path, body: S) -> Result<(u64, String)>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    let mut body = std::pin::pin!(body);
    let mut file = fs::File::create(path).await?;
    let mut digest = ContentDigest::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(RelicaError::BodyRead)?;
        for slice in chunk.chunks(STREAM_CHUNK_SIZE) {
            file.write_all(slice).await?;
            digest.update(slice);
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(digest.finalize())
}

async fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial upload {:?}: {}", path, e);
        }
    }
}

/// `{file_id}.{ext}` when the original name carries a plain extension,
/// otherwise the bare identifier.
pub fn stored_name_for(file_id: &FileId, original_filename: &str) -> String {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match extension {
        Some(ext) => format!("{}.{}", file_id, ext),
        None => file_id.to_string(),
    }
}

fn is_partial_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)
}

fn is_data_name_for(name: &str, file_id: &FileId) -> bool {
    if name.starts_with('.') || is_sidecar_name(name) {
        return false;
    }
    match name.strip_prefix(file_id.as_str()) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
