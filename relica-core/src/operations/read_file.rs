use crate::{ContentStore, FileId, RelicaError, Result, media_type_for};
use std::path::PathBuf;
use std::sync::Arc;

/// Resolves an identifier to something a download handler can stream.
#[derive(Clone)]
pub struct ReadFileOperation {
    store: Arc<ContentStore>,
}

#[derive(Debug, Clone)]
pub struct ReadFileOperationRequest {
    pub file_id: FileId,
}

#[derive(Debug, Clone)]
pub struct ReadFileOperationResult {
    pub file_id: FileId,
    pub path: PathBuf,
    /// Original filename when metadata exists, otherwise the stored name.
    pub display_name: String,
    pub media_type: &'static str,
    pub size_bytes: u64,
    pub checksum_sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ReadFileOperationOutcome {
    Found(ReadFileOperationResult),
    NotFound,
}

impl ReadFileOperation {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self, request: ReadFileOperationRequest) -> Result<ReadFileOperationOutcome> {
        let ReadFileOperationRequest { file_id } = request;

        // Data absence wins over a leftover sidecar.
        let path = match self.store.resolve(&file_id).await {
            Ok(path) => path,
            Err(RelicaError::FileNotFound(_)) => return Ok(ReadFileOperationOutcome::NotFound),
            Err(e) => return Err(e),
        };

        let meta = match self.store.get_metadata(&file_id).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Ignoring unreadable metadata for {}: {}", file_id, e);
                None
            }
        };

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(fs_meta) => fs_meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ReadFileOperationOutcome::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let stored_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file_id.as_str())
            .to_string();

        let (display_name, checksum_sha256) = match meta {
            Some(meta) => (meta.original_filename, Some(meta.checksum_sha256)),
            None => (stored_name, None),
        };

        Ok(ReadFileOperationOutcome::Found(ReadFileOperationResult {
            media_type: media_type_for(&display_name),
            file_id,
            path,
            display_name,
            size_bytes,
            checksum_sha256,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    async fn store_with(
        file_id: &FileId,
        name: &str,
        data: &'static [u8],
    ) -> (tempfile::TempDir, Arc<ContentStore>) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentStore::open(temp_dir.path().to_path_buf()).unwrap());
        store
            .put(file_id, name, stream::iter(vec![Ok(Bytes::from_static(data))]))
            .await
            .unwrap();
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_found_uses_original_filename() {
        let file_id = FileId::mint();
        let (_temp_dir, store) = store_with(&file_id, "Quarterly Report.pdf", b"%PDF").await;
        let operation = ReadFileOperation::new(store);

        let outcome = operation
            .run(ReadFileOperationRequest {
                file_id: file_id.clone(),
            })
            .await
            .unwrap();

        let ReadFileOperationOutcome::Found(result) = outcome else {
            panic!("expected file to be found");
        };
        assert_eq!(result.display_name, "Quarterly Report.pdf");
        assert_eq!(result.media_type, "application/pdf");
        assert_eq!(result.size_bytes, 4);
        assert_eq!(result.checksum_sha256, Some(crate::compute_hash(b"%PDF")));
    }

    #[tokio::test]
    async fn test_missing_metadata_falls_back_to_stored_name() {
        let file_id = FileId::mint();
        let (temp_dir, store) = store_with(&file_id, "data.json", b"{}").await;
        std::fs::remove_file(temp_dir.path().join(format!("{}.meta.json", file_id))).unwrap();
        let operation = ReadFileOperation::new(store);

        let outcome = operation
            .run(ReadFileOperationRequest {
                file_id: file_id.clone(),
            })
            .await
            .unwrap();

        let ReadFileOperationOutcome::Found(result) = outcome else {
            panic!("expected file to be found");
        };
        assert_eq!(result.display_name, format!("{}.json", file_id));
        assert_eq!(result.media_type, "application/json");
        assert_eq!(result.checksum_sha256, None);
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_treated_as_absent() {
        let file_id = FileId::mint();
        let (temp_dir, store) = store_with(&file_id, "a.txt", b"a").await;
        std::fs::write(temp_dir.path().join(format!("{}.meta.json", file_id)), b"garbage").unwrap();
        let operation = ReadFileOperation::new(store);

        let outcome = operation
            .run(ReadFileOperationRequest { file_id })
            .await
            .unwrap();
        assert!(matches!(outcome, ReadFileOperationOutcome::Found(_)));
    }

    #[tokio::test]
    async fn test_missing_data_is_not_found() {
        let file_id = FileId::mint();
        let (temp_dir, store) = store_with(&file_id, "a.txt", b"a").await;
        std::fs::remove_file(temp_dir.path().join(format!("{}.txt", file_id))).unwrap();
        let operation = ReadFileOperation::new(store);

        let outcome = operation
            .run(ReadFileOperationRequest { file_id })
            .await
            .unwrap();
        assert!(matches!(outcome, ReadFileOperationOutcome::NotFound));
    }
}
