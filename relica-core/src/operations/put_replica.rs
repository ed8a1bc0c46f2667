use crate::{ContentStore, FileId, Result, StoredObject};
use bytes::Bytes;
use futures_util::Stream;
use std::sync::Arc;

/// Stores a copy pushed by the node that received the original.
///
/// Holds nothing but the content store: a replica write can never be fanned
/// out again or registered with the naming service.
#[derive(Clone)]
pub struct PutReplicaOperation {
    store: Arc<ContentStore>,
}

pub struct PutReplicaOperationRequest<S> {
    pub file_id: FileId,
    pub original_filename: String,
    pub body: S,
}

#[derive(Debug, Clone)]
pub struct PutReplicaOperationResult {
    pub object: StoredObject,
}

impl PutReplicaOperation {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    pub async fn run<S>(
        &self,
        request: PutReplicaOperationRequest<S>,
    ) -> Result<PutReplicaOperationResult>
    where
        S: Stream<Item = std::io::Result<Bytes>>,
    {
        let PutReplicaOperationRequest {
            file_id,
            original_filename,
            body,
        } = request;

        let object = self.store.put(&file_id, &original_filename, body).await?;

        tracing::info!(
            "Stored replica {} ({} bytes, sha256 {})",
            object.file_id,
            object.size_bytes,
            object.checksum_sha256
        );
        Ok(PutReplicaOperationResult { object })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_hash;
    use futures_util::stream;

    #[tokio::test]
    async fn test_replica_keeps_supplied_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentStore::open(temp_dir.path().to_path_buf()).unwrap());
        let operation = PutReplicaOperation::new(store.clone());

        let file_id = FileId::parse("0b7e4a52-3f1c-4b7a-9a43-5d1f0c2e9b11").unwrap();
        let result = operation
            .run(PutReplicaOperationRequest {
                file_id: file_id.clone(),
                original_filename: "song.mp3".to_string(),
                body: stream::iter(vec![Ok(Bytes::from_static(b"la la"))]),
            })
            .await
            .unwrap();

        assert_eq!(result.object.file_id, file_id);
        assert_eq!(
            result.object.stored_name,
            "0b7e4a52-3f1c-4b7a-9a43-5d1f0c2e9b11.mp3"
        );
        assert_eq!(result.object.checksum_sha256, compute_hash(b"la la"));
        assert!(store.resolve(&file_id).await.is_ok());
    }
}
