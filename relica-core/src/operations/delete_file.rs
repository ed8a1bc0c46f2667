use crate::{ContentStore, FileId, RelicaError, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct DeleteFileOperation {
    store: Arc<ContentStore>,
}

#[derive(Debug, Clone)]
pub struct DeleteFileOperationRequest {
    pub file_id: FileId,
}

#[derive(Debug, Clone)]
pub enum DeleteFileOperationOutcome {
    Deleted { file_id: FileId },
    NotFound,
}

impl DeleteFileOperation {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    /// Removes this node's copy only; peers and the naming service are not
    /// told.
    pub async fn run(
        &self,
        request: DeleteFileOperationRequest,
    ) -> Result<DeleteFileOperationOutcome> {
        let DeleteFileOperationRequest { file_id } = request;

        match self.store.delete(&file_id).await {
            Ok(path) => {
                tracing::info!("Deleted {} ({:?})", file_id, path);
                Ok(DeleteFileOperationOutcome::Deleted { file_id })
            }
            Err(RelicaError::FileNotFound(_)) => Ok(DeleteFileOperationOutcome::NotFound),
            Err(e) => Err(e),
        }
    }
}
