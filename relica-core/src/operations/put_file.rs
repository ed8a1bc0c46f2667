use crate::{
    ContentStore, FileId, NodeTopology, PlacementReport, PlacementReporter, PlacementSummary,
    RelicaError, ReplicaPush, ReplicationCoordinator, ReplicationOutcome, Result, StoredObject,
    assign_identity,
};
use bytes::Bytes;
use futures_util::Stream;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// How an upload reached this node.
///
/// Only `Original` writes are fanned out and registered; `Replica` writes
/// came from a peer and are handled by [`super::PutReplicaOperation`], which
/// has no access to replication at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteKind {
    Original { file_id: FileId },
    Replica { file_id: FileId },
}

impl WriteKind {
    pub fn from_params(file_id: Option<&str>, is_replica: bool) -> Result<Self> {
        if is_replica {
            let raw = file_id.ok_or_else(|| {
                RelicaError::InvalidRequest("replica writes must carry file_id".to_string())
            })?;
            return Ok(WriteKind::Replica {
                file_id: assign_identity(Some(raw))?,
            });
        }

        Ok(WriteKind::Original {
            file_id: assign_identity(file_id)?,
        })
    }

    pub fn file_id(&self) -> &FileId {
        match self {
            WriteKind::Original { file_id } | WriteKind::Replica { file_id } => file_id,
        }
    }
}

#[derive(Clone)]
pub struct PutFileOperation {
    store: Arc<ContentStore>,
    topology: Arc<NodeTopology>,
    coordinator: ReplicationCoordinator,
    reporter: PlacementReporter,
}

pub struct PutFileOperationRequest<S> {
    pub file_id: FileId,
    pub original_filename: String,
    pub body: S,
}

#[derive(Debug)]
pub struct PutFileOperationResult {
    pub object: StoredObject,
    pub replication: ReplicationOutcome,
    /// Background placement report. Dropping the handle detaches it.
    pub placement: JoinHandle<PlacementSummary>,
}

impl PutFileOperation {
    pub fn new(
        store: Arc<ContentStore>,
        topology: Arc<NodeTopology>,
        coordinator: ReplicationCoordinator,
        reporter: PlacementReporter,
    ) -> Self {
        Self {
            store,
            topology,
            coordinator,
            reporter,
        }
    }

    /// Store an original upload, push it to every peer, then start the
    /// placement report without waiting for it. Only the local write can fail
    /// the request.
    pub async fn run<S>(
        &self,
        request: PutFileOperationRequest<S>,
    ) -> Result<PutFileOperationResult>
    where
        S: Stream<Item = std::io::Result<Bytes>>,
    {
        let PutFileOperationRequest {
            file_id,
            original_filename,
            body,
        } = request;

        let object = self.store.put(&file_id, &original_filename, body).await?;

        let push = ReplicaPush {
            file_id: object.file_id.clone(),
            original_filename: object.original_filename.clone(),
            payload_path: self.store.base_path().join(&object.stored_name),
            size_bytes: object.size_bytes,
        };
        let replication = self.coordinator.fan_out(&push, self.topology.peers()).await;

        let placement = self.reporter.spawn_report(PlacementReport {
            file_id: object.file_id.clone(),
            original_filename: object.original_filename.clone(),
            size_bytes: object.size_bytes,
            checksum_sha256: object.checksum_sha256.clone(),
            replication: replication.clone(),
        });

        tracing::info!(
            "Stored original {} ({} bytes) on {}; replicas ok={:?} failed={:?}",
            object.file_id,
            object.size_bytes,
            self.topology.local_node_id(),
            replication.succeeded,
            replication.failed
        );

        Ok(PutFileOperationResult {
            object,
            replication,
            placement,
        })
    }
}
