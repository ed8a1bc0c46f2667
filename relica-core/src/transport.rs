use crate::error::{RelicaError, Result};
use crate::identity::FileId;
use crate::topology::NodeInfo;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// A locally stored file to be pushed to peers under its shared identifier.
#[derive(Debug, Clone)]
pub struct ReplicaPush {
    pub file_id: FileId,
    pub original_filename: String,
    pub payload_path: PathBuf,
    pub size_bytes: u64,
}

/// Delivers replica writes to other storage nodes.
///
/// Every request sent through this trait is marked as a replica so the
/// receiving node never fans it out again.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn push_replica(&self, peer: &NodeInfo, push: &ReplicaPush) -> Result<()>;
}

/// HTTP transport speaking the node's own upload endpoint.
pub struct ClusterClient {
    client: reqwest::Client,
}

impl ClusterClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RelicaError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PeerTransport for ClusterClient {
    async fn push_replica(&self, peer: &NodeInfo, push: &ReplicaPush) -> Result<()> {
        let file = tokio::fs::File::open(&push.payload_path).await?;
        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::from(file),
            push.size_bytes,
        )
        .file_name(push.original_filename.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(peer.url("/files"))
            .query(&[("file_id", push.file_id.as_str()), ("is_replica", "true")])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelicaError::PeerRejected {
                node_id: peer.node_id.clone(),
                status: status.as_u16(),
            });
        }

        tracing::debug!("Replica of {} accepted by {}", push.file_id, peer.node_id);
        Ok(())
    }
}
