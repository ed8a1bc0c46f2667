//! Fan-out of freshly stored originals to every peer.
//!
//! All peers are contacted at once and the call waits for each of them to
//! answer or time out. Peer failures are collected into the outcome; nothing
//! is retried and nothing is raised to the caller.

use crate::error::RelicaError;
use crate::topology::NodeInfo;
use crate::transport::{PeerTransport, ReplicaPush};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(30);

/// Peers partitioned by whether they accepted the replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationOutcome {
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    /// Failure reason per node in `failed`.
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct ReplicationCoordinator {
    transport: Arc<dyn PeerTransport>,
    peer_timeout: Duration,
}

impl ReplicationCoordinator {
    pub fn new(transport: Arc<dyn PeerTransport>, peer_timeout: Duration) -> Self {
        Self {
            transport,
            peer_timeout,
        }
    }

    pub async fn fan_out(&self, push: &ReplicaPush, peers: &[NodeInfo]) -> ReplicationOutcome {
        let attempts = peers.iter().map(|peer| async move {
            let push_replica = self.transport.push_replica(peer, push);
            let result = match tokio::time::timeout(self.peer_timeout, push_replica).await {
                Ok(result) => result,
                Err(_) => Err(RelicaError::PeerTimeout {
                    node_id: peer.node_id.clone(),
                    timeout_ms: self.peer_timeout.as_millis(),
                }),
            };
            (peer, result)
        });

        let mut outcome = ReplicationOutcome::default();
        for (peer, result) in join_all(attempts).await {
            match result {
                Ok(()) => {
                    outcome.succeeded.insert(peer.node_id.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        "Replication of {} to {} ({}) failed: {}",
                        push.file_id,
                        peer.node_id,
                        peer.address,
                        e
                    );
                    outcome.failed.insert(peer.node_id.clone());
                    outcome.errors.insert(peer.node_id.clone(), e.to_string());
                }
            }
        }

        tracing::info!(
            "Replicated {} to {}/{} peers (failed: {:?})",
            push.file_id,
            outcome.succeeded.len(),
            peers.len(),
            outcome.failed
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::identity::FileId;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Barrier;

    #[derive(Clone, Copy)]
    enum PeerBehaviour {
        Accept,
        Reject,
        Hang,
    }

    struct ScriptedTransport {
        behaviours: BTreeMap<String, PeerBehaviour>,
        calls: Mutex<Vec<String>>,
        barrier: Option<Barrier>,
    }

    impl ScriptedTransport {
        fn new(behaviours: &[(&str, PeerBehaviour)]) -> Self {
            Self {
                behaviours: behaviours
                    .iter()
                    .map(|(id, b)| (id.to_string(), *b))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                barrier: None,
            }
        }
    }

    #[async_trait]
    impl PeerTransport for ScriptedTransport {
        async fn push_replica(&self, peer: &NodeInfo, _push: &ReplicaPush) -> Result<()> {
            self.calls.lock().unwrap().push(peer.node_id.clone());
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            match self.behaviours[&peer.node_id] {
                PeerBehaviour::Accept => Ok(()),
                PeerBehaviour::Reject => Err(RelicaError::PeerRejected {
                    node_id: peer.node_id.clone(),
                    status: 500,
                }),
                PeerBehaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }
    }

    fn push() -> ReplicaPush {
        ReplicaPush {
            file_id: FileId::mint(),
            original_filename: "a.txt".to_string(),
            payload_path: "/nonexistent".into(),
            size_bytes: 1,
        }
    }

    fn peers(ids: &[&str]) -> Vec<NodeInfo> {
        ids.iter()
            .map(|id| NodeInfo::new(*id, format!("http://{}.invalid", id)))
            .collect()
    }

    #[tokio::test]
    async fn test_outcome_partitions_peers() {
        let transport = Arc::new(ScriptedTransport::new(&[
            ("b", PeerBehaviour::Accept),
            ("c", PeerBehaviour::Reject),
        ]));
        let coordinator = ReplicationCoordinator::new(transport.clone(), DEFAULT_PEER_TIMEOUT);

        let outcome = coordinator.fan_out(&push(), &peers(&["b", "c"])).await;

        assert_eq!(outcome.succeeded, BTreeSet::from(["b".to_string()]));
        assert_eq!(outcome.failed, BTreeSet::from(["c".to_string()]));
        assert!(outcome.errors["c"].contains("500"));
        assert!(!outcome.failed.is_empty());
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_slow_peer_times_out_without_affecting_others() {
        let transport = Arc::new(ScriptedTransport::new(&[
            ("b", PeerBehaviour::Accept),
            ("c", PeerBehaviour::Hang),
        ]));
        let coordinator = ReplicationCoordinator::new(transport, Duration::from_millis(50));

        let started = std::time::Instant::now();
        let outcome = coordinator.fan_out(&push(), &peers(&["b", "c"])).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.succeeded, BTreeSet::from(["b".to_string()]));
        assert_eq!(outcome.failed, BTreeSet::from(["c".to_string()]));
    }

    #[tokio::test]
    async fn test_requests_are_issued_concurrently() {
        // Every push waits on a barrier sized to the peer count, so sequential
        // dispatch would stall until the timeout and fail every peer.
        let mut transport = ScriptedTransport::new(&[
            ("b", PeerBehaviour::Accept),
            ("c", PeerBehaviour::Accept),
            ("d", PeerBehaviour::Accept),
        ]);
        transport.barrier = Some(Barrier::new(3));
        let coordinator =
            ReplicationCoordinator::new(Arc::new(transport), Duration::from_secs(5));

        let outcome = coordinator.fan_out(&push(), &peers(&["b", "c", "d"])).await;
        assert_eq!(outcome.succeeded.len(), 3);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn test_all_failed_and_no_peers_are_valid_outcomes() {
        let transport = Arc::new(ScriptedTransport::new(&[
            ("b", PeerBehaviour::Reject),
            ("c", PeerBehaviour::Reject),
        ]));
        let coordinator = ReplicationCoordinator::new(transport, DEFAULT_PEER_TIMEOUT);

        let outcome = coordinator.fan_out(&push(), &peers(&["b", "c"])).await;
        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.failed.len(), 2);

        let outcome = coordinator.fan_out(&push(), &[]).await;
        assert_eq!(outcome, ReplicationOutcome::default());
    }
}
