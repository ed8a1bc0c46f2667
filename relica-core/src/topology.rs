use crate::error::{RelicaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A storage node as known to every member of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    /// Base URL, e.g. `http://10.0.0.2:8001`.
    pub address: String,
}

impl NodeInfo {
    pub fn new(node_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            address: address.into(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address.trim_end_matches('/'), path)
    }
}

/// Static cluster map, fixed at startup. Peers are every node but this one.
#[derive(Debug, Clone)]
pub struct NodeTopology {
    local: NodeInfo,
    peers: Vec<NodeInfo>,
}

impl NodeTopology {
    pub fn new(local_node_id: &str, nodes: Vec<NodeInfo>) -> Result<Self> {
        let mut seen = HashSet::new();
        for node in &nodes {
            if node.node_id.trim().is_empty() {
                return Err(RelicaError::Config("node_id cannot be empty".to_string()));
            }
            if !seen.insert(node.node_id.as_str()) {
                return Err(RelicaError::Config(format!(
                    "node '{}' listed more than once in cluster",
                    node.node_id
                )));
            }
        }

        let (local, peers): (Vec<NodeInfo>, Vec<NodeInfo>) = nodes
            .into_iter()
            .partition(|node| node.node_id == local_node_id);

        let local = local.into_iter().next().ok_or_else(|| {
            RelicaError::Config(format!(
                "node_id '{}' not found in cluster nodes",
                local_node_id
            ))
        })?;

        Ok(Self { local, peers })
    }

    pub fn local_node_id(&self) -> &str {
        &self.local.node_id
    }

    pub fn peers(&self) -> &[NodeInfo] {
        &self.peers
    }
}
