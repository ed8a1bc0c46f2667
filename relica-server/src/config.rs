use relica_core::{NodeInfo, NodeTopology, RelicaError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node_id: String,
    pub bind_addr: String,
    pub data_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    pub cluster: ClusterConfig,
    pub naming: NamingConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
}

/// Every node of the cluster, including this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: Vec<ClusterNodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNodeConfig {
    pub node_id: String,
    /// Base URL peers use to reach the node, e.g. `http://10.0.0.2:8001`.
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    pub base_url: String,
    #[serde(default = "default_naming_timeout_secs")]
    pub timeout_secs: u64,
}

impl NamingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    #[serde(default = "default_peer_timeout_secs")]
    pub peer_timeout_secs: u64,
}

impl ReplicationConfig {
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            peer_timeout_secs: default_peer_timeout_secs(),
        }
    }
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024
}

fn default_naming_timeout_secs() -> u64 {
    relica_core::DEFAULT_NAMING_TIMEOUT.as_secs()
}

fn default_peer_timeout_secs() -> u64 {
    relica_core::DEFAULT_PEER_TIMEOUT.as_secs()
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("RELICA").separator("__"))
            .build()
            .map_err(|e| RelicaError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| RelicaError::Config(e.to_string()))?;

        if config.replication.peer_timeout_secs == 0 {
            return Err(RelicaError::Config(
                "replication.peer_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn topology(&self) -> Result<NodeTopology> {
        let nodes = self
            .cluster
            .nodes
            .iter()
            .map(|node| NodeInfo::new(node.node_id.clone(), node.address.clone()))
            .collect();
        NodeTopology::new(&self.node_id, nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
node_id: sn-2
bind_addr: 0.0.0.0:8002
data_dir: /var/lib/relica/sn-2
cluster:
  nodes:
    - node_id: sn-1
      address: http://10.0.0.1:8001
    - node_id: sn-2
      address: http://10.0.0.2:8002
    - node_id: sn-3
      address: http://10.0.0.3:8003
naming:
  base_url: http://10.0.0.10:8080
"#;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("relica.yaml");
        std::fs::write(&path, contents).unwrap();
        (temp_dir, path.to_string_lossy().to_string())
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let (_temp_dir, path) = write_config(SAMPLE);
        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.node_id, "sn-2");
        assert_eq!(config.max_upload_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.naming.timeout(), relica_core::DEFAULT_NAMING_TIMEOUT);
        assert_eq!(
            config.replication.peer_timeout(),
            relica_core::DEFAULT_PEER_TIMEOUT
        );

        let topology = config.topology().unwrap();
        let peers: Vec<&str> = topology.peers().iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(peers, vec!["sn-1", "sn-3"]);
    }

    #[test]
    fn test_node_missing_from_cluster_is_rejected() {
        let contents = SAMPLE.replace("node_id: sn-2\nbind", "node_id: sn-9\nbind");
        let (_temp_dir, path) = write_config(&contents);
        let config = Config::from_file(&path).unwrap();
        assert!(matches!(config.topology(), Err(RelicaError::Config(_))));
    }

    #[test]
    fn test_zero_peer_timeout_is_rejected() {
        let contents = format!("{}replication:\n  peer_timeout_secs: 0\n", SAMPLE);
        let (_temp_dir, path) = write_config(&contents);
        assert!(Config::from_file(&path).is_err());
    }
}
