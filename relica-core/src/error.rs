use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelicaError>;

#[derive(Debug, Error)]
pub enum RelicaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The upload body stream failed before it was fully consumed.
    #[error("Failed to read upload body: {0}")]
    BodyRead(std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Peer {node_id} rejected replica with status {status}")]
    PeerRejected { node_id: String, status: u16 },

    #[error("Peer {node_id} did not answer within {timeout_ms}ms")]
    PeerTimeout { node_id: String, timeout_ms: u128 },

    #[error("Naming service rejected {endpoint} with status {status}")]
    NamingRejected { endpoint: String, status: u16 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for RelicaError {
    fn from(error: reqwest::Error) -> Self {
        RelicaError::Http(error.to_string())
    }
}
