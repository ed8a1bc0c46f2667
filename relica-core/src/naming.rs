use crate::error::{RelicaError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_NAMING_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `POST /files/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRegistration {
    pub file_key: String,
    pub original_filename: String,
    pub size_bytes: u64,
    pub checksum_sha256: String,
    pub node_id: String,
    pub failed_nodes: Vec<String>,
}

/// Body of `POST /files/register-location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRegistration {
    pub file_key: String,
    pub node_id: String,
}

/// The external service tracking which nodes hold which file.
#[async_trait]
pub trait NamingService: Send + Sync {
    async fn register(&self, registration: &FileRegistration) -> Result<()>;

    async fn register_location(&self, location: &LocationRegistration) -> Result<()>;
}

pub struct HttpNamingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNamingClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RelicaError::Config(
                "naming service base_url cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RelicaError::Http(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    async fn post_json<T: Serialize + Sync>(&self, endpoint: &str, body: &T) -> Result<()> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelicaError::NamingRejected {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NamingService for HttpNamingClient {
    async fn register(&self, registration: &FileRegistration) -> Result<()> {
        self.post_json("/files/register", registration).await
    }

    async fn register_location(&self, location: &LocationRegistration) -> Result<()> {
        self.post_json("/files/register-location", location).await
    }
}
