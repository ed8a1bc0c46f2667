use crate::config::Config;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures_util::{Stream, TryStreamExt};
use relica_core::{
    ClusterClient, ContentStore, DeleteFileOperation, DeleteFileOperationOutcome,
    DeleteFileOperationRequest, FileId, HttpNamingClient, NamingService, NodeTopology,
    PeerTransport, PlacementReporter, PutFileOperation, PutFileOperationRequest,
    PutReplicaOperation, PutReplicaOperationRequest, ReadFileOperation,
    ReadFileOperationOutcome, ReadFileOperationRequest, RelicaError, ReplicationCoordinator,
    ReplicationOutcome, Result, StoredObject, WriteKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub topology: Arc<NodeTopology>,
    pub put_file: PutFileOperation,
    pub put_replica: PutReplicaOperation,
    pub read_file: ReadFileOperation,
    pub delete_file: DeleteFileOperation,
}

impl ServerState {
    pub fn new(
        topology: Arc<NodeTopology>,
        store: Arc<ContentStore>,
        transport: Arc<dyn PeerTransport>,
        naming: Arc<dyn NamingService>,
        peer_timeout: Duration,
    ) -> Self {
        let coordinator = ReplicationCoordinator::new(transport, peer_timeout);
        let reporter = PlacementReporter::new(naming, topology.local_node_id());

        Self {
            put_file: PutFileOperation::new(
                store.clone(),
                topology.clone(),
                coordinator,
                reporter,
            ),
            put_replica: PutReplicaOperation::new(store.clone()),
            read_file: ReadFileOperation::new(store.clone()),
            delete_file: DeleteFileOperation::new(store),
            topology,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let topology = Arc::new(config.topology()?);
        let store = Arc::new(ContentStore::open(config.data_dir.clone())?);
        let transport = Arc::new(ClusterClient::new(config.replication.peer_timeout())?);
        let naming = Arc::new(HttpNamingClient::new(
            config.naming.base_url.clone(),
            config.naming.timeout(),
        )?);

        Ok(Self::new(
            topology,
            store,
            transport,
            naming,
            config.replication.peer_timeout(),
        ))
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    is_replica: bool,
}

/// Accepts the usual spellings of a boolean query flag.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid boolean flag {:?}",
            other
        ))),
    }
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    file_id: String,
    stored_name: String,
    original_filename: String,
    size_bytes: u64,
    checksum_sha256: String,
    node_id: String,
    /// `None` for replica writes, which are never fanned out.
    replication: Option<ReplicationOutcome>,
}

impl UploadResponse {
    fn new(object: StoredObject, node_id: &str, replication: Option<ReplicationOutcome>) -> Self {
        Self {
            file_id: object.file_id.to_string(),
            stored_name: object.stored_name,
            original_filename: object.original_filename,
            size_bytes: object.size_bytes,
            checksum_sha256: object.checksum_sha256,
            node_id: node_id.to_string(),
            replication,
        }
    }
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: bool,
    file_id: String,
}

pub fn build_router(state: Arc<ServerState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/files", post(upload_file))
        .route("/files/:file_id", get(download_file).delete(delete_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(ServerState::from_config(&config)?);

    tracing::info!(
        "Node {} serving {:?} with peers {:?}",
        state.topology.local_node_id(),
        config.data_dir,
        state
            .topology
            .peers()
            .iter()
            .map(|peer| peer.node_id.as_str())
            .collect::<Vec<_>>()
    );

    let app = build_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let peers: Vec<&str> = state
        .topology
        .peers()
        .iter()
        .map(|peer| peer.node_id.as_str())
        .collect();

    let response = serde_json::json!({
        "status": "UP",
        "node_id": state.topology.local_node_id(),
        "peers": peers,
    });

    (StatusCode::OK, Json(response))
}

async fn upload_file(
    State(state): State<Arc<ServerState>>,
    query: std::result::Result<Query<UploadQuery>, QueryRejection>,
    mut multipart: Multipart,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let kind = match WriteKind::from_params(query.file_id.as_deref(), query.is_replica) {
        Ok(kind) => kind,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "multipart field 'file' is required".to_string(),
                );
            }
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid multipart body: {}", e),
                );
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let original_filename = field.file_name().map(str::to_string);
        let body = field
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()));

        return store_upload(&state, kind, original_filename, body).await;
    }
}

async fn store_upload<S>(
    state: &ServerState,
    kind: WriteKind,
    original_filename: Option<String>,
    body: S,
) -> Response
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    let original_filename = original_filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| kind.file_id().to_string());
    let node_id = state.topology.local_node_id();

    let result = match kind {
        WriteKind::Original { file_id } => state
            .put_file
            .run(PutFileOperationRequest {
                file_id,
                original_filename,
                body,
            })
            .await
            .map(|result| UploadResponse::new(result.object, node_id, Some(result.replication))),
        WriteKind::Replica { file_id } => state
            .put_replica
            .run(PutReplicaOperationRequest {
                file_id,
                original_filename,
                body,
            })
            .await
            .map(|result| UploadResponse::new(result.object, node_id, None)),
    };

    match result {
        Ok(resp) => {
            let api_resp = ApiResponse {
                success: true,
                data: Some(resp),
                error: None,
            };
            (StatusCode::OK, Json(api_resp)).into_response()
        }
        Err(e) => {
            tracing::error!("Upload failed on {}: {}", node_id, e);
            error_response(status_for(&e), e.to_string())
        }
    }
}

async fn download_file(
    State(state): State<Arc<ServerState>>,
    Path(file_id): Path<String>,
) -> Response {
    let Ok(file_id) = FileId::parse(&file_id) else {
        return not_found(&file_id);
    };

    let result = match state
        .read_file
        .run(ReadFileOperationRequest {
            file_id: file_id.clone(),
        })
        .await
    {
        Ok(ReadFileOperationOutcome::Found(result)) => result,
        Ok(ReadFileOperationOutcome::NotFound) => return not_found(file_id.as_str()),
        Err(e) => {
            tracing::error!("Failed to resolve {}: {}", file_id, e);
            return error_response(status_for(&e), e.to_string());
        }
    };

    let file = match tokio::fs::File::open(&result.path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return not_found(file_id.as_str());
        }
        Err(e) => {
            tracing::error!("Failed to open {:?}: {}", result.path, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    let content_length = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result.media_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&result.display_name),
        );
    if let Some(checksum) = &result.checksum_sha256 {
        builder = builder.header("x-relica-sha256", checksum.as_str());
    }

    match builder.body(Body::from_stream(ReaderStream::new(file))) {
        Ok(response) => response,
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn delete_file(
    State(state): State<Arc<ServerState>>,
    Path(file_id): Path<String>,
) -> Response {
    let Ok(file_id) = FileId::parse(&file_id) else {
        return not_found(&file_id);
    };

    match state
        .delete_file
        .run(DeleteFileOperationRequest {
            file_id: file_id.clone(),
        })
        .await
    {
        Ok(DeleteFileOperationOutcome::Deleted { file_id }) => {
            let resp = ApiResponse {
                success: true,
                data: Some(DeleteResponse {
                    deleted: true,
                    file_id: file_id.to_string(),
                }),
                error: None,
            };
            (StatusCode::OK, Json(resp)).into_response()
        }
        Ok(DeleteFileOperationOutcome::NotFound) => not_found(file_id.as_str()),
        Err(e) => {
            tracing::error!("Failed to delete {}: {}", file_id, e);
            error_response(status_for(&e), e.to_string())
        }
    }
}

fn status_for(error: &RelicaError) -> StatusCode {
    match error {
        RelicaError::FileNotFound(_) => StatusCode::NOT_FOUND,
        RelicaError::InvalidRequest(_) | RelicaError::BodyRead(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn not_found(file_id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("File not found: {}", file_id))
}

fn error_response(status: StatusCode, message: String) -> Response {
    let resp = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message),
    };
    (status, Json(resp)).into_response()
}

/// `attachment` disposition with an ASCII fallback plus the RFC 5987 form
/// for names that are not plain ASCII.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == filename {
        return format!("attachment; filename=\"{}\"", fallback);
    }

    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}
