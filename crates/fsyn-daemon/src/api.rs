// api.rs - HTTP routes over the core transfer operations.
//
//   GET  /endpoints/list            -> {endpoints: [...]}
//   GET  /endpoints/{endpoint}      -> {tree: {...}}
//   GET  /files/{*descriptor}       -> raw bytes, streamed
//   GET  /hash/{*descriptor}        -> {hash, file}
//   PUT  /files                     -> {} (x-file-path, x-force, x-recursive)
//
// Core operations are blocking and run on tokio's blocking pool. Upload
// bodies are streamed into the core writer, never buffered whole.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use tokio::io::AsyncReadExt;
use tokio_stream::{Stream, StreamExt};
use tokio_util::io::{StreamReader, SyncIoBridge};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use fsyn_core::{
    EndpointListing, FileHash, FsynError, TokenSet, Transfer, TreeListing, UploadRequest,
};

use crate::config::{ConfigError, DaemonConfig};
use crate::envelope::{ok, ApiError, Empty, Envelope};

const DOWNLOAD_CHUNK: usize = 64 * 1024;

const HEADER_FILE_PATH: &str = "x-file-path";
const HEADER_FORCE: &str = "x-force";
const HEADER_RECURSIVE: &str = "x-recursive";

/// Shared, read-only handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub transfer: Arc<Transfer>,
    pub tokens: Arc<TokenSet>,
}

impl AppState {
    pub fn new(transfer: Transfer, tokens: TokenSet) -> Self {
        Self {
            transfer: Arc::new(transfer),
            tokens: Arc::new(tokens),
        }
    }

    pub fn from_config(config: &DaemonConfig) -> Result<Self, ConfigError> {
        let table = config.endpoint_table()?;
        let transfer = Transfer::local(Arc::new(table), config.transfer_settings());
        Ok(Self::new(transfer, config.token_set()))
    }
}

/// Request-level limits applied around the routes. The upload ceiling
/// lives in [`fsyn_core::TransferSettings`] because it is enforced while
/// the body streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub request_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        DaemonConfig::default().limits()
    }
}

/// The full application: routes, auth, timeout and tracing.
pub fn app(state: AppState, limits: Limits) -> Router {
    routes(state)
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(middleware::map_response(envelope_bare_failures))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Routes with the auth layer, without transport limits.
pub fn routes(state: AppState) -> Router {
    Router::new()
        // Registered before the parameter route; static segments win.
        .route("/endpoints/list", get(list_endpoints))
        .route("/endpoints/{endpoint}", get(list_tree))
        .route("/files", put(upload))
        .route("/files/{*descriptor}", get(download))
        .route("/hash/{*descriptor}", get(hash))
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .with_state(state)
}

/// Rejects requests without a configured bearer token. A no-op when the
/// token set is empty.
async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.tokens.is_empty() {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap_or("<non-ascii>"));
        state.tokens.authorize(header)?;
    }
    Ok(next.run(request).await)
}

async fn list_endpoints(State(state): State<AppState>) -> Json<Envelope<EndpointListing>> {
    ok(state.transfer.list_endpoints())
}

async fn list_tree(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
) -> Result<Json<Envelope<TreeListing>>, ApiError> {
    let transfer = Arc::clone(&state.transfer);
    let listing = blocking(move || transfer.list_tree(&endpoint)).await?;
    Ok(ok(listing))
}

async fn download(
    State(state): State<AppState>,
    Path(descriptor): Path<String>,
) -> Result<Response, ApiError> {
    let transfer = Arc::clone(&state.transfer);
    let download = blocking(move || transfer.download(&descriptor)).await?;

    tracing::debug!(
        "streaming {} ({} bytes)",
        download.path.display(),
        download.size
    );
    let file = tokio::fs::File::from_std(download.reader);
    Response::builder()
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, download.size)
        .body(Body::from_stream(file_chunks(file)))
        .map_err(|e| ApiError::Internal(format!("building download response: {}", e)))
}

async fn hash(
    State(state): State<AppState>,
    Path(descriptor): Path<String>,
) -> Result<Json<Envelope<FileHash>>, ApiError> {
    let transfer = Arc::clone(&state.transfer);
    let hashed = blocking(move || transfer.hash(&descriptor)).await?;
    Ok(ok(hashed))
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let descriptor = header_value(&headers, HEADER_FILE_PATH);
    if descriptor.is_empty() {
        return Err(FsynError::MissingField {
            field: HEADER_FILE_PATH,
        }
        .into());
    }
    if let Some(declared) = content_length(&headers) {
        state.transfer.check_upload_size(descriptor, declared)?;
    }
    let request = UploadRequest {
        descriptor: descriptor.to_string(),
        force: header_flag(&headers, HEADER_FORCE),
        recursive: header_flag(&headers, HEADER_RECURSIVE),
    };

    // The bridge must be created on the runtime, then read from the
    // blocking pool.
    let chunks = body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other));
    let reader = SyncIoBridge::new(StreamReader::new(chunks));

    let transfer = Arc::clone(&state.transfer);
    blocking(move || transfer.upload(&request, reader)).await?;
    Ok(ok(Empty {}))
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::Rejected(StatusCode::METHOD_NOT_ALLOWED)
}

/// Re-render failures produced outside the handlers (timeouts, extractor
/// rejections) as failure envelopes. Envelopes and successes pass through.
async fn envelope_bare_failures(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if is_json {
        return response;
    }
    ApiError::Rejected(status).into_response()
}

/// Run a core operation on the blocking pool.
async fn blocking<T, F>(op: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, FsynError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Read a file in fixed-size chunks for a streaming body.
fn file_chunks(mut file: tokio::fs::File) -> impl Stream<Item = io::Result<Bytes>> {
    try_stream! {
        let mut buf = vec![0u8; DOWNLOAD_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            yield Bytes::copy_from_slice(&buf[..n]);
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Only the exact value `true` enables a flag.
fn header_flag(headers: &HeaderMap, name: &str) -> bool {
    header_value(headers, name) == "true"
}
