//! HTTP API over the status tree
//!
//! Paths under `/api/status` and `/api/query` map one to one onto status
//! URLs: `/api/status/lights/porch` addresses `<scheme>://lights/porch`.
//!
//! - `GET /api/status/{path}` reads a node; with `?revision=N` it long-polls
//!   until the node's revision differs from `N`
//! - `PUT /api/status/{path}?revision=...` writes the JSON body
//! - `DELETE /api/status/{path}?revision=...` removes the node
//! - `GET /api/query/{pattern}` expands a wildcard pattern

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hub_core::{Entry, Matches, Revision, StatusError, StatusResult};
use hub_status::Status;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub status: Status,
    /// Upper bound for a single long-poll request
    pub long_poll_timeout: Duration,
}

impl AppState {
    pub fn new(status: Status, long_poll_timeout: Duration) -> Self {
        Self {
            status,
            long_poll_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}://{}", self.status.scheme(), path)
    }
}

/// Optional revision contract or long-poll base
#[derive(Debug, Default, Deserialize)]
pub struct RevisionQuery {
    pub revision: Option<String>,
}

impl RevisionQuery {
    fn parse(&self) -> StatusResult<Option<Revision>> {
        self.revision.as_deref().map(str::parse).transpose()
    }
}

/// Response to a successful write
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    pub revision: u64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn error_response(err: StatusError) -> ApiError {
    let code = match &err {
        StatusError::NotFound { .. } => StatusCode::NOT_FOUND,
        StatusError::NotContainer { .. }
        | StatusError::RevisionMismatch { .. }
        | StatusError::AlreadyExists { .. } => StatusCode::CONFLICT,
        StatusError::InvalidUrl { .. }
        | StatusError::EmptySegment { .. }
        | StatusError::SchemeMismatch { .. }
        | StatusError::WildcardNotAllowed { .. }
        | StatusError::UnsupportedValue { .. }
        | StatusError::InvalidRevision { .. }
        | StatusError::Json(_) => StatusCode::BAD_REQUEST,
    };
    debug!(status = %code, error = %err, "Request failed");
    (
        code,
        Json(ErrorResponse {
            message: err.to_string(),
        }),
    )
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/status",
            get(get_root).put(put_root).delete(delete_root),
        )
        .route(
            "/api/status/*path",
            get(get_node).put(put_node).delete(delete_node),
        )
        .route("/api/query", get(query_root))
        .route("/api/query/*pattern", get(query_pattern))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server
pub async fn start_server(state: AppState, addr: &str) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, router).await
}

// ==================== Handlers ====================

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn get_root(
    State(state): State<AppState>,
    Query(query): Query<RevisionQuery>,
) -> ApiResult<Entry> {
    read(&state, "", &query).await
}

/// GET /api/status/{path} - Read a node, optionally long-polling
async fn get_node(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<RevisionQuery>,
) -> ApiResult<Entry> {
    read(&state, &path, &query).await
}

async fn put_root(
    State(state): State<AppState>,
    Query(query): Query<RevisionQuery>,
    Json(value): Json<serde_json::Value>,
) -> ApiResult<WriteResponse> {
    write(&state, "", &query, value)
}

/// PUT /api/status/{path} - Write a node
async fn put_node(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<RevisionQuery>,
    Json(value): Json<serde_json::Value>,
) -> ApiResult<WriteResponse> {
    write(&state, &path, &query, value)
}

async fn delete_root(
    State(state): State<AppState>,
    Query(query): Query<RevisionQuery>,
) -> ApiResult<WriteResponse> {
    delete(&state, "", &query)
}

/// DELETE /api/status/{path} - Remove a node
async fn delete_node(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<RevisionQuery>,
) -> ApiResult<WriteResponse> {
    delete(&state, &path, &query)
}

async fn query_root(State(state): State<AppState>) -> ApiResult<Matches> {
    query(&state, "")
}

/// GET /api/query/{pattern} - Expand a wildcard pattern
async fn query_pattern(
    State(state): State<AppState>,
    Path(pattern): Path<String>,
) -> ApiResult<Matches> {
    query(&state, &pattern)
}

// ==================== Store access ====================

async fn read(state: &AppState, path: &str, query: &RevisionQuery) -> ApiResult<Entry> {
    let url = state.url(path);
    let entry = match query.parse().map_err(error_response)? {
        None | Some(Revision::Unchecked) => state.status.get(&url),
        Some(Revision::MustNotExist) => wait_for_change(state, &url, None).await,
        Some(Revision::Exact(since)) => wait_for_change(state, &url, Some(since)).await,
    };
    entry.map(Json).map_err(error_response)
}

/// Wait until the node's revision differs from `since`
///
/// `None` waits for the node to exist. Returns the current state of the node
/// when the timeout elapses without a change.
async fn wait_for_change(state: &AppState, url: &str, since: Option<u64>) -> StatusResult<Entry> {
    state.status.parse(url)?.require_concrete()?;

    let mut receiver = state.status.watch(url)?;
    let deadline = tokio::time::sleep(state.long_poll_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            delivery = receiver.recv() => {
                let Some(matches) = delivery else { break };
                let current = matches.into_values().next();
                match (current, since) {
                    (Some(entry), None) => return Ok(entry),
                    (Some(entry), Some(since)) if entry.revision != since => return Ok(entry),
                    (None, Some(_)) => {
                        return Err(StatusError::NotFound { url: url.to_string() });
                    }
                    _ => {}
                }
            }
            _ = &mut deadline => {
                debug!(url, "Long poll timed out");
                break;
            }
        }
    }

    state.status.get(url)
}

fn write(
    state: &AppState,
    path: &str,
    query: &RevisionQuery,
    value: serde_json::Value,
) -> ApiResult<WriteResponse> {
    let expected = query.parse().map_err(error_response)?.unwrap_or_default();
    let revision = state
        .status
        .set(&state.url(path), value, expected)
        .map_err(error_response)?;
    Ok(Json(WriteResponse { revision }))
}

fn delete(state: &AppState, path: &str, query: &RevisionQuery) -> ApiResult<WriteResponse> {
    let expected = query.parse().map_err(error_response)?.unwrap_or_default();
    let revision = state
        .status
        .remove(&state.url(path), expected)
        .map_err(error_response)?;
    Ok(Json(WriteResponse { revision }))
}

fn query(state: &AppState, pattern: &str) -> ApiResult<Matches> {
    state
        .status
        .expand(&state.url(pattern))
        .map(Json)
        .map_err(error_response)
}
