//! HTTP API server.
//!
//! Exposes job start/poll endpoints and the audio delivery route. Job
//! starts return 202 immediately; processing happens in a background task
//! and clients poll the status endpoint until `completed` or `error`.

pub mod audio;
pub mod range;

use crate::config::Settings;
use crate::pipeline::Pipeline;
use crate::status::{JobKey, JobStatus, StatusTracker};
use crate::storage::LocalObjectStore;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Default owner for requests that don't specify one.
const DEFAULT_OWNER: &str = "local";

/// Shared application state.
pub struct AppState {
    pipeline: Arc<Pipeline>,
    tracker: StatusTracker,
    store: Arc<LocalObjectStore>,
}

/// Build the API router over a pipeline.
pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    let state = Arc::new(AppState {
        tracker: pipeline.tracker(),
        store: pipeline.store(),
        pipeline,
    });

    // Assets are consumed from separate web origins, so every route
    // carries permissive CORS headers.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/process", post(process))
        .route("/api/sessions/{resource_id}/status", get(status))
        .route("/api/sessions/{resource_id}/audio", get(serve_audio))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP API server.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let tracker = StatusTracker::new();
    let pipeline = Arc::new(Pipeline::new(settings.clone(), tracker)?);
    let app = build_router(pipeline);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ProcessRequest {
    /// External resource identifier of the session to ingest.
    #[serde(default)]
    resource_id: String,
    /// Billing/ownership identity; defaults to "local".
    #[serde(default)]
    owner_id: Option<String>,
}

#[derive(Serialize)]
struct ProcessResponse {
    status: &'static str,
    owner_id: String,
    resource_id: String,
}

#[derive(Deserialize)]
struct OwnerQuery {
    #[serde(default)]
    owner_id: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: crate::status::JobState,
    message: String,
    progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<JobStatus> for StatusResponse {
    fn from(status: JobStatus) -> Self {
        Self {
            status: status.state,
            message: status.message,
            progress: status.progress,
            error: status.error,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Start processing a session. Returns 202 with the job key; the caller
/// polls the status endpoint. A key that is already processing is
/// rejected with 409, not queued.
async fn process(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> Response {
    if req.resource_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "resource_id is required".to_string(),
            }),
        )
            .into_response();
    }

    let owner = req.owner_id.unwrap_or_else(|| DEFAULT_OWNER.to_string());
    let key = JobKey::new(owner.clone(), req.resource_id.trim().to_string());

    if !state.tracker.start(&key).await {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Session {} is already processing", key.resource_id),
            }),
        )
            .into_response();
    }

    info!("Accepted job {}", key);
    state.pipeline.clone().spawn(key.clone());

    (
        StatusCode::ACCEPTED,
        Json(ProcessResponse {
            status: "accepted",
            owner_id: key.owner_id,
            resource_id: key.resource_id,
        }),
    )
        .into_response()
}

/// Poll job status. Unknown keys report `not_started` rather than 404.
async fn status(
    State(state): State<Arc<AppState>>,
    Path(resource_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> impl IntoResponse {
    let owner = query.owner_id.unwrap_or_else(|| DEFAULT_OWNER.to_string());
    let key = JobKey::new(owner, resource_id);
    let status = state.tracker.get(&key).await;
    Json(StatusResponse::from(status))
}

/// Serve the persisted audio asset; see `audio` module for the full
/// status-code/header matrix.
async fn serve_audio(
    State(state): State<Arc<AppState>>,
    Path(resource_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    audio::audio_response(&state.store, &resource_id, range_header).await
}
