//! HTTP request handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::state::AppState;
use crate::service::StatsSummary;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and status
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        // Rephrase lifecycle
        .route("/v1/rephrase", post(create_rephrase))
        .route("/v1/rephrase/stream", get(stream_rephrase))
        .route("/v1/rephrase/:request_id", delete(cancel_rephrase))
        .with_state(state)
}

/// Root endpoint
async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "message": format!("{} Backend", state.app_name) }))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Counters endpoint
async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsSummary> {
    Json(state.service.stats())
}

/// Rephrase create request
#[derive(Debug, Deserialize)]
pub struct RephraseRequest {
    /// Text to rewrite
    pub text: String,
    /// Styles to rewrite into, in order
    pub styles: Vec<String>,
}

/// Rephrase create response
#[derive(Debug, Serialize, Deserialize)]
pub struct RephraseResponse {
    /// Id to stream or cancel the job with
    pub request_id: String,
}

/// Create a rephrase job
async fn create_rephrase(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RephraseRequest>,
) -> Json<RephraseResponse> {
    let request_id = state.service.create_request(req.text, req.styles);
    Json(RephraseResponse { request_id })
}

/// Stream query parameters
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Job to stream
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Stream the events of a job
async fn stream_rephrase(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> Response {
    let Some(request_id) = params.request_id.filter(|id| !id.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "request_id is required"})),
        )
            .into_response();
    };

    let events = state
        .service
        .stream_rephrase(state.stream_token(), &request_id)
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(events),
    )
        .into_response()
}

/// Cancel a job
async fn cancel_rephrase(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> impl IntoResponse {
    if state.service.cancel_request(&request_id) {
        (
            StatusCode::OK,
            Json(json!({"message": format!("Request {request_id} canceled successfully")})),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Request not found or already completed"})),
        )
    }
}
