//! The webhook HTTP surface: health, webhook triggers, and the debug
//! read API over sessions, events, and artifacts.

pub mod debug;
pub mod webhook;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook::trigger_adhoc))
        .route("/webhook/:name", post(webhook::trigger_task))
        .route("/api/sessions", get(debug::list_sessions))
        .route("/api/sessions/:id/events", get(debug::session_events))
        .route("/api/artifacts/:id", get(debug::artifact_data))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
