//! Debug read API over the stores.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::state::AppState;

use super::api_error;

const DEFAULT_EVENT_LIMIT: usize = 50;

/// `GET /api/sessions` — all session index entries, most recently
/// updated first.
pub async fn list_sessions(State(state): State<AppState>) -> Response {
    let mut sessions = state.sessions.list();
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Json(sessions).into_response()
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    limit: Option<usize>,
}

/// `GET /api/sessions/:id/events?limit=N` — the session's newest events
/// in ascending order.
pub async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    match state.events.tail(&session_id, limit) {
        Ok(events) => Json(events).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `GET /api/artifacts/:id` — the raw artifact data.
pub async fn artifact_data(State(state): State<AppState>, Path(artifact_id): Path<String>) -> Response {
    match state.artifacts.get(&artifact_id) {
        Ok(data) => data.into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, format!("artifact {artifact_id} not found")),
    }
}
