//! Webhook triggers — fire a prompt at the assistant over HTTP and wait
//! for the reply.
//!
//! - `POST /webhook` with `{prompt, session_key}` runs an ad-hoc prompt.
//! - `POST /webhook/<name>` runs a stored task; an optional `{prompt}`
//!   body overrides the task's stored prompt.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tokio::sync::oneshot;

use gc_domain::event::InboundMessage;
use gc_domain::Error;

use crate::gateway::RunOptions;
use crate::state::AppState;

use super::api_error;

#[derive(Deserialize)]
pub struct AdhocRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    session_key: Option<String>,
}

#[derive(Deserialize)]
pub struct TaskTriggerRequest {
    #[serde(default)]
    prompt: Option<String>,
}

/// `POST /webhook`
pub async fn trigger_adhoc(State(state): State<AppState>, body: Bytes) -> Response {
    let req = match serde_json::from_slice::<AdhocRequest>(&body) {
        Ok(req) => req,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}")),
    };
    let Some(prompt) = req.prompt.filter(|p| !p.is_empty()) else {
        return api_error(StatusCode::BAD_REQUEST, "missing field: prompt");
    };
    let Some(session_key) = req.session_key.filter(|k| !k.is_empty()) else {
        return api_error(StatusCode::BAD_REQUEST, "missing field: session_key");
    };

    run_and_wait(&state, session_key, prompt).await
}

/// `POST /webhook/:name` — the body is optional; when present,
/// `{prompt}` overrides the task's stored prompt.
pub async fn trigger_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let task = match state.tasks.get(&name) {
        Ok(task) => task,
        Err(_) => return api_error(StatusCode::NOT_FOUND, format!("unknown task \"{name}\"")),
    };
    if !task.enabled {
        return api_error(StatusCode::FORBIDDEN, format!("task \"{name}\" is disabled"));
    }

    let override_prompt = serde_json::from_slice::<TaskTriggerRequest>(&body)
        .ok()
        .and_then(|b| b.prompt)
        .filter(|p| !p.is_empty());
    let prompt = override_prompt.unwrap_or(task.prompt);

    run_and_wait(&state, task.session_key, prompt).await
}

/// Enqueue the prompt and block until its turn completes, so the HTTP
/// caller gets the reply in the response body.
async fn run_and_wait(state: &AppState, session_key: String, prompt: String) -> Response {
    let (tx, rx) = oneshot::channel::<String>();

    let message = InboundMessage {
        session_key,
        text: prompt,
        source: "webhook".into(),
    };
    let options = RunOptions::new().with_on_complete(move |reply| {
        let _ = tx.send(reply);
    });

    if let Err(e) = state.gateway.handle_inbound(message, options) {
        return match e {
            Error::QueueFull(_) => api_error(StatusCode::SERVICE_UNAVAILABLE, "busy, try again later"),
            other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
    }

    match rx.await {
        Ok(reply) => (StatusCode::OK, Json(serde_json::json!({ "response": reply }))).into_response(),
        Err(_) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "run was dropped before completion",
        ),
    }
}
