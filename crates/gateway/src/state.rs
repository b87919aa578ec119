//! Shared application state passed to the HTTP handlers.

use std::sync::Arc;

use gc_domain::config::Config;
use gc_store::{ArtifactStore, EventStore, SessionStore, TaskStore};

use crate::gateway::Gateway;

/// Handler-facing state. Fields are grouped by concern:
/// - **Config** — the loaded daemon configuration
/// - **Stores** — sessions, events, artifacts, tasks
/// - **Ingress** — the gateway runs land on
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub events: Arc<EventStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub tasks: Arc<TaskStore>,
    pub gateway: Arc<Gateway>,
}
