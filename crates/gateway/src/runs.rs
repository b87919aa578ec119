//! Run tracking — the in-memory wrapper around one processing attempt of
//! one inbound event.
//!
//! Runs are deliberately not persisted: on restart, in-flight and queued
//! runs are lost and only the appended events survive.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gc_domain::event::InboundMessage;
use gc_domain::new_id;

/// Continuation invoked with the final reply text. Boxed `FnOnce`, so it
/// fires at most once by construction.
pub type OnComplete = Box<dyn FnOnce(String) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

pub struct Run {
    pub id: String,
    pub session_id: String,
    pub event: InboundMessage,
    pub status: RunStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub on_complete: Option<OnComplete>,
}

impl Run {
    pub fn new(session_id: String, event: InboundMessage) -> Self {
        Self {
            id: new_id(),
            session_id,
            event,
            status: RunStatus::Queued,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            error: None,
            on_complete: None,
        }
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

impl std::fmt::Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("status", &self.status)
            .field("attempts", &self.attempts)
            .field("error", &self.error)
            .field("has_on_complete", &self.on_complete.is_some())
            .finish()
    }
}
