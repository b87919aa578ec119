//! Session index entries — the durable mapping between external session
//! keys and internal session IDs, plus per-session bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Archived,
}

/// One entry in the session index. The `session_key → session_id` mapping
/// is injective and stable for the lifetime of the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIndex {
    pub session_id: String,
    pub session_key: String,
    pub agent: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<String>,
    #[serde(default)]
    pub last_event_seq: u64,
}

impl SessionIndex {
    /// Fresh index entry for a first-seen session key.
    pub fn new(session_key: &str, agent: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: new_id(),
            session_key: session_key.to_owned(),
            agent: agent.to_owned(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            last_run_id: None,
            last_event_seq: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_defaults() {
        let s = SessionIndex::new("telegram:1:2", "default");
        assert_eq!(s.session_key, "telegram:1:2");
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.created_at, s.updated_at);
        assert!(s.last_run_id.is_none());
        assert_eq!(s.last_event_seq, 0);
    }

    #[test]
    fn status_snake_case() {
        assert_eq!(serde_json::to_string(&SessionStatus::Active).unwrap(), "\"active\"");
        assert_eq!(serde_json::to_string(&SessionStatus::Archived).unwrap(), "\"archived\"");
    }
}
