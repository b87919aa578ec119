//! Artifacts — out-of-band blobs for tool results too large to keep
//! inline in the event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::new_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub id: String,
    pub session_id: String,
    pub run_id: String,
    pub tool: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The persisted envelope: `{meta, data}`, written exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub meta: ArtifactMeta,
    pub data: String,
}

impl Artifact {
    pub fn new(session_id: &str, run_id: &str, tool: &str, data: String) -> Self {
        Self {
            meta: ArtifactMeta {
                id: new_id(),
                session_id: session_id.to_owned(),
                run_id: run_id.to_owned(),
                tool: tool.to_owned(),
                created_at: Utc::now(),
                mime_type: None,
            },
            data,
        }
    }
}
