//! The append-only event model.
//!
//! Every step of a conversation — inbound message, assistant reply, tool
//! call, tool result, fatal error — is persisted as one `Event` in the
//! owning session's log. `seq` is assigned by the event store at append
//! time and is strictly monotonic per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::new_id;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserMessage,
    AssistantMessage,
    ToolCall,
    ToolResult,
    Error,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One durable record in a session's event log.
///
/// The payload schema is a function of `kind` (see the constructors
/// below); it is stored as opaque JSON so readers that do not care about
/// a given type can pass it through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Assigned at append time; strictly monotonic per session, no gaps.
    #[serde(default)]
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub source: String,
    pub at: DateTime<Utc>,
    pub payload: Value,
}

impl Event {
    fn new(session_id: &str, run_id: Option<&str>, kind: EventType, source: &str, payload: Value) -> Self {
        Self {
            id: new_id(),
            session_id: session_id.to_owned(),
            run_id: run_id.map(str::to_owned),
            seq: 0,
            kind,
            source: source.to_owned(),
            at: Utc::now(),
            payload,
        }
    }

    /// Payload `{text}`.
    pub fn user_message(session_id: &str, run_id: Option<&str>, source: &str, text: &str) -> Self {
        Self::new(session_id, run_id, EventType::UserMessage, source, json!({ "text": text }))
    }

    /// Payload `{text}`.
    pub fn assistant_message(session_id: &str, run_id: Option<&str>, text: &str) -> Self {
        Self::new(
            session_id,
            run_id,
            EventType::AssistantMessage,
            "runtime",
            json!({ "text": text }),
        )
    }

    /// Payload `{tool, call_id, arguments}` — `arguments` is the raw JSON
    /// the model produced, passed through unparsed.
    pub fn tool_call(session_id: &str, run_id: Option<&str>, tool: &str, call_id: &str, arguments: Value) -> Self {
        Self::new(
            session_id,
            run_id,
            EventType::ToolCall,
            "runtime",
            json!({ "tool": tool, "call_id": call_id, "arguments": arguments }),
        )
    }

    /// Payload `{tool, call_id, result, artifact_id?}`.
    pub fn tool_result(
        session_id: &str,
        run_id: Option<&str>,
        tool: &str,
        call_id: &str,
        result: &str,
        artifact_id: Option<&str>,
    ) -> Self {
        let mut payload = json!({ "tool": tool, "call_id": call_id, "result": result });
        if let Some(aid) = artifact_id {
            payload["artifact_id"] = json!(aid);
        }
        Self::new(session_id, run_id, EventType::ToolResult, "runtime", payload)
    }

    /// Payload `{error}`.
    pub fn error(session_id: &str, run_id: Option<&str>, message: &str) -> Self {
        Self::new(session_id, run_id, EventType::Error, "runtime", json!({ "error": message }))
    }

    /// String field accessor into the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A channel-agnostic inbound message, before it is resolved to a session
/// and wrapped in a Run. `session_key` is the external stable identity
/// assigned by the ingress source (`telegram:<user>:<chat>`, `http:<name>`,
/// `task:<name>`).
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub session_key: String,
    pub text: String,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_snake_case() {
        assert_eq!(serde_json::to_string(&EventType::UserMessage).unwrap(), "\"user_message\"");
        assert_eq!(serde_json::to_string(&EventType::ToolResult).unwrap(), "\"tool_result\"");
    }

    #[test]
    fn user_message_payload_shape() {
        let ev = Event::user_message("sid", Some("rid"), "telegram", "hello");
        assert_eq!(ev.kind, EventType::UserMessage);
        assert_eq!(ev.source, "telegram");
        assert_eq!(ev.payload_str("text"), Some("hello"));
        assert_eq!(ev.run_id.as_deref(), Some("rid"));
        assert_eq!(ev.seq, 0, "seq is assigned by the store, not the constructor");
    }

    #[test]
    fn tool_result_payload_with_artifact() {
        let ev = Event::tool_result("sid", None, "bash", "tc_1", "out", Some("art-1"));
        assert_eq!(ev.payload_str("tool"), Some("bash"));
        assert_eq!(ev.payload_str("artifact_id"), Some("art-1"));
    }

    #[test]
    fn tool_result_payload_without_artifact() {
        let ev = Event::tool_result("sid", None, "bash", "tc_1", "out", None);
        assert!(ev.payload.get("artifact_id").is_none());
    }

    #[test]
    fn serde_roundtrip_preserves_type_tag() {
        let ev = Event::error("sid", None, "boom");
        let line = serde_json::to_string(&ev).unwrap();
        assert!(line.contains("\"type\":\"error\""));
        let back: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(back.kind, EventType::Error);
        assert_eq!(back.payload_str("error"), Some("boom"));
    }
}
