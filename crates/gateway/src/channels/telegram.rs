//! Telegram channel — long-poll ingress and chunked reply delivery.
//!
//! Inbound: a `getUpdates` loop (30s long poll) that turns each message
//! into an inbound event with session key `telegram:<user>:<chat>`.
//! Outbound: `sendMessage`, splitting replies into ordered chunks at
//! Telegram's 4096-character limit. The same sender is registered in the
//! delivery registry under the `telegram:` prefix so cron-fired replies
//! reach the chat too.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use gc_domain::config::TelegramConfig;
use gc_domain::event::InboundMessage;
use gc_domain::{Error, Result};

use crate::cancel::CancelToken;
use crate::delivery::DeliveryHandler;
use crate::gateway::{Gateway, RunOptions};

/// Telegram's hard message size limit.
pub const MAX_MESSAGE_LEN: usize = 4096;

const POLL_TIMEOUT_SECS: u64 = 30;
const ERROR_BACKOFF: Duration = Duration::from_secs(3);

const BUSY_REPLY: &str = "I'm a bit busy right now, please try again shortly.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sender
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outbound half: posts `sendMessage` calls, chunking long texts.
/// Registered in the delivery registry under the `telegram:` prefix.
#[derive(Clone)]
pub struct TelegramSender {
    client: reqwest::Client,
    api_base: String,
}

impl TelegramSender {
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: format!("https://api.telegram.org/bot{bot_token}"),
        }
    }

    pub async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_chunks(text, MAX_MESSAGE_LEN) {
            let response = self
                .client
                .post(format!("{}/sendMessage", self.api_base))
                .json(&json!({ "chat_id": chat_id, "text": chunk }))
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;
            if !response.status().is_success() {
                return Err(Error::Http(format!("sendMessage returned {}", response.status())));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryHandler for TelegramSender {
    async fn deliver(&self, session_key: &str, message: &str) -> Result<()> {
        let chat_id = chat_id_from_key(session_key)?;
        self.send(chat_id, message).await
    }
}

/// Parse `telegram:<user>:<chat>` back to the chat ID.
fn chat_id_from_key(session_key: &str) -> Result<i64> {
    let chat = session_key
        .split(':')
        .nth(2)
        .ok_or_else(|| Error::Other(format!("malformed telegram session key \"{session_key}\"")))?;
    chat.parse::<i64>()
        .map_err(|_| Error::Other(format!("malformed telegram session key \"{session_key}\"")))
}

/// Split into ordered chunks of at most `max` bytes, never inside a char.
pub fn split_chunks(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > max {
        let mut cut = max;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        chunks.push(rest[..cut].to_owned());
        rest = &rest[cut..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_owned());
    }
    chunks
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channel (long-poll loop)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TelegramChannel {
    client: reqwest::Client,
    api_base: String,
    sender: TelegramSender,
    allowed_user_ids: Vec<i64>,
    gateway: Arc<Gateway>,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig, gateway: Arc<Gateway>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: format!("https://api.telegram.org/bot{}", config.bot_token),
            sender: TelegramSender::new(&config.bot_token),
            allowed_user_ids: config.allowed_user_ids.clone(),
            gateway,
        }
    }

    pub fn session_key(user_id: i64, chat_id: i64) -> String {
        format!("telegram:{user_id}:{chat_id}")
    }

    /// Long-poll until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancelToken) {
        tracing::info!("telegram channel started");
        let mut offset: i64 = 0;

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = self.get_updates(offset) => batch,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "telegram poll failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        tracing::info!("telegram channel stopped");
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let response = self
            .client
            .get(format!("{}/getUpdates", self.api_base))
            .query(&[("timeout", POLL_TIMEOUT_SECS as i64), ("offset", offset)])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!("getUpdates returned {}", response.status())));
        }

        let body: UpdatesResponse = response.json().await.map_err(|e| Error::Http(e.to_string()))?;
        if !body.ok {
            return Err(Error::Http("getUpdates returned ok=false".into()));
        }
        Ok(body.result)
    }

    fn handle_update(&self, update: Update) {
        let Some(message) = update.message else { return };
        let Some(text) = message.text.filter(|t| !t.is_empty()) else { return };
        let Some(from) = message.from else { return };

        if !self.allowed_user_ids.is_empty() && !self.allowed_user_ids.contains(&from.id) {
            tracing::debug!(user_id = from.id, "ignoring message from unlisted user");
            return;
        }

        let chat_id = message.chat.id;
        let inbound = InboundMessage {
            session_key: Self::session_key(from.id, chat_id),
            text,
            source: "telegram".into(),
        };

        let sender = self.sender.clone();
        let options = RunOptions::new().with_on_complete(move |reply| {
            if reply.is_empty() {
                return;
            }
            tokio::spawn(async move {
                if let Err(e) = sender.send(chat_id, &reply).await {
                    tracing::warn!(chat_id, error = %e, "telegram reply delivery failed");
                }
            });
        });

        if let Err(e) = self.gateway.handle_inbound(inbound, options) {
            tracing::warn!(chat_id, error = %e, "failed to enqueue telegram message");
            let sender = self.sender.clone();
            tokio::spawn(async move {
                let _ = sender.send(chat_id, BUSY_REPLY).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_shape() {
        assert_eq!(TelegramChannel::session_key(42, -100), "telegram:42:-100");
    }

    #[test]
    fn chat_id_roundtrips_through_key() {
        let key = TelegramChannel::session_key(42, -10012345);
        assert_eq!(chat_id_from_key(&key).unwrap(), -10012345);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(chat_id_from_key("telegram:42").is_err());
        assert!(chat_id_from_key("telegram:42:not-a-number").is_err());
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_chunks("hello", MAX_MESSAGE_LEN), vec!["hello"]);
    }

    #[test]
    fn empty_text_is_one_empty_chunk() {
        assert_eq!(split_chunks("", MAX_MESSAGE_LEN), vec![""]);
    }

    #[test]
    fn long_text_splits_in_order() {
        let text = "a".repeat(MAX_MESSAGE_LEN * 2 + 100);
        let chunks = split_chunks(&text, MAX_MESSAGE_LEN);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), MAX_MESSAGE_LEN);
        assert_eq!(chunks[1].len(), MAX_MESSAGE_LEN);
        assert_eq!(chunks[2].len(), 100);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn split_never_cuts_inside_a_char() {
        // Multi-byte chars straddling the boundary must not be torn.
        let text = "é".repeat(3000); // 6000 bytes
        let chunks = split_chunks(&text, MAX_MESSAGE_LEN);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks.concat(), text);
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_MESSAGE_LEN);
            assert!(std::str::from_utf8(chunk.as_bytes()).is_ok());
        }
    }

    #[test]
    fn parses_updates_payload() {
        let raw = r#"{
            "ok": true,
            "result": [{
                "update_id": 7,
                "message": {
                    "chat": { "id": -100 },
                    "from": { "id": 42 },
                    "text": "hello"
                }
            }]
        }"#;
        let parsed: UpdatesResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.ok);
        assert_eq!(parsed.result.len(), 1);
        assert_eq!(parsed.result[0].update_id, 7);
        let message = parsed.result[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, -100);
        assert_eq!(message.from.as_ref().unwrap().id, 42);
        assert_eq!(message.text.as_deref(), Some("hello"));
    }
}
