//! Delivery registry — routes outbound replies to channel adapters by
//! session-key prefix.
//!
//! Cron-fired runs have no originating socket to answer on, so their
//! replies are pushed through whichever handler claims the session key's
//! prefix (e.g. `telegram:`). Prefixes should be disjoint; the first
//! match wins.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use gc_domain::{Error, Result};

/// A channel-side sink for outbound messages.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn deliver(&self, session_key: &str, message: &str) -> Result<()>;
}

#[derive(Default)]
pub struct DeliveryRegistry {
    handlers: RwLock<Vec<(String, Arc<dyn DeliveryHandler>)>>,
}

impl DeliveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, prefix: &str, handler: Arc<dyn DeliveryHandler>) {
        self.handlers.write().push((prefix.to_owned(), handler));
    }

    /// Deliver `message` via the first handler whose prefix matches the
    /// session key.
    pub async fn deliver(&self, session_key: &str, message: &str) -> Result<()> {
        let handler = {
            let handlers = self.handlers.read();
            handlers
                .iter()
                .find(|(prefix, _)| session_key.starts_with(prefix.as_str()))
                .map(|(_, handler)| handler.clone())
        };

        match handler {
            Some(handler) => handler.deliver(session_key, message).await,
            None => Err(Error::NotFound(format!(
                "no delivery handler for session key \"{session_key}\""
            ))),
        }
    }
}
