//! Cooperative cancellation.
//!
//! One root token is created at startup and threaded through the queue,
//! the runtime, the scheduler, the channels, and the HTTP server, so a
//! single `cancel()` unwinds everything in flight.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable cancellation token. `cancel()` is sticky: once signalled,
/// every clone observes it, and `cancelled()` futures resolve.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves when (or immediately after) the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
