//! Ingress façade: resolve the session, wrap the message in a Run, and
//! hand it to the queue.

use std::sync::Arc;

use gc_domain::event::InboundMessage;
use gc_domain::Result;
use gc_store::SessionStore;

use crate::queue::Queue;
use crate::runs::{OnComplete, Run};

/// Per-run options applied by [`Gateway::handle_inbound`].
#[derive(Default)]
pub struct RunOptions {
    on_complete: Option<OnComplete>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a completion continuation, invoked with the final reply
    /// text (empty string = suppress delivery).
    pub fn with_on_complete(mut self, f: impl FnOnce(String) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

pub struct Gateway {
    sessions: Arc<SessionStore>,
    queue: Arc<Queue>,
}

impl Gateway {
    pub fn new(sessions: Arc<SessionStore>, queue: Arc<Queue>) -> Self {
        Self { sessions, queue }
    }

    /// Accept an inbound message: resolve (or create) its session, wrap
    /// it in a queued Run, and enqueue it on the session's lane. Returns
    /// the run ID; a full lane surfaces as the caller's error.
    pub fn handle_inbound(&self, message: InboundMessage, options: RunOptions) -> Result<String> {
        let session = self.sessions.resolve_or_create(&message.session_key, "default")?;

        tracing::debug!(
            session_key = %message.session_key,
            session_id = %session.session_id,
            source = %message.source,
            "inbound message"
        );

        let mut run = Run::new(session.session_id, message);
        run.on_complete = options.on_complete;
        let run_id = run.id.clone();
        self.queue.enqueue(run)?;
        Ok(run_id)
    }

    /// Stop the queue: cancel in-flight work and join lane workers.
    pub async fn stop(&self) {
        self.queue.stop().await;
    }
}
