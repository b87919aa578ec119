//! The agent turn loop.
//!
//! One run = one inbound event processed to convergence: build a
//! token-budgeted prompt over the event log, call the model, execute any
//! requested tools, persist every step as a durable event, and repeat
//! until the model answers in plain text (or the round cap trips).

use std::sync::Arc;

use async_trait::async_trait;

use gc_context::ContextEngine;
use gc_domain::chat::ToolCallRequest;
use gc_domain::event::Event;
use gc_domain::{Error, Result};
use gc_provider::{LlmProvider, RetryPolicy};
use gc_store::{ArtifactStore, EventStore, SessionStore};
use gc_tools::ToolRegistry;

use crate::cancel::CancelToken;
use crate::queue::RunProcessor;
use crate::runs::Run;

/// Tool results longer than this are spilled to the artifact store and
/// referenced from the event by ID.
pub const SPILL_THRESHOLD: usize = 2000;

/// How much of the log each round reloads for prompt assembly.
const HISTORY_LIMIT: usize = 100;

pub struct AgentRuntime {
    sessions: Arc<SessionStore>,
    events: Arc<EventStore>,
    artifacts: Arc<ArtifactStore>,
    tools: Arc<ToolRegistry>,
    provider: Arc<dyn LlmProvider>,
    engine: Arc<ContextEngine>,
    retry: RetryPolicy,
    max_rounds: usize,
    cancel: CancelToken,
}

impl AgentRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionStore>,
        events: Arc<EventStore>,
        artifacts: Arc<ArtifactStore>,
        tools: Arc<ToolRegistry>,
        provider: Arc<dyn LlmProvider>,
        engine: Arc<ContextEngine>,
        retry: RetryPolicy,
        max_rounds: usize,
        cancel: CancelToken,
    ) -> Self {
        Self {
            sessions,
            events,
            artifacts,
            tools,
            provider,
            engine,
            retry,
            max_rounds,
            cancel,
        }
    }

    async fn process_run(&self, run: &mut Run) -> Result<()> {
        let session_id = run.session_id.clone();

        let mut inbound = Event::user_message(
            &session_id,
            Some(&run.id),
            &run.event.source,
            &run.event.text,
        );
        self.events.append(&mut inbound)?;

        for round in 0..self.max_rounds {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            tracing::debug!(run_id = %run.id, round, "turn loop round");

            let session = self.sessions.get(&session_id)?;
            let history = self.events.tail(&session_id, HISTORY_LIMIT)?;
            let tool_names = self.tools.names();
            let messages = self.engine.build_prompt(&session, &history, &tool_names);
            let specs = self.tools.specs();

            // The LLM boundary is the only auto-retried edge; tool
            // failures flow back to the model as text instead.
            let completion = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                completion = self.retry.execute(|| self.provider.complete(&messages, &specs)) => completion?,
            };

            if !completion.tool_calls.is_empty() {
                for call in &completion.tool_calls {
                    self.handle_tool_call(run, call).await?;
                }
                continue;
            }

            if !completion.content.is_empty() {
                let mut reply = Event::assistant_message(&session_id, Some(&run.id), &completion.content);
                self.events.append(&mut reply)?;
                self.touch_session(&session_id, &run.id)?;
                if let Some(on_complete) = run.on_complete.take() {
                    on_complete(completion.content);
                }
                return Ok(());
            }

            // Empty content and no tool calls: a valid "nothing to say"
            // outcome — cron-triggered runs use it to suppress delivery.
            self.touch_session(&session_id, &run.id)?;
            if let Some(on_complete) = run.on_complete.take() {
                on_complete(String::new());
            }
            return Ok(());
        }

        let message = format!("max tool rounds ({}) exceeded", self.max_rounds);
        let mut fatal = Event::error(&session_id, Some(&run.id), &message);
        self.events.append(&mut fatal)?;
        self.touch_session(&session_id, &run.id)?;
        // on_complete is deliberately left in place: the queue's failure
        // path owes the caller its apology.
        Err(Error::Other(message))
    }

    /// Persist the tool_call event, execute the tool, spill oversized
    /// results, and persist the tool_result event.
    async fn handle_tool_call(&self, run: &Run, call: &ToolCallRequest) -> Result<()> {
        let session_id = &run.session_id;

        let mut call_event = Event::tool_call(
            session_id,
            Some(&run.id),
            &call.name,
            &call.id,
            call.arguments.clone(),
        );
        self.events.append(&mut call_event)?;

        let result = self.execute_tool(call).await?;

        let (stored, artifact_id) = if result.len() > SPILL_THRESHOLD {
            let artifact_id = self.artifacts.put(session_id, &run.id, &call.name, &result)?;
            let prefix = spill_prefix(&result, SPILL_THRESHOLD);
            tracing::debug!(
                run_id = %run.id,
                tool = %call.name,
                artifact_id = %artifact_id,
                size = result.len(),
                "tool result spilled to artifact store"
            );
            (
                format!("{prefix}\n[truncated, see artifact {artifact_id}]"),
                Some(artifact_id),
            )
        } else {
            (result, None)
        };

        let mut result_event = Event::tool_result(
            session_id,
            Some(&run.id),
            &call.name,
            &call.id,
            &stored,
            artifact_id.as_deref(),
        );
        self.events.append(&mut result_event)?;
        Ok(())
    }

    /// Run one tool call. Per-tool failures are rendered as text for the
    /// model; only cancellation is fatal.
    async fn execute_tool(&self, call: &ToolCallRequest) -> Result<String> {
        let Some(tool) = self.tools.get(&call.name) else {
            return Ok(format!("error: unknown tool \"{}\"", call.name));
        };

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            outcome = tool.execute(call.arguments.clone()) => outcome,
        };

        Ok(match outcome {
            Ok(text) => text,
            Err(e) => format!("error: {e}"),
        })
    }

    /// Restamp the session index after a completed turn.
    fn touch_session(&self, session_id: &str, run_id: &str) -> Result<()> {
        let mut session = self.sessions.get(session_id)?;
        session.last_run_id = Some(run_id.to_owned());
        session.last_event_seq = self.events.count(session_id)?;
        self.sessions.update(&session)
    }
}

#[async_trait]
impl RunProcessor for AgentRuntime {
    async fn process(&self, run: &mut Run) -> Result<()> {
        self.process_run(run).await
    }
}

/// Longest prefix of `s` that fits `max` bytes without splitting a char.
fn spill_prefix(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spill_prefix_respects_char_boundaries() {
        assert_eq!(spill_prefix("hello", 10), "hello");
        assert_eq!(spill_prefix("hello", 3), "hel");
        // 'é' is two bytes; cutting at 1 must back off to 0.
        assert_eq!(spill_prefix("é", 1), "");
    }
}
