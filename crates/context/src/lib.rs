//! Token-budgeted prompt assembly.
//!
//! The engine turns a slice of the session's event log into the chat
//! messages sent to the LLM: a rendered system prompt, then as many of
//! the most recent events as fit the budget, in chronological order.
//! Token counts use the model-appropriate BPE (`cl100k_base` fallback).

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tiktoken_rs::CoreBPE;

use gc_domain::chat::{ChatMessage, ToolCallRequest};
use gc_domain::event::{Event, EventType};
use gc_domain::session::SessionIndex;

/// Share of the post-system input budget given to event history; the
/// remainder is reserve and future artifact-excerpt budget.
const EVENT_BUDGET_SHARE: f64 = 0.70;

const SYSTEM_TEMPLATE: &str = "\
You are Gopherclaw, a self-hosted personal assistant.

Current time: {time}
Session: {session_id}

You can call these tools ({tools_csv}):
{tool_list}

Use tools when they help; answer directly when they don't. Keep replies
concise and concrete.

Long-term memory:
{memory}
";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ContextEngine {
    max_tokens: usize,
    output_reserve: usize,
    memory_path: PathBuf,
    bpe: CoreBPE,
}

/// Budget accounting for one prompt build, exposed for debug surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSummary {
    pub system_prompt_tokens: usize,
    pub event_budget: usize,
    pub event_tokens_used: usize,
    pub events_included: usize,
    pub events_total: usize,
    pub budget_remaining: usize,
    pub system_prompt_text: String,
}

impl ContextEngine {
    pub fn new(model: &str, max_tokens: usize, output_reserve: usize, memory_path: PathBuf) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .unwrap_or_else(|_| tiktoken_rs::cl100k_base().expect("cl100k_base is embedded"));
        Self {
            max_tokens,
            output_reserve,
            memory_path,
            bpe,
        }
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Assemble the prompt: system message first, then the newest events
    /// that fit the budget, restored to chronological order.
    pub fn build_prompt(
        &self,
        session: &SessionIndex,
        events: &[Event],
        tool_names: &[String],
    ) -> Vec<ChatMessage> {
        let (mut included, system_prompt, _) = self.select(session, events, tool_names);
        let mut messages = vec![ChatMessage::system(system_prompt)];
        messages.append(&mut included);
        messages
    }

    /// The same budget computation as [`build_prompt`], without building
    /// the final message list.
    pub fn summarize(
        &self,
        session: &SessionIndex,
        events: &[Event],
        tool_names: &[String],
    ) -> ContextSummary {
        let (included, system_prompt, used) = self.select(session, events, tool_names);
        let system_prompt_tokens = self.count_tokens(&system_prompt);
        let event_budget = self.event_budget(system_prompt_tokens);
        ContextSummary {
            system_prompt_tokens,
            event_budget,
            event_tokens_used: used,
            events_included: included.len(),
            events_total: events.len(),
            budget_remaining: event_budget.saturating_sub(used),
            system_prompt_text: system_prompt,
        }
    }

    /// Walk events newest-first, accumulating message token costs until
    /// the budget would be exceeded, then reverse the accepted slice.
    fn select(
        &self,
        session: &SessionIndex,
        events: &[Event],
        tool_names: &[String],
    ) -> (Vec<ChatMessage>, String, usize) {
        let system_prompt = self.render_system(session, tool_names);
        let budget = self.event_budget(self.count_tokens(&system_prompt));

        let mut included = Vec::new();
        let mut used = 0usize;
        for event in events.iter().rev() {
            let Some(message) = event_to_message(event) else {
                continue;
            };
            let cost = self.message_tokens(&message);
            if used + cost > budget {
                break;
            }
            used += cost;
            included.push(message);
        }
        included.reverse();
        (included, system_prompt, used)
    }

    fn event_budget(&self, system_tokens: usize) -> usize {
        let input_budget = self.max_tokens.saturating_sub(self.output_reserve);
        let after_system = input_budget.saturating_sub(system_tokens);
        (after_system as f64 * EVENT_BUDGET_SHARE) as usize
    }

    fn message_tokens(&self, message: &ChatMessage) -> usize {
        let mut total = self.count_tokens(&message.content);
        if let Some(calls) = &message.tool_calls {
            for call in calls {
                total += self.count_tokens(&call.name);
                total += self.count_tokens(&call.arguments.to_string());
            }
        }
        total
    }

    fn render_system(&self, session: &SessionIndex, tool_names: &[String]) -> String {
        let memory = std::fs::read_to_string(&self.memory_path).unwrap_or_default();
        let memory = if memory.trim().is_empty() { "(empty)".to_owned() } else { memory };

        let tool_list = if tool_names.is_empty() {
            "(none)".to_owned()
        } else {
            tool_names.iter().map(|n| format!("- {n}")).collect::<Vec<_>>().join("\n")
        };

        SYSTEM_TEMPLATE
            .replace("{time}", &Utc::now().to_rfc3339())
            .replace("{session_id}", &session.session_id)
            .replace("{tools_csv}", &tool_names.join(", "))
            .replace("{tool_list}", &tool_list)
            .replace("{memory}", &memory)
    }
}

/// Map one event to its chat message. Error events have no chat
/// representation and are skipped.
fn event_to_message(event: &Event) -> Option<ChatMessage> {
    match event.kind {
        EventType::UserMessage => Some(ChatMessage::user(event.payload_str("text").unwrap_or_default())),
        EventType::AssistantMessage => {
            Some(ChatMessage::assistant(event.payload_str("text").unwrap_or_default()))
        }
        EventType::ToolCall => {
            let call = ToolCallRequest {
                id: event.payload_str("call_id").unwrap_or_default().to_owned(),
                name: event.payload_str("tool").unwrap_or_default().to_owned(),
                arguments: event.payload.get("arguments").cloned().unwrap_or_default(),
            };
            Some(ChatMessage::assistant_tool_calls(vec![call]))
        }
        EventType::ToolResult => Some(ChatMessage::tool_result(
            event.payload_str("call_id").unwrap_or_default(),
            event.payload_str("result").unwrap_or_default(),
        )),
        EventType::Error => None,
    }
}
