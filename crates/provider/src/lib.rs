//! LLM provider boundary: the trait the agent runtime calls, the
//! OpenAI-compatible HTTP adapter, and the retry policy applied at this
//! integration edge.

pub mod openai;
pub mod retry;

pub use openai::OpenAiProvider;
pub use retry::RetryPolicy;

use async_trait::async_trait;

use gc_domain::chat::{ChatMessage, ToolCallRequest, ToolSpec, Usage};
use gc_domain::Result;

/// One full (non-streaming) model response.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<Usage>,
}

/// Trait every LLM adapter implements. The turn loop only needs the
/// synchronous (request/response) form.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<Completion>;

    /// The model identifier requests are issued against.
    fn model(&self) -> &str;
}
