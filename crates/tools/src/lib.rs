//! Built-in tools and the registry that exposes them to the LLM runtime.

pub mod bash;
pub mod memory;
pub mod read_url;
pub mod registry;
pub mod tool;
pub mod web_search;

pub use registry::ToolRegistry;
pub use tool::Tool;
