//! Shared domain types for Gopherclaw: identifiers, the durable entity
//! shapes (events, sessions, artifacts, tasks), the LLM message model,
//! the error enum, and configuration.

pub mod artifact;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod task;

pub use error::{Error, Result};

/// Mint a fresh opaque identifier (UUID v4 rendered to string).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
