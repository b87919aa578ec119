//! Chat channel adapters.

pub mod telegram;
