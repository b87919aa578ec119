//! The tool capability contract.

use async_trait::async_trait;
use serde_json::Value;

use gc_domain::Result;

/// A capability the model may invoke during a turn.
///
/// `execute` returns the result text on success. Failures are ordinary
/// errors; the runtime renders them back to the model as
/// `error: <message>` rather than aborting the turn.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<String>;
}

/// Extract a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| gc_domain::Error::Other(format!("missing argument \"{key}\"")))
}
