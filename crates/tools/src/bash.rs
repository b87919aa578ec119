//! `bash` tool — run a shell command and return its combined output.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use gc_domain::{Error, Result};

use crate::tool::{required_str, Tool};

pub struct BashTool {
    default_timeout: Duration,
}

impl BashTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its combined stdout and stderr. \
         Commands time out after 120 seconds unless timeout_seconds is given."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to run"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Override the default 120s timeout"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let command = required_str(&args, "command")?;
        let timeout = args
            .get("timeout_seconds")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        tracing::debug!(command, timeout_secs = timeout.as_secs(), "bash tool");

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(format!("command timed out after {}s", timeout.as_secs())))??;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            // A failing command's output *is* the error value the model sees.
            Err(Error::Other(combined))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let tool = BashTool::default();
        let out = tool.execute(json!({ "command": "echo hello" })).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn combines_stdout_and_stderr() {
        let tool = BashTool::default();
        let out = tool
            .execute(json!({ "command": "echo out; echo err >&2" }))
            .await
            .unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_error_with_output() {
        let tool = BashTool::default();
        let err = tool
            .execute(json!({ "command": "echo broken >&2; exit 3" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn missing_command_is_error() {
        let tool = BashTool::default();
        assert!(tool.execute(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn timeout_override_applies() {
        let tool = BashTool::default();
        let err = tool
            .execute(json!({ "command": "sleep 5", "timeout_seconds": 1 }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
