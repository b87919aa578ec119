//! Daemon configuration (TOML file) plus the key-path utilities the CLI
//! `config` commands are built on: flatten/unflatten between a nested
//! document and dot-separated keys, and secret masking for display.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub llm: LlmConfig,
    pub queue: QueueConfig,
    pub webhook: WebhookConfig,
    pub telegram: TelegramConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Maximum tokens the model may generate per call.
    pub max_output_tokens: u32,
    /// Total context window budgeted by the context engine.
    pub max_tokens: usize,
    /// Tokens reserved for the model's output when budgeting the prompt.
    pub output_reserve: usize,
    /// Tool-use rounds per turn before the run is failed.
    pub max_rounds: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            max_output_tokens: 4096,
            max_tokens: 128_000,
            output_reserve: 8192,
            max_rounds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Global ceiling on concurrently executing runs.
    pub max_concurrent: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_concurrent: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub listen_addr: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { listen_addr: "127.0.0.1:8484".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// When non-empty, messages from any other user ID are ignored.
    pub allowed_user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub brave_api_key: String,
    pub brave_endpoint: String,
    /// Default `bash` tool timeout in seconds.
    pub bash_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            brave_api_key: String::new(),
            brave_endpoint: "https://api.search.brave.com/res/v1/web/search".into(),
            bash_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load from a TOML file. A missing file yields the defaults (with
    /// `data_dir` falling back to `./data`).
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
        } else {
            Config::default()
        };
        if config.data_dir.as_os_str().is_empty() {
            config.data_dir = PathBuf::from("data");
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.max_tokens <= self.llm.output_reserve {
            return Err(Error::Config(format!(
                "llm.max_tokens ({}) must exceed llm.output_reserve ({})",
                self.llm.max_tokens, self.llm.output_reserve
            )));
        }
        if self.llm.max_rounds == 0 {
            return Err(Error::Config("llm.max_rounds must be at least 1".into()));
        }
        if self.queue.max_concurrent == 0 {
            return Err(Error::Config("queue.max_concurrent must be at least 1".into()));
        }
        self.webhook
            .listen_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| Error::Config(format!("webhook.listen_addr: {e}")))?;
        Ok(())
    }

    pub fn pid_path(&self) -> PathBuf {
        self.data_dir.join("gopherclaw.pid")
    }

    pub fn memory_path(&self) -> PathBuf {
        self.data_dir.join("memory.md")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Key-path utilities (flatten / unflatten / secret masking)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Keys whose string values are masked by [`mask_secrets`].
const SECRET_KEYS: &[&str] = &["api_key", "bot_token", "brave_api_key", "token", "secret", "password"];

/// Flatten a nested JSON document into a dot-keyed map. Arrays and
/// scalars are leaves; only objects are descended into.
pub fn flatten(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into("", value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                flatten_into(&path, child, out);
            }
        }
        other => {
            out.insert(prefix.to_owned(), other.clone());
        }
    }
}

/// Inverse of [`flatten`]: rebuild the nested document from dot keys.
pub fn unflatten(map: &BTreeMap<String, Value>) -> Value {
    let mut root = Value::Object(Map::new());
    for (path, value) in map {
        let mut node = &mut root;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            let current = node;
            let obj = match current {
                Value::Object(obj) => obj,
                _ => break,
            };
            if parts.peek().is_none() {
                obj.insert(part.to_owned(), value.clone());
                break;
            } else {
                node = obj.entry(part.to_owned()).or_insert_with(|| Value::Object(Map::new()));
            }
        }
    }
    root
}

/// Replace values of known secret keys with `"***" + last4(value)`
/// (`"***" + value` when the value has four or fewer characters).
/// Everything else passes through untouched.
pub fn mask_secrets(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let masked = map
                .iter()
                .map(|(key, child)| {
                    let is_secret = SECRET_KEYS.contains(&key.as_str());
                    let child = match child {
                        Value::String(s) if is_secret && !s.is_empty() => Value::String(mask_value(s)),
                        other => mask_secrets(other),
                    };
                    (key.clone(), child)
                })
                .collect();
            Value::Object(masked)
        }
        Value::Array(items) => Value::Array(items.iter().map(mask_secrets).collect()),
        other => other.clone(),
    }
}

fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        format!("***{value}")
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("***{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.queue.max_concurrent, 2);
        assert_eq!(config.webhook.listen_addr, "127.0.0.1:8484");
        assert_eq!(config.llm.max_rounds, 10);
        assert_eq!(config.tools.bash_timeout_secs, 120);
    }

    #[test]
    fn validate_rejects_inverted_budget() {
        let mut config = Config::default();
        config.llm.max_tokens = 100;
        config.llm.output_reserve = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_listen_addr() {
        let mut config = Config::default();
        config.webhook.listen_addr = "not an address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/gopherclaw.toml")).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    // ── flatten / unflatten ────────────────────────────────────────

    #[test]
    fn flatten_produces_dot_keys() {
        let doc = json!({ "llm": { "model": "gpt-4o", "temperature": 0.7 }, "data_dir": "data" });
        let flat = flatten(&doc);
        assert_eq!(flat.get("llm.model"), Some(&json!("gpt-4o")));
        assert_eq!(flat.get("data_dir"), Some(&json!("data")));
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn flatten_unflatten_roundtrip() {
        let doc = json!({
            "a": { "b": { "c": 1, "d": [1, 2, 3] }, "e": "x" },
            "f": true,
            "g": null,
        });
        assert_eq!(unflatten(&flatten(&doc)), doc);
    }

    #[test]
    fn roundtrip_of_full_config() {
        let doc = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(unflatten(&flatten(&doc)), doc);
    }

    #[test]
    fn arrays_are_leaves() {
        let doc = json!({ "telegram": { "allowed_user_ids": [1, 2] } });
        let flat = flatten(&doc);
        assert_eq!(flat.get("telegram.allowed_user_ids"), Some(&json!([1, 2])));
    }

    // ── mask_secrets ───────────────────────────────────────────────

    #[test]
    fn masks_known_keys_keeping_last4() {
        let doc = json!({ "llm": { "api_key": "sk-abcdef123456", "model": "gpt-4o" } });
        let masked = mask_secrets(&doc);
        assert_eq!(masked["llm"]["api_key"], json!("***3456"));
        assert_eq!(masked["llm"]["model"], json!("gpt-4o"));
    }

    #[test]
    fn short_secret_masked_whole() {
        let doc = json!({ "token": "abcd" });
        assert_eq!(mask_secrets(&doc)["token"], json!("***abcd"));
    }

    #[test]
    fn empty_secret_left_alone() {
        let doc = json!({ "api_key": "" });
        assert_eq!(mask_secrets(&doc)["api_key"], json!(""));
    }

    #[test]
    fn non_secret_values_untouched() {
        let doc = json!({ "webhook": { "listen_addr": "127.0.0.1:8484" }, "n": 42 });
        assert_eq!(mask_secrets(&doc), doc);
    }

    #[test]
    fn masks_nested_secrets() {
        let doc = json!({ "telegram": { "bot_token": "123456:AA-long-token" } });
        let masked = mask_secrets(&doc);
        assert_eq!(masked["telegram"]["bot_token"], json!("***oken"));
    }
}
