//! `read_url` tool — fetch a URL and return readable text.

use async_trait::async_trait;
use serde_json::{json, Value};

use gc_domain::{Error, Result};

use crate::tool::{required_str, Tool};

const MAX_CHARS: usize = 50_000;
const TRUNCATION_SENTINEL: &str = "[Content truncated]";

pub struct ReadUrlTool {
    client: reqwest::Client,
}

impl ReadUrlTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent("gopherclaw/0.1")
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for ReadUrlTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadUrlTool {
    fn name(&self) -> &str {
        "read_url"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its content as text. HTML pages are \
         converted to markdown-like text; output is capped at 50000 characters."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to fetch"
                }
            },
            "required": ["url"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let url = required_str(&args, "url")?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Other(format!("unsupported URL scheme: {url}")));
        }

        tracing::debug!(url, "read_url tool");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!("{url} returned {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned();
        let body = response.text().await.map_err(|e| Error::Http(e.to_string()))?;

        let text = if content_type.contains("text/html") || looks_like_html(&body) {
            html_to_text(&body)
        } else {
            body
        };
        Ok(truncate_with_sentinel(&text, MAX_CHARS))
    }
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().get(..256).unwrap_or(body.trim_start());
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.contains("<html")
}

/// Convert HTML to readable text.
fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 100)
}

fn truncate_with_sentinel(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n{TRUNCATION_SENTINEL}", &text[..end])
}
