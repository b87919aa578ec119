//! `brave_search` tool — web search via the Brave Search API.

use async_trait::async_trait;
use serde_json::{json, Value};

use gc_domain::{Error, Result};

use crate::tool::{required_str, Tool};

const MAX_RESULTS: usize = 20;
const DEFAULT_RESULTS: u64 = 10;

pub struct BraveSearchTool {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl BraveSearchTool {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl Tool for BraveSearchTool {
    fn name(&self) -> &str {
        "brave_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns a numbered list of results with title, URL, \
         and description (up to 20)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of results (default 10, max 20)"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let query = required_str(&args, "query")?;
        let count = args
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_RESULTS)
            .min(MAX_RESULTS as u64);

        if self.api_key.is_empty() {
            return Err(Error::Other(
                "brave_search is not configured (set tools.brave_api_key)".into(),
            ));
        }

        tracing::debug!(query, count, "brave_search tool");

        let count_param = count.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("count", count_param.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!("search API returned {}", response.status())));
        }

        let body: Value = response.json().await.map_err(|e| Error::Http(e.to_string()))?;
        Ok(format_results(&body, count as usize))
    }
}

/// Render `web.results[]` as a numbered `title / url / description` list.
fn format_results(body: &Value, count: usize) -> String {
    let results = body
        .get("web")
        .and_then(|w| w.get("results"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    if results.is_empty() {
        return "(no results)".to_owned();
    }

    results
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, r)| {
            let title = r.get("title").and_then(Value::as_str).unwrap_or("(no title)");
            let url = r.get("url").and_then(Value::as_str).unwrap_or("");
            let description = r.get("description").and_then(Value::as_str).unwrap_or("");
            format!("{}. {title}\n   {url}\n   {description}", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
