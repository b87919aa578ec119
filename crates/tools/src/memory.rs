//! Persistent memory tools — a single markdown bullet list the model can
//! append to, prune, and read back.
//!
//! All three tools share one writer lock so interleaved saves and deletes
//! from concurrent turns cannot tear the file.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use gc_domain::Result;

use crate::tool::{required_str, Tool};

/// The shared markdown file behind the `memory_*` tool family.
pub struct MemoryFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MemoryFile {
    pub fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(raw.lines().map(str::to_owned).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Append a bullet unless an identical (trimmed) one already exists.
    pub async fn save(&self, text: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let bullet = format!("- {}", text.trim());
        let mut lines = self.read_lines()?;
        if lines.iter().any(|l| l.trim() == bullet) {
            return Ok("Already remembered.".into());
        }
        lines.push(bullet);
        self.write_lines(&lines)?;
        Ok("Saved.".into())
    }

    /// Remove the matching bullet; a miss is a no-op.
    pub async fn delete(&self, text: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let bullet = format!("- {}", text.trim());
        let mut lines = self.read_lines()?;
        let before = lines.len();
        lines.retain(|l| l.trim() != bullet);
        if lines.len() == before {
            return Ok("No matching memory found.".into());
        }
        self.write_lines(&lines)?;
        Ok("Deleted.".into())
    }

    pub async fn list(&self) -> Result<String> {
        let _guard = self.lock.lock().await;
        let lines = self.read_lines()?;
        if lines.is_empty() {
            Ok("(no memories)".into())
        } else {
            Ok(lines.join("\n"))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool wrappers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MemorySaveTool(pub Arc<MemoryFile>);
pub struct MemoryDeleteTool(pub Arc<MemoryFile>);
pub struct MemoryListTool(pub Arc<MemoryFile>);

fn text_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": { "type": "string", "description": description }
        },
        "required": ["text"],
        "additionalProperties": false
    })
}

#[async_trait]
impl Tool for MemorySaveTool {
    fn name(&self) -> &str {
        "memory_save"
    }
    fn description(&self) -> &str {
        "Save a fact to long-term memory. Duplicates are ignored."
    }
    fn parameters(&self) -> Value {
        text_schema("The fact to remember, one line")
    }
    async fn execute(&self, args: Value) -> Result<String> {
        self.0.save(required_str(&args, "text")?).await
    }
}

#[async_trait]
impl Tool for MemoryDeleteTool {
    fn name(&self) -> &str {
        "memory_delete"
    }
    fn description(&self) -> &str {
        "Delete a fact from long-term memory (exact match)."
    }
    fn parameters(&self) -> Value {
        text_schema("The exact fact to forget")
    }
    async fn execute(&self, args: Value) -> Result<String> {
        self.0.delete(required_str(&args, "text")?).await
    }
}

#[async_trait]
impl Tool for MemoryListTool {
    fn name(&self) -> &str {
        "memory_list"
    }
    fn description(&self) -> &str {
        "List everything in long-term memory."
    }
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }
    async fn execute(&self, _args: Value) -> Result<String> {
        self.0.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> (tempfile::TempDir, Arc<MemoryFile>) {
        let dir = tempfile::tempdir().unwrap();
        let mem = MemoryFile::new(dir.path().join("memory.md"));
        (dir, mem)
    }

    #[tokio::test]
    async fn save_and_list() {
        let (_dir, mem) = memory();
        mem.save("likes tea").await.unwrap();
        mem.save("allergic to cats").await.unwrap();

        let listed = mem.list().await.unwrap();
        assert_eq!(listed, "- likes tea\n- allergic to cats");
    }

    #[tokio::test]
    async fn save_dedupes_trimmed() {
        let (_dir, mem) = memory();
        mem.save("likes tea").await.unwrap();
        let second = mem.save("  likes tea  ").await.unwrap();
        assert_eq!(second, "Already remembered.");
        assert_eq!(mem.list().await.unwrap(), "- likes tea");
    }

    #[tokio::test]
    async fn delete_removes_bullet() {
        let (_dir, mem) = memory();
        mem.save("a").await.unwrap();
        mem.save("b").await.unwrap();

        assert_eq!(mem.delete("a").await.unwrap(), "Deleted.");
        assert_eq!(mem.list().await.unwrap(), "- b");
    }

    #[tokio::test]
    async fn delete_miss_is_noop() {
        let (_dir, mem) = memory();
        mem.save("a").await.unwrap();
        assert_eq!(mem.delete("ghost").await.unwrap(), "No matching memory found.");
        assert_eq!(mem.list().await.unwrap(), "- a");
    }

    #[tokio::test]
    async fn empty_list_placeholder() {
        let (_dir, mem) = memory();
        assert_eq!(mem.list().await.unwrap(), "(no memories)");
    }

    #[tokio::test]
    async fn tools_share_one_file() {
        let (_dir, mem) = memory();
        let save = MemorySaveTool(mem.clone());
        let list = MemoryListTool(mem.clone());

        save.execute(json!({ "text": "fact" })).await.unwrap();
        let listed = list.execute(json!({})).await.unwrap();
        assert_eq!(listed, "- fact");
    }
}
