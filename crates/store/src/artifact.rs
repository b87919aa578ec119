//! Artifact store — content-addressed spill files for oversized tool
//! results.
//!
//! Each artifact is a `{meta, data}` JSON document at
//! `sessions/<sid>/artifacts/<aid>.json`, written atomically to a fresh
//! unique path (so no locking is needed). Lookup by ID globs across
//! session directories.

use std::path::{Path, PathBuf};

use gc_domain::artifact::{Artifact, ArtifactMeta};
use gc_domain::{Error, Result};

use crate::write_atomic;

pub struct ArtifactStore {
    sessions_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            sessions_dir: data_dir.join("sessions"),
        }
    }

    /// Store a new artifact, returning its fresh ID.
    pub fn put(&self, session_id: &str, run_id: &str, tool: &str, data: &str) -> Result<String> {
        let artifact = Artifact::new(session_id, run_id, tool, data.to_owned());
        let dir = self.sessions_dir.join(session_id).join("artifacts");
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", artifact.meta.id));
        let json = serde_json::to_string(&artifact)?;
        write_atomic(&path, json.as_bytes())?;
        Ok(artifact.meta.id)
    }

    /// Raw artifact data by ID.
    pub fn get(&self, artifact_id: &str) -> Result<String> {
        Ok(self.load(artifact_id)?.data)
    }

    pub fn get_meta(&self, artifact_id: &str) -> Result<ArtifactMeta> {
        Ok(self.load(artifact_id)?.meta)
    }

    /// A text slice of roughly `max_tokens × 4` characters. When `query`
    /// occurs in the data (ASCII case-insensitive) the slice is centred on
    /// the first match; otherwise it is taken from the head.
    pub fn excerpt(&self, artifact_id: &str, query: &str, max_tokens: usize) -> Result<String> {
        let data = self.get(artifact_id)?;
        let window = max_tokens.saturating_mul(4);
        if data.len() <= window {
            return Ok(data);
        }

        let start = match find_case_insensitive(&data, query) {
            Some(hit) => hit.saturating_sub(window / 2),
            None => 0,
        };
        let start = floor_char_boundary(&data, start.min(data.len()));
        let end = floor_char_boundary(&data, (start + window).min(data.len()));
        Ok(data[start..end].to_owned())
    }

    fn load(&self, artifact_id: &str) -> Result<Artifact> {
        let pattern = self
            .sessions_dir
            .join("*")
            .join("artifacts")
            .join(format!("{artifact_id}.json"));
        let pattern = pattern.to_string_lossy();

        let paths = glob::glob(&pattern)
            .map_err(|e| Error::Other(format!("artifact glob: {e}")))?;
        for entry in paths.flatten() {
            let raw = std::fs::read_to_string(&entry)?;
            return Ok(serde_json::from_str(&raw)?);
        }
        Err(Error::NotFound(format!("artifact {artifact_id}")))
    }
}

/// Byte offset of the first ASCII case-insensitive occurrence of `needle`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
