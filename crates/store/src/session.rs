//! Session store — the durable `session_key → session_id` mapping.
//!
//! Persisted as a JSON array of [`SessionIndex`] at
//! `<data_dir>/sessions/sessions.json`. Every mutation rewrites the whole
//! document atomically, so all operations serialise through one lock.

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;

use gc_domain::session::SessionIndex;
use gc_domain::{Error, Result};

use crate::write_atomic;

pub struct SessionStore {
    sessions_dir: PathBuf,
    index_path: PathBuf,
    inner: RwLock<Vec<SessionIndex>>,
}

impl SessionStore {
    /// Load or create the store under `<data_dir>/sessions/`.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let sessions_dir = data_dir.join("sessions");
        std::fs::create_dir_all(&sessions_dir)?;

        let index_path = sessions_dir.join("sessions.json");
        let sessions: Vec<SessionIndex> = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path)?;
            serde_json::from_str(&raw)?
        } else {
            Vec::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %index_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_dir,
            index_path,
            inner: RwLock::new(sessions),
        })
    }

    /// Resolve a session key to its index entry, creating one on first
    /// sight. Idempotent: a repeat call returns the existing entry and
    /// does not touch `created_at`.
    ///
    /// Creating a session also allocates its storage root
    /// (`sessions/<sid>/`) so event and artifact writes succeed.
    pub fn resolve_or_create(&self, session_key: &str, agent: &str) -> Result<SessionIndex> {
        // Fast path: already known.
        {
            let sessions = self.inner.read();
            if let Some(entry) = sessions.iter().find(|s| s.session_key == session_key) {
                return Ok(entry.clone());
            }
        }

        let mut sessions = self.inner.write();
        // Re-check under the write lock: a concurrent caller may have won.
        if let Some(entry) = sessions.iter().find(|s| s.session_key == session_key) {
            return Ok(entry.clone());
        }

        let entry = SessionIndex::new(session_key, agent);
        std::fs::create_dir_all(self.sessions_dir.join(&entry.session_id))?;
        sessions.push(entry.clone());
        self.persist(&sessions)?;

        tracing::info!(
            session_key = session_key,
            session_id = %entry.session_id,
            "session created"
        );
        Ok(entry)
    }

    pub fn get(&self, session_id: &str) -> Result<SessionIndex> {
        self.inner
            .read()
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
    }

    /// All index entries, in no particular order.
    pub fn list(&self) -> Vec<SessionIndex> {
        self.inner.read().clone()
    }

    /// Write back an existing entry, restamping `updated_at`.
    pub fn update(&self, session: &SessionIndex) -> Result<()> {
        let mut sessions = self.inner.write();
        let slot = sessions
            .iter_mut()
            .find(|s| s.session_key == session.session_key)
            .ok_or_else(|| Error::NotFound(format!("session key {}", session.session_key)))?;
        *slot = session.clone();
        slot.updated_at = Utc::now();
        self.persist(&sessions)
    }

    /// Storage root for a session's event log and artifacts.
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(session_id)
    }

    fn persist(&self, sessions: &[SessionIndex]) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions)?;
        write_atomic(&self.index_path, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let first = store.resolve_or_create("telegram:1:2", "default").unwrap();
        let second = store.resolve_or_create("telegram:1:2", "default").unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn resolve_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let first = {
            let store = SessionStore::new(dir.path()).unwrap();
            store.resolve_or_create("http:test", "default").unwrap()
        };

        let store = SessionStore::new(dir.path()).unwrap();
        let second = store.resolve_or_create("http:test", "default").unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn distinct_keys_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let a = store.resolve_or_create("k1", "default").unwrap();
        let b = store.resolve_or_create("k2", "default").unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn create_allocates_session_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let entry = store.resolve_or_create("k", "default").unwrap();
        assert!(store.session_dir(&entry.session_id).is_dir());
    }

    #[test]
    fn get_unknown_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(store.get("nope").is_err());
    }

    #[test]
    fn update_restamps_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let mut entry = store.resolve_or_create("k", "default").unwrap();
        entry.last_event_seq = 7;
        store.update(&entry).unwrap();

        let fetched = store.get(&entry.session_id).unwrap();
        assert_eq!(fetched.last_event_seq, 7);
        assert!(fetched.updated_at >= entry.updated_at);
    }

    #[test]
    fn update_unknown_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let entry = gc_domain::session::SessionIndex::new("ghost", "default");
        assert!(store.update(&entry).is_err());
    }

    #[test]
    fn list_returns_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store.resolve_or_create("a", "default").unwrap();
        store.resolve_or_create("b", "default").unwrap();
        assert_eq!(store.list().len(), 2);
    }
}
