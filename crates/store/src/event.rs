//! Per-session append-only event log.
//!
//! One `events.jsonl` per session, one JSON document per line. The store
//! assigns `seq` under a per-session lock, so appends to the same session
//! serialise while different sessions proceed in parallel. A crash
//! mid-write can leave at most one partial trailing line; readers stop at
//! the last parseable line.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use gc_domain::event::Event;
use gc_domain::Result;

/// Cached per-session state: the sequence number of the last appended
/// event, lazily initialised from the log on first touch.
struct Lane {
    last_seq: Option<u64>,
}

pub struct EventStore {
    sessions_dir: PathBuf,
    lanes: Mutex<HashMap<String, Arc<Mutex<Lane>>>>,
}

impl EventStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            sessions_dir: data_dir.join("sessions"),
            lanes: Mutex::new(HashMap::new()),
        }
    }

    fn log_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(session_id).join("events.jsonl")
    }

    fn lane(&self, session_id: &str) -> Arc<Mutex<Lane>> {
        self.lanes
            .lock()
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(Lane { last_seq: None })))
            .clone()
    }

    /// Append an event, assigning the next sequence number for its
    /// session. The event is serialised to a single line and appended
    /// with `O_APPEND` semantics.
    pub fn append(&self, event: &mut Event) -> Result<()> {
        let lane = self.lane(&event.session_id);
        let mut lane = lane.lock();

        let path = self.log_path(&event.session_id);
        let last = match lane.last_seq {
            Some(n) => n,
            None => read_events(&path)?.len() as u64,
        };
        event.seq = last + 1;

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(line.as_bytes())?;

        lane.last_seq = Some(event.seq);
        Ok(())
    }

    /// The last `limit` events in ascending `seq` order. An absent log is
    /// empty, not an error.
    pub fn tail(&self, session_id: &str, limit: usize) -> Result<Vec<Event>> {
        let mut events = read_events(&self.log_path(session_id))?;
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        Ok(events)
    }

    pub fn count(&self, session_id: &str) -> Result<u64> {
        let lane = self.lane(session_id);
        let mut lane = lane.lock();
        match lane.last_seq {
            Some(n) => Ok(n),
            None => {
                let n = read_events(&self.log_path(session_id))?.len() as u64;
                lane.last_seq = Some(n);
                Ok(n)
            }
        }
    }
}

/// Parse a session log, stopping at the last parseable line (tolerates a
/// partial trailing line after a crash).
fn read_events(path: &Path) -> Result<Vec<Event>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut events = Vec::new();
    for line in raw.lines() {
        match serde_json::from_str::<Event>(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "stopping at unparseable event line");
                break;
            }
        }
    }
    Ok(events)
}
