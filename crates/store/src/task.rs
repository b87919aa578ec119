//! Task store — the JSON-file-backed list of named prompts.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use gc_domain::task::Task;
use gc_domain::{Error, Result};

use crate::write_atomic;

pub struct TaskStore {
    path: PathBuf,
    inner: RwLock<Vec<Task>>,
}

impl TaskStore {
    /// Load or create `<data_dir>/tasks.json`. An absent file is an empty
    /// list.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("tasks.json");
        let tasks: Vec<Task> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            inner: RwLock::new(tasks),
        })
    }

    pub fn list(&self) -> Vec<Task> {
        self.inner.read().clone()
    }

    pub fn get(&self, name: &str) -> Result<Task> {
        self.inner
            .read()
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("task {name}")))
    }

    pub fn add(&self, task: Task) -> Result<()> {
        let mut tasks = self.inner.write();
        if tasks.iter().any(|t| t.name == task.name) {
            return Err(Error::Other(format!("task \"{}\" already exists", task.name)));
        }
        tasks.push(task);
        self.persist(&tasks)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut tasks = self.inner.write();
        let before = tasks.len();
        tasks.retain(|t| t.name != name);
        if tasks.len() == before {
            return Err(Error::NotFound(format!("task {name}")));
        }
        self.persist(&tasks)
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut tasks = self.inner.write();
        let task = tasks
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::NotFound(format!("task {name}")))?;
        task.enabled = enabled;
        self.persist(&tasks)
    }

    fn persist(&self, tasks: &[Task]) -> Result<()> {
        let json = serde_json::to_string_pretty(tasks)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path()).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn add_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path()).unwrap();

        store.add(Task::new("daily", "summarize the news")).unwrap();
        assert_eq!(store.get("daily").unwrap().prompt, "summarize the news");

        store.remove("daily").unwrap();
        assert!(store.get("daily").is_err());
    }

    #[test]
    fn duplicate_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path()).unwrap();

        store.add(Task::new("t", "p1")).unwrap();
        assert!(store.add(Task::new("t", "p2")).is_err());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn set_enabled_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path()).unwrap();

        store.add(Task::new("t", "p")).unwrap();
        store.set_enabled("t", false).unwrap();
        assert!(!store.get("t").unwrap().enabled);

        store.set_enabled("t", true).unwrap();
        assert!(store.get("t").unwrap().enabled);
    }

    #[test]
    fn remove_unknown_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path()).unwrap();
        assert!(store.remove("ghost").is_err());
    }

    #[test]
    fn tasks_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TaskStore::new(dir.path()).unwrap();
            let mut task = Task::new("daily", "p");
            task.schedule = "0 9 * * *".into();
            store.add(task).unwrap();
        }

        let store = TaskStore::new(dir.path()).unwrap();
        let task = store.get("daily").unwrap();
        assert_eq!(task.schedule, "0 9 * * *");
    }
}
