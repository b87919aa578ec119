//! Named tasks — stored prompts that can be fired by the cron scheduler
//! or triggered ad hoc through `POST /webhook/<name>`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Primary key within the task store.
    pub name: String,
    pub prompt: String,
    /// Cron expression (5-field, or 6-field with a leading seconds field).
    /// Empty = not scheduled; the task stays webhook-triggerable.
    #[serde(default)]
    pub schedule: String,
    /// Session the task's runs are attached to (conventionally `task:<name>`).
    pub session_key: String,
    pub enabled: bool,
}

impl Task {
    pub fn new(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_owned(),
            prompt: prompt.to_owned(),
            schedule: String::new(),
            session_key: format!("task:{name}"),
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_key_is_task_prefixed() {
        let t = Task::new("morning", "say good morning");
        assert_eq!(t.session_key, "task:morning");
        assert!(t.enabled);
        assert!(t.schedule.is_empty());
    }

    #[test]
    fn schedule_defaults_to_empty_on_deserialize() {
        let t: Task = serde_json::from_str(
            r#"{"name":"n","prompt":"p","session_key":"task:n","enabled":false}"#,
        )
        .unwrap();
        assert!(t.schedule.is_empty());
        assert!(!t.enabled);
    }
}
