//! Cron scheduler — fires stored tasks as synthetic inbound prompts.
//!
//! `start()` loads the task store and registers every enabled task with a
//! non-empty, parseable schedule; a parse failure logs and skips that
//! task without affecting the rest. On each firing the scheduler calls
//! the handler with `(session_key, prompt)` and does not interpret the
//! result.

pub mod cron;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use gc_store::TaskStore;

use crate::cancel::CancelToken;
use cron::CronExpr;

pub type ScheduleHandler = Arc<dyn Fn(String, String) + Send + Sync>;

struct CronEntry {
    name: String,
    session_key: String,
    prompt: String,
    expr: CronExpr,
    next: Option<DateTime<Utc>>,
}

pub struct Scheduler {
    tasks: Arc<TaskStore>,
    handler: ScheduleHandler,
    cancel: Mutex<Option<CancelToken>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(tasks: Arc<TaskStore>, handler: ScheduleHandler) -> Self {
        Self {
            tasks,
            handler,
            cancel: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Build the entry set from the task store and start the cron loop.
    pub fn start(&self) {
        let entries = self.load_entries();
        tracing::info!(scheduled = entries.len(), "scheduler started");

        let cancel = CancelToken::new();
        let handler = self.handler.clone();
        let worker = tokio::spawn(cron_loop(entries, handler, cancel.clone()));

        *self.cancel.lock() = Some(cancel);
        *self.worker.lock() = Some(worker);
    }

    /// Stop and rebuild from the current task store (after edits).
    pub async fn reload(&self) {
        self.stop().await;
        self.start();
    }

    /// Halt the cron loop.
    pub async fn stop(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }

    fn load_entries(&self) -> Vec<CronEntry> {
        let now = Utc::now();
        self.tasks
            .list()
            .into_iter()
            .filter(|t| t.enabled && !t.schedule.is_empty())
            .filter_map(|t| match CronExpr::parse(&t.schedule) {
                Ok(expr) => {
                    let next = expr.next_after(&now);
                    Some(CronEntry {
                        name: t.name,
                        session_key: t.session_key,
                        prompt: t.prompt,
                        expr,
                        next,
                    })
                }
                Err(e) => {
                    tracing::warn!(task = %t.name, error = %e, "skipping task with bad schedule");
                    None
                }
            })
            .collect()
    }
}

async fn cron_loop(mut entries: Vec<CronEntry>, handler: ScheduleHandler, cancel: CancelToken) {
    loop {
        let now = Utc::now();
        let earliest = entries.iter().filter_map(|e| e.next).min();

        let sleep = match earliest {
            Some(at) => (at - now).to_std().unwrap_or(std::time::Duration::ZERO),
            // Nothing scheduled: idle until a reload restarts the loop.
            None => std::time::Duration::from_secs(60),
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(sleep) => {}
        }

        let now = Utc::now();
        for entry in entries.iter_mut() {
            let Some(due) = entry.next else { continue };
            if due > now {
                continue;
            }
            tracing::info!(task = %entry.name, session_key = %entry.session_key, "cron fire");
            (handler)(entry.session_key.clone(), entry.prompt.clone());
            entry.next = entry.expr.next_after(&now);
        }
    }
}
