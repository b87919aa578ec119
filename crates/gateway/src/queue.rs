//! The run queue — per-session FIFO lanes under a global concurrency
//! ceiling.
//!
//! Each session gets its own bounded channel ("lane") with a dedicated
//! worker task. The worker acquires the global semaphore *inside* the
//! lane, so runs from one session execute strictly in enqueue order with
//! no overlap, while across sessions at most `max_concurrent` processors
//! run at once. A full lane rejects enqueues immediately rather than
//! blocking the ingress.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use gc_domain::{Error, Result};

use crate::cancel::CancelToken;
use crate::runs::{Run, RunStatus};

/// Fixed lane capacity; enqueue to a full lane fails immediately.
pub const LANE_CAPACITY: usize = 100;

const IDLE_POLL: Duration = Duration::from_millis(10);

/// What the ingress hears when a run dies inside the queue.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Executes one run. Implemented by the agent runtime; tests substitute
/// their own recorders.
#[async_trait]
pub trait RunProcessor: Send + Sync + 'static {
    async fn process(&self, run: &mut Run) -> Result<()>;
}

pub struct Queue {
    lanes: Mutex<HashMap<String, mpsc::Sender<Run>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    cancel: CancelToken,
    processor: Arc<dyn RunProcessor>,
}

impl Queue {
    pub fn new(max_concurrent: usize, processor: Arc<dyn RunProcessor>, cancel: CancelToken) -> Self {
        Self {
            lanes: Mutex::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            active: Arc::new(AtomicUsize::new(0)),
            cancel,
            processor,
        }
    }

    /// Enqueue a run on its session's lane. Fails immediately with
    /// [`Error::QueueFull`] when the lane is at capacity.
    pub fn enqueue(&self, run: Run) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Other("queue is stopped".into()));
        }

        let session_id = run.session_id.clone();
        let lane = self.lane(&session_id);
        lane.try_send(run).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull(session_id),
            TrySendError::Closed(_) => Error::Other("queue is stopped".into()),
        })
    }

    /// Get the lane sender for a session, spawning its worker on first
    /// touch. Lanes live until `stop()`.
    fn lane(&self, session_id: &str) -> mpsc::Sender<Run> {
        let mut lanes = self.lanes.lock();
        if let Some(tx) = lanes.get(session_id) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel(LANE_CAPACITY);
        let worker = tokio::spawn(lane_worker(
            session_id.to_owned(),
            rx,
            self.semaphore.clone(),
            self.active.clone(),
            self.cancel.clone(),
            self.processor.clone(),
        ));
        self.workers.lock().push(worker);
        lanes.insert(session_id.to_owned(), tx.clone());
        tx
    }

    /// Cancel the root token, close every lane, and join all workers.
    /// Pending enqueued runs are discarded.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.lanes.lock().clear();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
    }

    /// True iff the number of executing processors reaches zero within
    /// `timeout`.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.active.load(Ordering::SeqCst) == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Number of processors currently executing (for tests and stats).
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

async fn lane_worker(
    session_id: String,
    mut rx: mpsc::Receiver<Run>,
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    cancel: CancelToken,
    processor: Arc<dyn RunProcessor>,
) {
    loop {
        let run = tokio::select! {
            _ = cancel.cancelled() => break,
            run = rx.recv() => match run {
                Some(run) => run,
                None => break,
            },
        };
        let mut run = run;

        // The permit is taken inside the lane: a run never overtakes its
        // predecessor just because a slot opened up.
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        active.fetch_add(1, Ordering::SeqCst);
        run.status = RunStatus::Running;
        run.started_at = Some(chrono::Utc::now());
        run.attempts += 1;

        match processor.process(&mut run).await {
            Ok(()) => run.finish(RunStatus::Complete),
            Err(Error::Cancelled) => {
                tracing::debug!(run_id = %run.id, session_id = %session_id, "run cancelled");
                run.finish(RunStatus::Failed);
            }
            Err(e) => {
                tracing::error!(
                    run_id = %run.id,
                    session_id = %session_id,
                    error = %e,
                    "run processing failed"
                );
                run.error = Some(e.to_string());
                run.finish(RunStatus::Failed);
                // The caller always hears back.
                if let Some(on_complete) = run.on_complete.take() {
                    on_complete(APOLOGY.to_owned());
                }
            }
        }

        drop(permit);
        active.fetch_sub(1, Ordering::SeqCst);
    }
}
