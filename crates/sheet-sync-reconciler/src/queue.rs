//! In-memory FIFO queue of sync tasks.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::types::{SyncTask, TaskResult};

/// Maximum tasks processed per drain cycle.
pub const DEFAULT_DRAIN_CAP: usize = 50;

/// Default pause between two tasks of one drain cycle.
pub const DEFAULT_TASK_PACING: Duration = Duration::from_millis(500);

/// What the drain processor did with a task.
#[derive(Debug)]
pub enum DrainStep {
    /// The task finished (successfully or not) and leaves the queue.
    Completed(TaskResult),
    /// Stop the cycle and put the task back at the front.
    Halt(SyncTask),
}

/// Summary of one drain cycle.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    pub results: Vec<TaskResult>,
    /// The cycle stopped at the cap with tasks still queued.
    pub truncated: bool,
    /// Tasks left in the queue when the cycle ended.
    pub remaining: usize,
    /// The processor halted the cycle.
    pub halted: bool,
}

impl DrainReport {
    pub fn processed(&self) -> usize {
        self.results.len()
    }
}

/// Ordered backlog shared by producers and the single consumer.
///
/// Tasks leave in enqueue order, so tasks of one event execute in the order
/// their intents arrived.
pub struct SyncTaskQueue {
    pending: Mutex<VecDeque<SyncTask>>,
    draining: AtomicBool,
    drain_cap: usize,
    pacing: Duration,
}

/// Clears the drain flag when the cycle ends, including on panic.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncTaskQueue {
    /// Create a queue. A `drain_cap` of zero is treated as one.
    pub fn new(drain_cap: usize, pacing: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            drain_cap: drain_cap.max(1),
            pacing,
        }
    }

    pub fn drain_cap(&self) -> usize {
        self.drain_cap
    }

    /// Append a task to the back of the queue.
    pub async fn enqueue(&self, task: SyncTask) {
        let mut pending = self.pending.lock().await;
        debug!(
            task_id = %task.task_id(),
            event_id = %task.event_id(),
            kind = ?task.kind(),
            update_type = %task.update_type(),
            position = pending.len(),
            "Enqueued sync task"
        );
        pending.push_back(task);
    }

    /// Number of queued tasks.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Whether a drain cycle is running.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Run one drain cycle.
    ///
    /// Pops tasks in order and hands each to `process`, pausing for the pacing
    /// delay between tasks. Stops when the queue is empty, when `drain_cap`
    /// tasks completed, or when `process` halts. Returns `None` without
    /// touching the queue if another cycle is already running.
    pub async fn drain<F, Fut>(&self, mut process: F) -> Option<DrainReport>
    where
        F: FnMut(SyncTask) -> Fut,
        Fut: Future<Output = DrainStep>,
    {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain already in progress");
            return None;
        }
        let _guard = DrainGuard(&self.draining);

        let mut report = DrainReport::default();

        while report.results.len() < self.drain_cap {
            let next = self.pending.lock().await.pop_front();
            let Some(task) = next else {
                break;
            };

            if !report.results.is_empty() && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            match process(task).await {
                DrainStep::Completed(result) => report.results.push(result),
                DrainStep::Halt(task) => {
                    debug!(task_id = %task.task_id(), "Drain halted, task requeued");
                    self.pending.lock().await.push_front(task);
                    report.halted = true;
                    break;
                }
            }
        }

        report.remaining = self.pending_count().await;
        report.truncated =
            !report.halted && report.results.len() >= self.drain_cap && report.remaining > 0;

        if report.truncated {
            warn!(
                drain_cap = self.drain_cap,
                remaining = report.remaining,
                "Drain cycle hit backlog cap, remaining tasks stay queued"
            );
        }

        Some(report)
    }
}
