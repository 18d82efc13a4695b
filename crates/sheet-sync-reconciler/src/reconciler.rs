//! Sync coordinator.
//!
//! [`Reconciler`] is the only entry point business operations use. Intents go
//! through an unbounded intake channel served by one worker, which snapshots
//! the event and enqueues a task. A second worker drains the queue, runs each
//! task through the [`RetryExecutor`] and writes the outcome back to the
//! event's sync state.
//!
//! # Lifecycle
//!
//! 1. Create with [`Reconciler::new()`]
//! 2. Call [`Reconciler::start()`] to spawn the intake and drain workers
//! 3. Call [`Reconciler::request_sync()`] from business operations
//! 4. Call [`Reconciler::shutdown()`] to stop the workers
//!
//! Intents sent before `start` are buffered and handled once it runs.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{ReconcilerError, ReconcilerResult, StoreError, StoreResult};
use crate::ports::{Clock, EventStore, SheetSyncClient};
use crate::queue::{DrainReport, DrainStep, SyncTaskQueue, DEFAULT_DRAIN_CAP, DEFAULT_TASK_PACING};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::sync_fsm::{outcome_input, toggle_input, transition, SyncMachineInput, SyncPhase};
use crate::sync_state::{SyncMetadataPatch, SyncState};
use crate::types::{EventId, SheetHandle, SyncTask, TaskKind, TaskResult, UpdateType};

/// Default period of the idle drain ticker.
pub const DEFAULT_IDLE_DRAIN_INTERVAL: Duration = Duration::from_secs(5);

/// Default lifetime of a backend health probe result.
pub const DEFAULT_HEALTH_CHECK_TTL: Duration = Duration::from_secs(30);

const MIN_IDLE_DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// Which registrations a create task carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateSnapshotPolicy {
    /// Create the sheet with headers only; later updates fill it.
    Empty,
    /// Create the sheet with the registrations present at enqueue.
    #[default]
    Current,
}

/// Reconciler tunables.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Attempts and delay schedule per task.
    pub retry: RetryPolicy,
    /// Pause between two tasks of one drain cycle.
    pub task_pacing: Duration,
    /// Maximum tasks per drain cycle.
    pub drain_cap: usize,
    /// How often the drain worker wakes on its own to look for backlog.
    pub idle_drain_interval: Duration,
    /// How long a health probe result is trusted. `None` disables probing.
    pub health_check_ttl: Option<Duration>,
    pub create_snapshot: CreateSnapshotPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            task_pacing: DEFAULT_TASK_PACING,
            drain_cap: DEFAULT_DRAIN_CAP,
            idle_drain_interval: DEFAULT_IDLE_DRAIN_INTERVAL,
            health_check_ttl: Some(DEFAULT_HEALTH_CHECK_TTL),
            create_snapshot: CreateSnapshotPolicy::default(),
        }
    }
}

/// Counts from the most recent non-empty drain cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub finished_at: DateTime<Utc>,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub truncated: bool,
    pub remaining: usize,
    pub halted: bool,
}

impl DrainSummary {
    fn from_report(report: &DrainReport, finished_at: DateTime<Utc>) -> Self {
        let succeeded = report.results.iter().filter(|r| r.success).count();
        let skipped = report.results.iter().filter(|r| r.skipped).count();
        Self {
            finished_at,
            processed: report.processed(),
            succeeded,
            failed: report.processed() - succeeded - skipped,
            skipped,
            truncated: report.truncated,
            remaining: report.remaining,
            halted: report.halted,
        }
    }
}

/// Point-in-time view of the reconciler's backlog.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub running: bool,
    /// Tasks waiting in the queue.
    pub pending: usize,
    /// Intents not yet turned into tasks.
    pub pending_intents: usize,
    /// Events with a create task queued or running.
    pub pending_creates: usize,
    pub draining: bool,
    pub last_drain: Option<DrainSummary>,
}

enum Intake {
    Sync {
        event_id: EventId,
        update_type: UpdateType,
    },
    SetAutoSync {
        event_id: EventId,
        enabled: bool,
        reply: oneshot::Sender<ReconcilerResult<()>>,
    },
}

#[derive(Debug, Clone, Copy)]
struct HealthSample {
    checked_at: Instant,
    healthy: bool,
}

struct Inner {
    config: ReconcilerConfig,
    store: Arc<dyn EventStore>,
    client: Arc<dyn SheetSyncClient>,
    clock: Arc<dyn Clock>,
    executor: RetryExecutor,
    queue: SyncTaskQueue,
    intake_tx: mpsc::UnboundedSender<Intake>,
    intake_rx: Mutex<Option<mpsc::UnboundedReceiver<Intake>>>,
    pending_intents: AtomicUsize,
    pending_creates: Mutex<HashSet<EventId>>,
    /// Created sheets whose id the store has not accepted yet.
    unpersisted_sheets: Mutex<HashMap<EventId, SheetHandle>>,
    drain_signal: Notify,
    idle: Notify,
    health: Mutex<Option<HealthSample>>,
    last_drain: Mutex<Option<DrainSummary>>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Keeps each event's spreadsheet in sync with its registrations.
///
/// Cheap to clone; clones share the same workers and queue.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.inner.config)
            .field("running", &self.inner.running.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        config: ReconcilerConfig,
        store: Arc<dyn EventStore>,
        client: Arc<dyn SheetSyncClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                executor: RetryExecutor::new(client.clone(), config.retry),
                queue: SyncTaskQueue::new(config.drain_cap, config.task_pacing),
                config,
                store,
                client,
                clock,
                intake_tx,
                intake_rx: Mutex::new(Some(intake_rx)),
                pending_intents: AtomicUsize::new(0),
                pending_creates: Mutex::new(HashSet::new()),
                unpersisted_sheets: Mutex::new(HashMap::new()),
                drain_signal: Notify::new(),
                idle: Notify::new(),
                health: Mutex::new(None),
                last_drain: Mutex::new(None),
                running: AtomicBool::new(false),
                shutdown_tx,
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.config
    }

    /// Spawn the intake and drain workers.
    ///
    /// Must be called from within a tokio runtime. Fails on a second call.
    pub fn start(&self) -> ReconcilerResult<()> {
        let receiver = self
            .inner
            .intake_rx
            .lock()
            .take()
            .ok_or(ReconcilerError::AlreadyStarted)?;
        self.inner.running.store(true, Ordering::SeqCst);

        let intake = {
            let this = self.clone();
            let shutdown = self.inner.shutdown_tx.subscribe();
            tokio::spawn(async move { this.run_intake(receiver, shutdown).await })
        };
        let drain = {
            let this = self.clone();
            let shutdown = self.inner.shutdown_tx.subscribe();
            tokio::spawn(async move { this.run_drain_worker(shutdown).await })
        };
        self.inner.workers.lock().extend([intake, drain]);

        info!(
            drain_cap = self.inner.queue.drain_cap(),
            max_attempts = self.inner.config.retry.max_attempts,
            pacing_ms = self.inner.config.task_pacing.as_millis() as u64,
            "Reconciler started"
        );
        Ok(())
    }

    /// Record that `event_id` changed and its spreadsheet should follow.
    ///
    /// Returns immediately and never fails. Outcomes show up only in the
    /// event's sync state and in the logs.
    pub fn request_sync(&self, event_id: impl Into<EventId>, update_type: UpdateType) {
        let event_id = event_id.into();
        self.inner.pending_intents.fetch_add(1, Ordering::SeqCst);

        let intent = Intake::Sync {
            event_id: event_id.clone(),
            update_type,
        };
        if self.inner.intake_tx.send(intent).is_err() {
            self.inner.pending_intents.fetch_sub(1, Ordering::SeqCst);
            warn!(
                event_id = %event_id,
                update_type = %update_type,
                "Reconciler intake closed, dropping sync intent"
            );
        }
    }

    /// Turn auto-sync on or off for an event.
    ///
    /// Ordered with `request_sync` intents. Disabling keeps the spreadsheet id;
    /// enabling an event without a sheet queues a create right away.
    pub async fn set_auto_sync(
        &self,
        event_id: impl Into<EventId>,
        enabled: bool,
    ) -> ReconcilerResult<()> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(ReconcilerError::NotRunning);
        }

        let (reply, response) = oneshot::channel();
        self.inner.pending_intents.fetch_add(1, Ordering::SeqCst);
        let intent = Intake::SetAutoSync {
            event_id: event_id.into(),
            enabled,
            reply,
        };
        if self.inner.intake_tx.send(intent).is_err() {
            self.inner.pending_intents.fetch_sub(1, Ordering::SeqCst);
            return Err(ReconcilerError::NotRunning);
        }

        response.await.map_err(|_| ReconcilerError::NotRunning)?
    }

    /// Stored sync state of an event, defaulted when absent.
    pub async fn sync_state(&self, event_id: &EventId) -> ReconcilerResult<SyncState> {
        Ok(self.load_state(event_id).await?)
    }

    /// Run one drain cycle now.
    ///
    /// Returns `None` if a cycle is already running.
    pub async fn drain_now(&self) -> Option<DrainReport> {
        let report = self.inner.queue.drain(|task| self.dispatch(task)).await;

        if let Some(report) = &report {
            if report.processed() > 0 || report.halted {
                let summary = DrainSummary::from_report(report, self.inner.clock.now());
                info!(
                    processed = summary.processed,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    truncated = summary.truncated,
                    halted = summary.halted,
                    remaining = summary.remaining,
                    "Drain cycle finished"
                );
                *self.inner.last_drain.lock() = Some(summary);
            }
        }

        self.inner.idle.notify_waiters();
        report
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let pending = self.inner.queue.pending_count().await;
        let pending_creates = self.inner.pending_creates.lock().len();
        let last_drain = self.inner.last_drain.lock().clone();

        QueueStatus {
            running: self.inner.running.load(Ordering::SeqCst),
            pending,
            pending_intents: self.inner.pending_intents.load(Ordering::SeqCst),
            pending_creates,
            draining: self.inner.queue.is_draining(),
            last_drain,
        }
    }

    /// Wait until every intent is handled and the queue is empty.
    ///
    /// Never returns while the backend stays unhealthy and tasks remain
    /// queued; callers that cannot wait forever should add a timeout.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle().await {
                return;
            }
            notified.await;
        }
    }

    /// Stop both workers. A running drain cycle finishes first.
    pub async fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);

        let workers = std::mem::take(&mut *self.inner.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Reconciler worker ended abnormally");
            }
        }

        self.inner.running.store(false, Ordering::SeqCst);
        info!("Reconciler stopped");
    }

    async fn is_idle(&self) -> bool {
        self.inner.pending_intents.load(Ordering::SeqCst) == 0
            && !self.inner.queue.is_draining()
            && self.inner.queue.pending_count().await == 0
    }

    async fn run_intake(
        self,
        mut receiver: mpsc::UnboundedReceiver<Intake>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                maybe_intent = receiver.recv() => {
                    let Some(intent) = maybe_intent else {
                        break;
                    };
                    self.handle_intake(intent).await;
                    self.inner.pending_intents.fetch_sub(1, Ordering::SeqCst);
                    self.inner.idle.notify_waiters();
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Intake worker stopped");
    }

    async fn run_drain_worker(self, mut shutdown: watch::Receiver<bool>) {
        let period = self
            .inner
            .config
            .idle_drain_interval
            .max(MIN_IDLE_DRAIN_INTERVAL);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.inner.drain_signal.notified() => {}
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            self.run_drain_cycles().await;
        }
        debug!("Drain worker stopped");
    }

    /// Drain until the backlog is empty, a cycle halts, or another drain
    /// holds the queue. A truncated cycle is followed by the next one at once.
    async fn run_drain_cycles(&self) {
        loop {
            if self.inner.queue.pending_count().await == 0 {
                return;
            }
            let Some(report) = self.drain_now().await else {
                return;
            };
            if !report.truncated {
                return;
            }
            debug!(
                remaining = report.remaining,
                "Continuing with remaining backlog"
            );
        }
    }

    async fn handle_intake(&self, intent: Intake) {
        match intent {
            Intake::Sync {
                event_id,
                update_type,
            } => self.handle_sync_intent(&event_id, update_type).await,
            Intake::SetAutoSync {
                event_id,
                enabled,
                reply,
            } => {
                let result = self.handle_set_auto_sync(&event_id, enabled).await;
                if let Err(e) = &result {
                    warn!(event_id = %event_id, enabled, error = %e, "Failed to toggle auto-sync");
                }
                if reply.send(result).is_err() {
                    debug!(event_id = %event_id, "Auto-sync caller went away before reply");
                }
            }
        }
    }

    async fn handle_sync_intent(&self, event_id: &EventId, update_type: UpdateType) {
        let state = match self.load_state(event_id).await {
            Ok(state) => state,
            Err(StoreError::EventNotFound(_)) => {
                debug!(event_id = %event_id, update_type = %update_type, "Unknown event, dropping sync intent");
                return;
            }
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    update_type = %update_type,
                    error = %e,
                    "Failed to read sync state, dropping sync intent"
                );
                self.record_read_failure(event_id, &e).await;
                return;
            }
        };

        if !state.auto_sync_enabled {
            debug!(event_id = %event_id, update_type = %update_type, "Auto-sync disabled, ignoring intent");
            return;
        }

        self.enqueue_task(event_id, update_type, state.sheet_id).await;
    }

    async fn handle_set_auto_sync(&self, event_id: &EventId, enabled: bool) -> ReconcilerResult<()> {
        let state = self.load_state(event_id).await?;

        self.log_transition(
            event_id,
            state.phase(),
            &toggle_input(enabled, state.sheet_id.is_some()),
        );
        self.inner
            .store
            .patch_sync_metadata(event_id, &SyncMetadataPatch::auto_sync(enabled))
            .await?;
        info!(event_id = %event_id, enabled, "Auto-sync toggled");

        let create_pending = self.inner.pending_creates.lock().contains(event_id);
        if enabled && state.sheet_id.is_none() && !create_pending {
            self.enqueue_task(event_id, UpdateType::Manual, None).await;
        }
        Ok(())
    }

    /// Snapshot the event and queue a task. Read failures are logged and
    /// recorded best-effort; the intent is dropped.
    async fn enqueue_task(&self, event_id: &EventId, update_type: UpdateType, sheet_id: Option<String>) {
        match self.build_task(event_id, update_type, sheet_id).await {
            Ok(task) => {
                if task.kind() == TaskKind::Create {
                    self.inner.pending_creates.lock().insert(event_id.clone());
                }
                self.inner.queue.enqueue(task).await;
                self.inner.drain_signal.notify_one();
            }
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    update_type = %update_type,
                    error = %e,
                    "Failed to read snapshot, dropping sync intent"
                );
                self.record_read_failure(event_id, &e).await;
            }
        }
    }

    async fn record_read_failure(&self, event_id: &EventId, error: &StoreError) {
        let patch = SyncMetadataPatch::snapshot_read_failed(error);
        if let Err(patch_err) = self.inner.store.patch_sync_metadata(event_id, &patch).await {
            debug!(event_id = %event_id, error = %patch_err, "Could not record snapshot read failure");
        }
    }

    /// Stored sync state, defaulted when absent, with any created sheet the
    /// store has not accepted yet. Each call retries persisting that sheet.
    async fn load_state(&self, event_id: &EventId) -> StoreResult<SyncState> {
        let mut state = self
            .inner
            .store
            .load_sync_state(event_id)
            .await?
            .unwrap_or_default();

        let unpersisted = self.inner.unpersisted_sheets.lock().get(event_id).cloned();
        let Some(sheet) = unpersisted else {
            return Ok(state);
        };
        if state.sheet_id.is_some() {
            self.inner.unpersisted_sheets.lock().remove(event_id);
            return Ok(state);
        }

        let patch = SyncMetadataPatch::sheet_linked(&sheet);
        match self.inner.store.patch_sync_metadata(event_id, &patch).await {
            Ok(()) => {
                self.inner.unpersisted_sheets.lock().remove(event_id);
                info!(
                    event_id = %event_id,
                    spreadsheet_id = %sheet.spreadsheet_id,
                    "Persisted spreadsheet id after earlier failure"
                );
            }
            Err(e) => warn!(
                event_id = %event_id,
                spreadsheet_id = %sheet.spreadsheet_id,
                error = %e,
                "Spreadsheet id still not persisted"
            ),
        }
        patch.apply_to(&mut state);
        Ok(state)
    }

    async fn build_task(
        &self,
        event_id: &EventId,
        update_type: UpdateType,
        sheet_id: Option<String>,
    ) -> StoreResult<SyncTask> {
        let event = self.inner.store.get_event(event_id).await?;
        let now = self.inner.clock.now();

        let create_pending = self.inner.pending_creates.lock().contains(event_id);
        if sheet_id.is_none() && !create_pending {
            let rows = match self.inner.config.create_snapshot {
                CreateSnapshotPolicy::Empty => Vec::new(),
                CreateSnapshotPolicy::Current => {
                    self.inner.store.list_registrations(event_id).await?
                }
            };
            return Ok(SyncTask::create(event, rows, update_type, now));
        }

        // Without a sheet id this update waits behind the pending create
        let rows = self.inner.store.list_registrations(event_id).await?;
        Ok(SyncTask::update(sheet_id, event, rows, update_type, now))
    }

    async fn dispatch(&self, task: SyncTask) -> DrainStep {
        let state = match self.load_state(task.event_id()).await {
            Ok(state) => state,
            Err(StoreError::EventNotFound(_)) => {
                self.finish_create(&task);
                return DrainStep::Completed(TaskResult::skipped(&task, "event no longer exists"));
            }
            Err(e) => {
                warn!(
                    task_id = %task.task_id(),
                    event_id = %task.event_id(),
                    error = %e,
                    "Failed to read sync state, halting drain"
                );
                return DrainStep::Halt(task);
            }
        };

        let prepared = match prepare(&task, &state) {
            Ok(prepared) => prepared,
            Err(reason) => {
                debug!(
                    task_id = %task.task_id(),
                    event_id = %task.event_id(),
                    reason,
                    "Skipping sync task"
                );
                self.finish_create(&task);
                return DrainStep::Completed(TaskResult::skipped(&task, reason));
            }
        };

        if !self.backend_healthy().await {
            return DrainStep::Halt(task);
        }

        let result = self.inner.executor.execute(&prepared).await;
        self.record_outcome(&prepared, &state, &result).await;
        self.finish_create(&task);
        DrainStep::Completed(result)
    }

    fn finish_create(&self, task: &SyncTask) {
        if task.kind() == TaskKind::Create {
            self.inner.pending_creates.lock().remove(task.event_id());
        }
    }

    async fn backend_healthy(&self) -> bool {
        let Some(ttl) = self.inner.config.health_check_ttl else {
            return true;
        };

        let cached = *self.inner.health.lock();
        if let Some(sample) = cached {
            if sample.checked_at.elapsed() < ttl {
                return sample.healthy;
            }
        }

        let healthy = self.inner.client.health_check().await;
        *self.inner.health.lock() = Some(HealthSample {
            checked_at: Instant::now(),
            healthy,
        });

        if healthy {
            debug!("Sheet backend healthy");
        } else {
            warn!(
                ttl_ms = ttl.as_millis() as u64,
                "Sheet backend unhealthy, halting drain"
            );
        }
        healthy
    }

    async fn record_outcome(&self, task: &SyncTask, state: &SyncState, result: &TaskResult) {
        let now = self.inner.clock.now();
        let patch = match (task.kind(), &result.error, &result.sheet) {
            (_, None, Some(sheet)) => {
                SyncMetadataPatch::create_succeeded(sheet, task.update_type(), now)
            }
            (_, None, None) => SyncMetadataPatch::update_succeeded(task.update_type(), now),
            (TaskKind::Create, Some(failure), _) => SyncMetadataPatch::create_failed(failure),
            (TaskKind::Update, Some(failure), _) => SyncMetadataPatch::update_failed(failure),
        };

        self.log_transition(
            task.event_id(),
            state.phase(),
            &outcome_input(task.kind(), result.success),
        );

        if let Err(e) = self
            .inner
            .store
            .patch_sync_metadata(task.event_id(), &patch)
            .await
        {
            error!(
                task_id = %task.task_id(),
                event_id = %task.event_id(),
                error = %e,
                "Failed to persist sync outcome"
            );
            // Later tasks must still see the sheet, or the next intent creates another
            if let Some(sheet) = &result.sheet {
                self.inner
                    .unpersisted_sheets
                    .lock()
                    .insert(task.event_id().clone(), sheet.clone());
            }
        }
    }

    fn log_transition(&self, event_id: &EventId, from: SyncPhase, input: &SyncMachineInput) {
        match transition(from, input) {
            Some(to) if to != from => info!(
                event_id = %event_id,
                from = from.as_str(),
                to = to.as_str(),
                input = ?input,
                "Sync state changed"
            ),
            Some(_) => debug!(event_id = %event_id, state = from.as_str(), input = ?input, "Sync state unchanged"),
            None => warn!(
                event_id = %event_id,
                from = from.as_str(),
                input = ?input,
                "Unexpected sync state transition"
            ),
        }
    }
}

/// Apply dispatch-time guards to a queued task.
///
/// Skips tasks for disabled events and updates that never got a sheet. A
/// create for an event that already has a sheet becomes an update of it, and
/// an update queued behind a create is bound to the created sheet.
fn prepare(task: &SyncTask, state: &SyncState) -> Result<SyncTask, &'static str> {
    if !state.auto_sync_enabled {
        return Err("auto-sync disabled");
    }

    let target = match (task.kind(), task.spreadsheet_id().is_some(), &state.sheet_id) {
        (TaskKind::Create, _, Some(sheet_id)) => Some(sheet_id.clone()),
        (TaskKind::Update, false, Some(sheet_id)) => Some(sheet_id.clone()),
        (TaskKind::Update, false, None) => return Err("no spreadsheet for event"),
        _ => None,
    };

    Ok(match target {
        Some(sheet_id) => task.bound_to(sheet_id),
        None => task.clone(),
    })
}
