//! # Sheet Sync Reconciler
//!
//! Keeps one externally hosted spreadsheet per event in step with the event's
//! registrations, without ever blocking the business operations that change
//! them.
//!
//! ## Flow
//!
//! ```text
//! request_sync ─► intake worker ─► SyncTaskQueue ─► drain worker
//!                  (snapshot)        (FIFO, capped)     │
//!                                                       ▼
//!                 EventStore ◄── outcome patch ◄── RetryExecutor ─► SheetSyncClient
//! ```
//!
//! ## Guarantees
//!
//! - **Callers never wait** - `request_sync` only appends to a channel
//! - **Per-event order** - tasks of one event execute in the order requested
//! - **One create per event** - later intents queue as updates bound at dispatch
//! - **Bounded retries** - each task makes at most `max_attempts` calls
//! - **Observable failure** - outcomes land in the event's sync fields
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sheet_sync_reconciler::memory::{InMemoryEventStore, RecordingSheetClient};
//! use sheet_sync_reconciler::{
//!     EventId, EventView, Reconciler, ReconcilerConfig, SystemClock, UpdateType,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(InMemoryEventStore::new());
//! store.insert_event(EventView::new("evt-1", "Robotics Workshop"));
//! let client = Arc::new(RecordingSheetClient::new());
//!
//! let config = ReconcilerConfig {
//!     health_check_ttl: None,
//!     ..ReconcilerConfig::default()
//! };
//! let reconciler = Reconciler::new(config, store.clone(), client.clone(), Arc::new(SystemClock));
//! reconciler.start().unwrap();
//!
//! reconciler.request_sync("evt-1", UpdateType::Registration);
//! reconciler.wait_idle().await;
//!
//! let state = store.sync_state(&EventId::from("evt-1")).unwrap();
//! assert!(state.sheet_id.is_some());
//! reconciler.shutdown().await;
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - [`types`] - Events, registrations, tasks and results
//! - [`ports`] - Store, sheet client and clock traits
//! - [`queue`] - The FIFO task queue
//! - [`retry`] - Backoff, retry combinator and executor
//! - [`sync_state`] - Persisted sync fields and patches
//! - [`sync_fsm`] - Per-event state machine
//! - [`memory`] - In-memory ports for tests and dry runs

mod error;
pub mod memory;
pub mod ports;
pub mod queue;
mod reconciler;
pub mod retry;
pub mod sync_fsm;
pub mod sync_state;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{
    ReconcilerError, ReconcilerResult, SheetClientError, SheetClientResult, StoreError,
    StoreResult, SyncFailure,
};
pub use ports::{Clock, EventStore, SheetSyncClient, SystemClock};
pub use queue::{DrainReport, DrainStep, SyncTaskQueue, DEFAULT_DRAIN_CAP, DEFAULT_TASK_PACING};
pub use reconciler::{
    CreateSnapshotPolicy, DrainSummary, QueueStatus, Reconciler, ReconcilerConfig,
    DEFAULT_HEALTH_CHECK_TTL, DEFAULT_IDLE_DRAIN_INTERVAL,
};
pub use retry::{
    retry, Backoff, RetryExecutor, RetryOutcome, RetryPolicy, DEFAULT_BASE_DELAY,
    DEFAULT_MAX_ATTEMPTS,
};
pub use sync_fsm::{SyncMachine, SyncMachineInput, SyncMachineState, SyncPhase};
pub use sync_state::{SyncMetadataPatch, SyncState};
pub use types::{
    EventId, EventView, PaymentStatus, RegistrationView, SheetHandle, SyncTask, TaskKind,
    TaskResult, UpdateType,
};
