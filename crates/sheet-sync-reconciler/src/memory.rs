//! In-memory implementations of the reconciler ports.
//!
//! Used by the test suites and by the binary's dry-run mode. The sheet client
//! records every call and keeps a document per spreadsheet so idempotency can
//! be checked by comparing documents.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{SheetClientError, SheetClientResult, StoreError, StoreResult};
use crate::ports::{Clock, EventStore, SheetSyncClient};
use crate::sync_state::{SyncMetadataPatch, SyncState};
use crate::types::{EventId, EventView, RegistrationView, SheetHandle};

struct EventRecord {
    event: EventView,
    registrations: Vec<RegistrationView>,
    sync: Option<SyncState>,
}

/// Event store held in memory.
#[derive(Default)]
pub struct InMemoryEventStore {
    records: Mutex<HashMap<EventId, EventRecord>>,
    patches: Mutex<Vec<(EventId, SyncMetadataPatch)>>,
    read_failure: Mutex<Option<String>>,
    patch_failures: AtomicU32,
    state_read_failures: AtomicU32,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an event, keeping its registrations and sync state.
    pub fn insert_event(&self, event: EventView) {
        let mut records = self.records.lock();
        match records.get_mut(&event.id) {
            Some(record) => record.event = event,
            None => {
                records.insert(
                    event.id.clone(),
                    EventRecord {
                        event,
                        registrations: Vec::new(),
                        sync: None,
                    },
                );
            }
        }
    }

    /// Insert or replace a registration by id. Ignored if the event is unknown.
    pub fn upsert_registration(&self, registration: RegistrationView) {
        let mut records = self.records.lock();
        let Some(record) = records.get_mut(&registration.event_id) else {
            return;
        };
        match record
            .registrations
            .iter_mut()
            .find(|r| r.id == registration.id)
        {
            Some(existing) => *existing = registration,
            None => record.registrations.push(registration),
        }
    }

    /// Overwrite the stored sync state of an event.
    pub fn set_sync_state(&self, event_id: &EventId, state: SyncState) {
        if let Some(record) = self.records.lock().get_mut(event_id) {
            record.sync = Some(state);
        }
    }

    /// Current sync state, defaulted when the record has none.
    pub fn sync_state(&self, event_id: &EventId) -> Option<SyncState> {
        self.records
            .lock()
            .get(event_id)
            .map(|record| record.sync.clone().unwrap_or_default())
    }

    /// Every patch applied so far, in order.
    pub fn patches(&self) -> Vec<(EventId, SyncMetadataPatch)> {
        self.patches.lock().clone()
    }

    /// Patches applied to one event, in order.
    pub fn patches_for(&self, event_id: &EventId) -> Vec<SyncMetadataPatch> {
        self.patches
            .lock()
            .iter()
            .filter(|(id, _)| id == event_id)
            .map(|(_, patch)| patch.clone())
            .collect()
    }

    /// Make snapshot reads fail with `reason` until cleared with `None`.
    pub fn set_read_failure(&self, reason: Option<&str>) {
        *self.read_failure.lock() = reason.map(str::to_string);
    }

    /// Make the next `count` metadata writes fail without applying.
    pub fn fail_next_patches(&self, count: u32) {
        self.patch_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` sync state reads fail.
    pub fn fail_next_state_reads(&self, count: u32) {
        self.state_read_failures.store(count, Ordering::SeqCst);
    }

    fn check_read(&self) -> StoreResult<()> {
        match self.read_failure.lock().as_ref() {
            Some(reason) => Err(StoreError::Backend(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_event(&self, event_id: &EventId) -> StoreResult<EventView> {
        self.check_read()?;
        self.records
            .lock()
            .get(event_id)
            .map(|record| record.event.clone())
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))
    }

    async fn list_registrations(&self, event_id: &EventId) -> StoreResult<Vec<RegistrationView>> {
        self.check_read()?;
        self.records
            .lock()
            .get(event_id)
            .map(|record| record.registrations.clone())
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))
    }

    async fn load_sync_state(&self, event_id: &EventId) -> StoreResult<Option<SyncState>> {
        if self
            .state_read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Backend("scripted state read failure".to_string()));
        }
        self.records
            .lock()
            .get(event_id)
            .map(|record| record.sync.clone())
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))
    }

    async fn patch_sync_metadata(
        &self,
        event_id: &EventId,
        patch: &SyncMetadataPatch,
    ) -> StoreResult<()> {
        if self
            .patch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Backend("scripted patch failure".to_string()));
        }

        let mut records = self.records.lock();
        let record = records
            .get_mut(event_id)
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))?;
        patch.apply_to(record.sync.get_or_insert_with(SyncState::default));
        drop(records);

        self.patches.lock().push((event_id.clone(), patch.clone()));
        Ok(())
    }
}

/// A call received by [`RecordingSheetClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetCall {
    Create {
        event_id: EventId,
        rows: usize,
    },
    Update {
        spreadsheet_id: String,
        event_id: EventId,
        rows: usize,
    },
}

/// Contents of a fake spreadsheet: the title and one row per registration id.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetDocument {
    pub title: String,
    pub rows: BTreeMap<String, RegistrationView>,
}

impl SheetDocument {
    fn from_snapshot(event: &EventView, rows: &[RegistrationView]) -> Self {
        Self {
            title: event.title.clone(),
            rows: rows.iter().map(|r| (r.id.clone(), r.clone())).collect(),
        }
    }

    /// Rows are keyed by registration id; rows absent from `rows` are kept.
    fn upsert(&mut self, event: &EventView, rows: &[RegistrationView]) {
        self.title = event.title.clone();
        for row in rows {
            self.rows.insert(row.id.clone(), row.clone());
        }
    }
}

/// Sheet client that records calls and keeps documents in memory.
#[derive(Default)]
pub struct RecordingSheetClient {
    calls: Mutex<Vec<SheetCall>>,
    documents: Mutex<HashMap<String, SheetDocument>>,
    completions: Mutex<Vec<Instant>>,
    latency: Mutex<Duration>,
    fail_next: AtomicU32,
    always_fail: AtomicBool,
    unhealthy: AtomicBool,
    health_checks: AtomicU32,
    next_id: AtomicU64,
}

impl RecordingSheetClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every create/update by `latency` before it completes.
    pub fn with_latency(latency: Duration) -> Self {
        let client = Self::default();
        *client.latency.lock() = latency;
        client
    }

    /// Fail the next `count` calls.
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fail every call until turned off.
    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SheetCall> {
        self.calls.lock().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SheetCall::Create { .. }))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SheetCall::Update { .. }))
            .count()
    }

    pub fn health_check_count(&self) -> u32 {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Register an existing spreadsheet without recording a call.
    pub fn seed_sheet(&self, spreadsheet_id: &str, event: &EventView) {
        self.documents.lock().insert(
            spreadsheet_id.to_string(),
            SheetDocument::from_snapshot(event, &[]),
        );
    }

    pub fn document(&self, spreadsheet_id: &str) -> Option<SheetDocument> {
        self.documents.lock().get(spreadsheet_id).cloned()
    }

    /// When each successful call completed.
    pub fn completed_at(&self) -> Vec<Instant> {
        self.completions.lock().clone()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn should_fail(&self) -> bool {
        if self.always_fail.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SheetSyncClient for RecordingSheetClient {
    async fn create(
        &self,
        event: &EventView,
        rows: &[RegistrationView],
    ) -> SheetClientResult<SheetHandle> {
        self.calls.lock().push(SheetCall::Create {
            event_id: event.id.clone(),
            rows: rows.len(),
        });
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(SheetClientError::Create("scripted failure".to_string()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let spreadsheet_id = format!("sheet-{n}");
        self.documents.lock().insert(
            spreadsheet_id.clone(),
            SheetDocument::from_snapshot(event, rows),
        );
        self.completions.lock().push(Instant::now());

        Ok(SheetHandle {
            url: format!("https://sheets.example/{spreadsheet_id}"),
            spreadsheet_id,
        })
    }

    async fn update(
        &self,
        spreadsheet_id: &str,
        event: &EventView,
        rows: &[RegistrationView],
    ) -> SheetClientResult<()> {
        self.calls.lock().push(SheetCall::Update {
            spreadsheet_id: spreadsheet_id.to_string(),
            event_id: event.id.clone(),
            rows: rows.len(),
        });
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(SheetClientError::Update("scripted failure".to_string()));
        }

        let mut documents = self.documents.lock();
        let document = documents
            .get_mut(spreadsheet_id)
            .ok_or_else(|| SheetClientError::Update(format!("unknown spreadsheet {spreadsheet_id}")))?;
        document.upsert(event, rows);
        drop(documents);

        self.completions.lock().push(Instant::now());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        !self.unhealthy.load(Ordering::SeqCst)
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
