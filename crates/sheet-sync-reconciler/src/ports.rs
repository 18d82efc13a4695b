//! Interfaces to the collaborators the reconciler depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{SheetClientResult, StoreResult};
use crate::sync_state::{SyncMetadataPatch, SyncState};
use crate::types::{EventId, EventView, RegistrationView, SheetHandle};

/// Narrow view of the hosted data store.
///
/// The reconciler only reads event snapshots and writes the sync fields of the
/// event record. Every other mutation belongs to the business operations.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Fetch the event. Fails with `StoreError::EventNotFound` if absent.
    async fn get_event(&self, event_id: &EventId) -> StoreResult<EventView>;

    /// All current registrations of the event.
    async fn list_registrations(&self, event_id: &EventId) -> StoreResult<Vec<RegistrationView>>;

    /// Stored sync state. `None` means the record has no sync fields yet and
    /// callers treat it as [`SyncState::default`].
    async fn load_sync_state(&self, event_id: &EventId) -> StoreResult<Option<SyncState>>;

    /// Write the fields carried by `patch`.
    async fn patch_sync_metadata(
        &self,
        event_id: &EventId,
        patch: &SyncMetadataPatch,
    ) -> StoreResult<()>;
}

/// Client for the spreadsheet backend.
///
/// Implementations need not be reentrant: the reconciler never issues two
/// calls concurrently.
#[async_trait]
pub trait SheetSyncClient: Send + Sync {
    /// Create a spreadsheet for the event and write the initial rows.
    async fn create(
        &self,
        event: &EventView,
        rows: &[RegistrationView],
    ) -> SheetClientResult<SheetHandle>;

    /// Upsert `rows` keyed by registration id. Repeating a call with the same
    /// snapshot must leave the sheet unchanged.
    async fn update(
        &self,
        spreadsheet_id: &str,
        event: &EventView,
        rows: &[RegistrationView],
    ) -> SheetClientResult<()>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> bool;
}

/// Source of wall-clock timestamps written into sync state.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
