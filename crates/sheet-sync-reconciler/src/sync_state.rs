//! Persisted per-event sync state and the patches that update it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncFailure;
use crate::sync_fsm::SyncPhase;
use crate::types::{SheetHandle, UpdateType};

/// Sync configuration and last outcome stored on the event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub sheet_id: Option<String>,
    #[serde(default)]
    pub sheet_url: Option<String>,
    #[serde(default = "default_auto_sync")]
    pub auto_sync_enabled: bool,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync_type: Option<UpdateType>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub creation_error: Option<String>,
}

fn default_auto_sync() -> bool {
    true
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            sheet_id: None,
            sheet_url: None,
            auto_sync_enabled: default_auto_sync(),
            last_sync_at: None,
            last_sync_type: None,
            last_error: None,
            creation_error: None,
        }
    }
}

impl SyncState {
    /// Derive the state machine phase from the stored fields.
    pub fn phase(&self) -> SyncPhase {
        match (self.auto_sync_enabled, self.sheet_id.is_some()) {
            // A failed create turns auto-sync off but is still a failure
            (false, false) if self.creation_error.is_some() => SyncPhase::Failing,
            (false, _) => SyncPhase::Disabled,
            (true, false) => SyncPhase::AwaitingCreate,
            (true, true) if self.last_error.is_some() => SyncPhase::Failing,
            (true, true) => SyncPhase::Synced,
        }
    }
}

/// Partial update of the sync fields.
///
/// `None` leaves a field untouched. Nullable fields use a nested option so a
/// patch can clear them. `sheet_id` can only be set, never cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncMetadataPatch {
    pub sheet_id: Option<String>,
    pub sheet_url: Option<String>,
    pub auto_sync_enabled: Option<bool>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_type: Option<UpdateType>,
    pub last_error: Option<Option<String>>,
    pub creation_error: Option<Option<String>>,
}

impl SyncMetadataPatch {
    /// A create succeeded: record the sheet and clear both errors.
    pub fn create_succeeded(sheet: &SheetHandle, update_type: UpdateType, at: DateTime<Utc>) -> Self {
        Self {
            sheet_id: Some(sheet.spreadsheet_id.clone()),
            sheet_url: Some(sheet.url.clone()),
            last_sync_at: Some(at),
            last_sync_type: Some(update_type),
            last_error: Some(None),
            creation_error: Some(None),
            ..Self::default()
        }
    }

    /// Only the sheet location of a create whose outcome was not persisted.
    pub fn sheet_linked(sheet: &SheetHandle) -> Self {
        Self {
            sheet_id: Some(sheet.spreadsheet_id.clone()),
            sheet_url: Some(sheet.url.clone()),
            ..Self::default()
        }
    }

    /// An update succeeded.
    pub fn update_succeeded(update_type: UpdateType, at: DateTime<Utc>) -> Self {
        Self {
            last_sync_at: Some(at),
            last_sync_type: Some(update_type),
            last_error: Some(None),
            ..Self::default()
        }
    }

    /// A create failed: auto-sync goes off until an admin re-enables it.
    pub fn create_failed(failure: &SyncFailure) -> Self {
        let message = failure.to_string();
        Self {
            auto_sync_enabled: Some(false),
            last_error: Some(Some(message.clone())),
            creation_error: Some(Some(message)),
            ..Self::default()
        }
    }

    /// An update failed: auto-sync stays on.
    pub fn update_failed(failure: &SyncFailure) -> Self {
        Self {
            last_error: Some(Some(failure.to_string())),
            ..Self::default()
        }
    }

    /// Reading the snapshot at intake failed.
    pub fn snapshot_read_failed(reason: impl std::fmt::Display) -> Self {
        Self {
            last_error: Some(Some(format!("snapshot read failed: {reason}"))),
            ..Self::default()
        }
    }

    /// Admin toggle. Either direction clears a stale creation error.
    pub fn auto_sync(enabled: bool) -> Self {
        Self {
            auto_sync_enabled: Some(enabled),
            creation_error: Some(None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this patch to an in-memory state.
    pub fn apply_to(&self, state: &mut SyncState) {
        if let Some(sheet_id) = &self.sheet_id {
            state.sheet_id = Some(sheet_id.clone());
        }
        if let Some(sheet_url) = &self.sheet_url {
            state.sheet_url = Some(sheet_url.clone());
        }
        if let Some(enabled) = self.auto_sync_enabled {
            state.auto_sync_enabled = enabled;
        }
        if let Some(at) = self.last_sync_at {
            state.last_sync_at = Some(at);
        }
        if let Some(update_type) = self.last_sync_type {
            state.last_sync_type = Some(update_type);
        }
        if let Some(last_error) = &self.last_error {
            state.last_error = last_error.clone();
        }
        if let Some(creation_error) = &self.creation_error {
            state.creation_error = creation_error.clone();
        }
    }
}
