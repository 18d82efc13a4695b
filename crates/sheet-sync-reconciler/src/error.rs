//! Error types for the sheet sync reconciler.
//!
//! Store and client errors come from the external collaborators. `SyncFailure`
//! is the taxonomy the coordinator records into an event's sync state once a
//! task has finished.

use thiserror::Error;

/// Errors returned by an [`EventStore`](crate::EventStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The event record does not exist.
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// The backing data store rejected or failed the request.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a [`SheetSyncClient`](crate::SheetSyncClient).
///
/// Every variant is treated as retryable by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetClientError {
    /// Creating the spreadsheet failed.
    #[error("sheet creation failed: {0}")]
    Create(String),

    /// Upserting rows into an existing spreadsheet failed.
    #[error("sheet update failed: {0}")]
    Update(String),

    /// The spreadsheet backend could not be reached.
    #[error("sheet backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for spreadsheet client operations.
pub type SheetClientResult<T> = Result<T, SheetClientError>;

/// Why a sync task did not succeed.
///
/// The `Display` output is what lands in `last_error` / `creation_error`, so
/// each variant carries a distinct prefix that dashboards can tell apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncFailure {
    /// The task's snapshot failed validation; no attempt was made.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Every attempt failed; carries the last client error.
    #[error("sync failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// The task was dropped at dispatch without contacting the backend.
    #[error("skipped: {0}")]
    Skipped(String),
}

/// Errors surfaced by the [`Reconciler`](crate::Reconciler) control API.
///
/// `request_sync` never returns these; only admin/control calls do.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// `start` was called more than once.
    #[error("reconciler already started")]
    AlreadyStarted,

    /// The reconciler workers are not running.
    #[error("reconciler is not running")]
    NotRunning,

    /// The data store failed while handling a control request.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for reconciler control operations.
pub type ReconcilerResult<T> = Result<T, ReconcilerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages_are_distinguishable() {
        let malformed = SyncFailure::MalformedSnapshot("event title is empty".to_string());
        let exhausted = SyncFailure::Exhausted {
            attempts: 3,
            last_error: "sheet update failed: 503".to_string(),
        };

        assert_eq!(malformed.to_string(), "malformed snapshot: event title is empty");
        assert_eq!(
            exhausted.to_string(),
            "sync failed after 3 attempts: sheet update failed: 503"
        );
    }

    #[test]
    fn store_error_converts_into_reconciler_error() {
        let err: ReconcilerError = StoreError::EventNotFound("evt-1".to_string()).into();
        assert_eq!(err.to_string(), "store error: event not found: evt-1");
    }
}
