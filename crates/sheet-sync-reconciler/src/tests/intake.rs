//! I. Intake tests.
//!
//! Rules covered:
//! - 1. request_sync returns before any sheet call completes
//! - 2. Intents for disabled events are ignored
//! - 3. Intents for unknown events are dropped without side effects
//! - 4. Snapshot read failures are recorded and the intent is dropped
//! - 27. Sync state read failures are recorded the same way

use std::time::Duration;

use tokio::time::Instant;

use super::harness::{fast_config, TestHarness};
use crate::memory::RecordingSheetClient;
use crate::{EventId, SyncState, UpdateType};

/// Rule 1: request_sync returns before any sheet call completes
#[tokio::test(start_paused = true)]
async fn rule_01_request_sync_does_not_wait_for_backend() {
    let h = TestHarness::with_client(
        fast_config(),
        RecordingSheetClient::with_latency(Duration::from_millis(500)),
    )
    .started();
    let event_id = h.seed_event("evt-1", 2);

    h.reconciler.request_sync(event_id.clone(), UpdateType::Registration);
    let returned_at = Instant::now();

    // The workers have not run yet
    assert!(h.client.calls().is_empty());

    h.reconciler.wait_idle().await;

    let completed = h.client.completed_at();
    assert_eq!(completed.len(), 1);
    assert!(completed[0] > returned_at);
    assert!(h.state(&event_id).sheet_id.is_some());
}

/// Rule 2: Intents for disabled events are ignored
#[tokio::test(start_paused = true)]
async fn rule_02_disabled_event_is_ignored() {
    let h = TestHarness::new().started();
    let event_id = h.seed_event("evt-1", 1);
    h.link_sheet(&event_id);
    let mut state = h.state(&event_id);
    state.auto_sync_enabled = false;
    h.store.set_sync_state(&event_id, state);

    h.reconciler.request_sync(event_id.clone(), UpdateType::Attendance);
    h.reconciler.wait_idle().await;

    assert!(h.client.calls().is_empty());
    assert!(h.store.patches_for(&event_id).is_empty());
}

/// Rule 3: Intents for unknown events are dropped without side effects
#[tokio::test(start_paused = true)]
async fn rule_03_unknown_event_is_dropped() {
    let h = TestHarness::new().started();

    h.reconciler.request_sync("evt-missing", UpdateType::Payment);
    h.reconciler.wait_idle().await;

    assert!(h.client.calls().is_empty());
    assert!(h.store.patches().is_empty());
    let status = h.reconciler.queue_status().await;
    assert_eq!(status.pending, 0);
    assert_eq!(status.pending_intents, 0);
}

/// Rule 4: Snapshot read failures are recorded and the intent is dropped
#[tokio::test(start_paused = true)]
async fn rule_04_snapshot_read_failure_is_recorded() {
    let h = TestHarness::new().started();
    let event_id: EventId = h.seed_event("evt-1", 1);
    h.link_sheet(&event_id);
    h.store.set_read_failure(Some("connection reset"));

    h.reconciler.request_sync(event_id.clone(), UpdateType::Registration);
    h.reconciler.wait_idle().await;

    assert!(h.client.calls().is_empty());
    let state: SyncState = h.state(&event_id);
    assert_eq!(
        state.last_error.as_deref(),
        Some("snapshot read failed: store backend error: connection reset")
    );
    assert!(state.auto_sync_enabled);

    // The next intent after the store recovers syncs and clears the error
    h.store.set_read_failure(None);
    h.reconciler.request_sync(event_id.clone(), UpdateType::Registration);
    h.reconciler.wait_idle().await;

    assert_eq!(h.client.update_count(), 1);
    assert!(h.state(&event_id).last_error.is_none());
}

/// Rule 27: Sync state read failures are recorded the same way
#[tokio::test(start_paused = true)]
async fn rule_27_state_read_failure_is_recorded() {
    let h = TestHarness::new().started();
    let event_id = h.seed_event("evt-1", 1);
    h.link_sheet(&event_id);
    h.store.fail_next_state_reads(1);

    h.reconciler.request_sync(event_id.clone(), UpdateType::Payment);
    h.reconciler.wait_idle().await;

    assert!(h.client.calls().is_empty());
    assert_eq!(
        h.state(&event_id).last_error.as_deref(),
        Some("snapshot read failed: store backend error: scripted state read failure")
    );

    h.reconciler.request_sync(event_id.clone(), UpdateType::Payment);
    h.reconciler.wait_idle().await;

    assert_eq!(h.client.update_count(), 1);
    assert!(h.state(&event_id).last_error.is_none());
}
