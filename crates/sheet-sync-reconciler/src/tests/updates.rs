//! III. Update and failure tests.
//!
//! Rules covered:
//! - 11. Repeating an update with the same snapshot leaves the sheet unchanged
//! - 12. Exhausted updates record last_error and keep auto-sync on
//! - 13. The next successful update clears last_error
//! - 14. A malformed update snapshot is never sent and is reported distinctly

use super::harness::TestHarness;
use crate::{EventView, SyncPhase, UpdateType};

/// Rule 11: Repeating an update with the same snapshot leaves the sheet unchanged
#[tokio::test(start_paused = true)]
async fn rule_11_update_is_idempotent() {
    let h = TestHarness::new().started();
    let event_id = h.seed_event("evt-1", 2);
    let sheet_id = h.link_sheet(&event_id);

    h.reconciler.request_sync(event_id.clone(), UpdateType::Attendance);
    h.reconciler.wait_idle().await;
    let first = h.client.document(&sheet_id).unwrap();

    h.reconciler.request_sync(event_id.clone(), UpdateType::Attendance);
    h.reconciler.wait_idle().await;
    let second = h.client.document(&sheet_id).unwrap();

    assert_eq!(h.client.update_count(), 2);
    assert_eq!(first.rows.len(), 2);
    assert_eq!(first, second);
}

/// Rule 12: Exhausted updates record last_error and keep auto-sync on
#[tokio::test(start_paused = true)]
async fn rule_12_update_exhaustion_keeps_auto_sync() {
    let h = TestHarness::new().started();
    let event_id = h.seed_event("evt-1", 1);
    let sheet_id = h.link_sheet(&event_id);
    h.client.set_always_fail(true);

    h.reconciler.request_sync(event_id.clone(), UpdateType::Payment);
    h.reconciler.wait_idle().await;

    assert_eq!(h.client.update_count(), 3);
    let state = h.state(&event_id);
    assert!(state.auto_sync_enabled);
    assert_eq!(state.sheet_id.as_deref(), Some(sheet_id.as_str()));
    assert!(state.creation_error.is_none());
    let last_error = state.last_error.clone().unwrap();
    assert!(
        last_error.starts_with("sync failed after 3 attempts: sheet update failed"),
        "unexpected last error: {last_error}"
    );
    assert_eq!(state.phase(), SyncPhase::Failing);
}

/// Rule 13: The next successful update clears last_error
#[tokio::test(start_paused = true)]
async fn rule_13_success_recovers_from_failing() {
    let h = TestHarness::new().started();
    let event_id = h.seed_event("evt-1", 1);
    h.link_sheet(&event_id);
    h.client.set_always_fail(true);

    h.reconciler.request_sync(event_id.clone(), UpdateType::Payment);
    h.reconciler.wait_idle().await;
    assert_eq!(h.state(&event_id).phase(), SyncPhase::Failing);

    h.client.set_always_fail(false);
    h.register("evt-1", "evt-1-late");
    h.reconciler.request_sync(event_id.clone(), UpdateType::Registration);
    h.reconciler.wait_idle().await;

    let state = h.state(&event_id);
    assert!(state.last_error.is_none());
    assert_eq!(state.last_sync_type, Some(UpdateType::Registration));
    assert_eq!(state.phase(), SyncPhase::Synced);
}

/// Rule 14: A malformed update snapshot is never sent and is reported distinctly
#[tokio::test(start_paused = true)]
async fn rule_14_malformed_update_snapshot() {
    let h = TestHarness::new().started();
    let event_id = h.seed_event("evt-1", 1);
    h.link_sheet(&event_id);
    h.store.insert_event(EventView::new(event_id.clone(), ""));

    h.reconciler.request_sync(event_id.clone(), UpdateType::Attendance);
    h.reconciler.wait_idle().await;

    assert_eq!(h.client.update_count(), 0);
    let state = h.state(&event_id);
    assert!(state.auto_sync_enabled);
    assert_eq!(
        state.last_error.as_deref(),
        Some("malformed snapshot: event title is empty")
    );
}
