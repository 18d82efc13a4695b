//! Test harness for reconciler behavior tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::memory::{InMemoryEventStore, ManualClock, RecordingSheetClient, SheetCall};
use crate::{
    Backoff, CreateSnapshotPolicy, EventId, EventView, Reconciler, ReconcilerConfig,
    RegistrationView, RetryPolicy, SyncState,
};

/// Config with short delays and no health probing.
pub fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Linear {
                base: Duration::from_millis(100),
            },
        },
        task_pacing: Duration::from_millis(10),
        drain_cap: 50,
        idle_drain_interval: Duration::from_secs(1),
        health_check_ttl: None,
        create_snapshot: CreateSnapshotPolicy::Current,
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Reconciler wired to in-memory ports.
pub struct TestHarness {
    pub store: Arc<InMemoryEventStore>,
    pub client: Arc<RecordingSheetClient>,
    pub clock: Arc<ManualClock>,
    pub reconciler: Reconciler,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_client(fast_config(), RecordingSheetClient::new())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        Self::with_client(config, RecordingSheetClient::new())
    }

    pub fn with_client(config: ReconcilerConfig, client: RecordingSheetClient) -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let client = Arc::new(client);
        let clock = Arc::new(ManualClock::new(epoch()));
        let reconciler = Reconciler::new(config, store.clone(), client.clone(), clock.clone());

        Self {
            store,
            client,
            clock,
            reconciler,
        }
    }

    /// Start the workers and return self.
    pub fn started(self) -> Self {
        self.reconciler.start().unwrap();
        self
    }

    /// Insert an event with `registrations` attendees.
    pub fn seed_event(&self, id: &str, registrations: usize) -> EventId {
        self.store.insert_event(EventView::new(id, format!("Event {id}")));
        for i in 0..registrations {
            self.register(id, &format!("{id}-reg-{i}"));
        }
        EventId::from(id)
    }

    pub fn register(&self, event_id: &str, registration_id: &str) {
        self.store.upsert_registration(RegistrationView::new(
            registration_id,
            event_id,
            format!("Attendee {registration_id}"),
            format!("{registration_id}@campus.edu"),
        ));
    }

    /// Give an event an existing spreadsheet, as if created earlier.
    pub fn link_sheet(&self, event_id: &EventId) -> String {
        let spreadsheet_id = format!("existing-{event_id}");
        let event = EventView::new(event_id.clone(), format!("Event {event_id}"));
        self.client.seed_sheet(&spreadsheet_id, &event);
        self.store.set_sync_state(
            event_id,
            SyncState {
                sheet_id: Some(spreadsheet_id.clone()),
                sheet_url: Some(format!("https://sheets.example/{spreadsheet_id}")),
                ..SyncState::default()
            },
        );
        spreadsheet_id
    }

    pub fn state(&self, event_id: &EventId) -> SyncState {
        self.store.sync_state(event_id).unwrap()
    }

    /// Sheet calls made for one event, in order.
    pub fn calls_for(&self, event_id: &EventId) -> Vec<SheetCall> {
        self.client
            .calls()
            .into_iter()
            .filter(|call| match call {
                SheetCall::Create { event_id: id, .. } => id == event_id,
                SheetCall::Update { event_id: id, .. } => id == event_id,
            })
            .collect()
    }
}
