//! Core types for the sheet sync reconciler.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncFailure;

/// Unique identifier for an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wrap an existing identifier string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Read-only view of an event as the spreadsheet needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub is_paid: bool,
}

impl EventView {
    /// Minimal view with only the required fields set.
    pub fn new(id: impl Into<EventId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            venue: None,
            starts_at: None,
            organizer: None,
            capacity: None,
            is_paid: false,
        }
    }
}

/// Payment state of a registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    NotRequired,
    Pending,
    Paid,
}

/// Read-only view of one registration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationView {
    pub id: String,
    pub event_id: EventId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attended: bool,
    #[serde(default)]
    pub checked_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
}

impl RegistrationView {
    pub fn new(
        id: impl Into<String>,
        event_id: impl Into<EventId>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            name: name.into(),
            email: email.into(),
            phone: None,
            roll_number: None,
            registered_at: None,
            attended: false,
            checked_in_at: None,
            payment_status: PaymentStatus::NotRequired,
        }
    }
}

/// The business change that triggered a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Registration,
    Attendance,
    Payment,
    Manual,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Registration => "registration",
            UpdateType::Attendance => "attendance",
            UpdateType::Payment => "payment",
            UpdateType::Manual => "manual",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registration" => Ok(UpdateType::Registration),
            "attendance" => Ok(UpdateType::Attendance),
            "payment" => Ok(UpdateType::Payment),
            "manual" => Ok(UpdateType::Manual),
            other => Err(format!("unknown update type: {other}")),
        }
    }
}

/// Whether a task creates the spreadsheet or upserts into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Create,
    Update,
}

/// Location of a created spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetHandle {
    pub spreadsheet_id: String,
    pub url: String,
}

/// One unit of sync work.
///
/// Snapshots are captured when the task is built and shared behind `Arc`, so
/// a task is a value: later changes to the store never leak into it.
#[derive(Debug, Clone)]
pub struct SyncTask {
    task_id: Uuid,
    spreadsheet_id: Option<String>,
    kind: TaskKind,
    event_id: EventId,
    event: Arc<EventView>,
    rows: Arc<[RegistrationView]>,
    update_type: UpdateType,
    enqueued_at: DateTime<Utc>,
}

impl SyncTask {
    /// Task that creates the event's spreadsheet.
    pub fn create(
        event: EventView,
        rows: Vec<RegistrationView>,
        update_type: UpdateType,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self::build(None, TaskKind::Create, event, rows, update_type, enqueued_at)
    }

    /// Task that upserts rows into a spreadsheet.
    ///
    /// `spreadsheet_id` is `None` when the task is queued behind a pending
    /// create; the target is then bound at dispatch with [`SyncTask::bound_to`].
    pub fn update(
        spreadsheet_id: Option<String>,
        event: EventView,
        rows: Vec<RegistrationView>,
        update_type: UpdateType,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self::build(
            spreadsheet_id,
            TaskKind::Update,
            event,
            rows,
            update_type,
            enqueued_at,
        )
    }

    fn build(
        spreadsheet_id: Option<String>,
        kind: TaskKind,
        event: EventView,
        rows: Vec<RegistrationView>,
        update_type: UpdateType,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            spreadsheet_id,
            kind,
            event_id: event.id.clone(),
            event: Arc::new(event),
            rows: rows.into(),
            update_type,
            enqueued_at,
        }
    }

    /// Same snapshot, re-targeted as an update of `spreadsheet_id`.
    pub fn bound_to(&self, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: Some(spreadsheet_id.into()),
            kind: TaskKind::Update,
            ..self.clone()
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn spreadsheet_id(&self) -> Option<&str> {
        self.spreadsheet_id.as_deref()
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn event(&self) -> &EventView {
        &self.event
    }

    pub fn rows(&self) -> &[RegistrationView] {
        &self.rows
    }

    pub fn update_type(&self) -> UpdateType {
        self.update_type
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Check the snapshot before any backend call.
    ///
    /// Returns the reason on failure. Rejects a blank event title, rows with an
    /// empty id, duplicate row ids and rows that belong to another event.
    pub fn validate(&self) -> Result<(), String> {
        if self.event.title.trim().is_empty() {
            return Err("event title is empty".to_string());
        }

        let mut seen = HashSet::with_capacity(self.rows.len());
        for row in self.rows.iter() {
            if row.id.trim().is_empty() {
                return Err("registration with empty id".to_string());
            }
            if row.event_id != self.event_id {
                return Err(format!(
                    "registration {} belongs to event {}",
                    row.id, row.event_id
                ));
            }
            if !seen.insert(row.id.as_str()) {
                return Err(format!("duplicate registration id {}", row.id));
            }
        }
        Ok(())
    }
}

/// Outcome of executing (or skipping) one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub event_id: EventId,
    pub update_type: UpdateType,
    pub kind: TaskKind,
    pub success: bool,
    pub attempts: u32,
    pub error: Option<SyncFailure>,
    /// Set when a create succeeded.
    pub sheet: Option<SheetHandle>,
    /// The task was dropped at dispatch without contacting the backend.
    pub skipped: bool,
}

impl TaskResult {
    pub fn succeeded(task: &SyncTask, attempts: u32, sheet: Option<SheetHandle>) -> Self {
        Self {
            task_id: task.task_id,
            event_id: task.event_id.clone(),
            update_type: task.update_type,
            kind: task.kind,
            success: true,
            attempts,
            error: None,
            sheet,
            skipped: false,
        }
    }

    pub fn failed(task: &SyncTask, attempts: u32, failure: SyncFailure) -> Self {
        Self {
            task_id: task.task_id,
            event_id: task.event_id.clone(),
            update_type: task.update_type,
            kind: task.kind,
            success: false,
            attempts,
            error: Some(failure),
            sheet: None,
            skipped: false,
        }
    }

    pub fn skipped(task: &SyncTask, reason: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::failed(task, 0, SyncFailure::Skipped(reason.into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> (EventView, Vec<RegistrationView>) {
        let event = EventView::new("evt-1", "Robotics Workshop");
        let rows = vec![
            RegistrationView::new("reg-1", "evt-1", "Asha", "asha@campus.edu"),
            RegistrationView::new("reg-2", "evt-1", "Ravi", "ravi@campus.edu"),
        ];
        (event, rows)
    }

    #[test]
    fn update_type_round_trips_through_str() {
        for ty in [
            UpdateType::Registration,
            UpdateType::Attendance,
            UpdateType::Payment,
            UpdateType::Manual,
        ] {
            assert_eq!(ty.as_str().parse::<UpdateType>().unwrap(), ty);
        }
        assert_eq!(" Payment ".parse::<UpdateType>().unwrap(), UpdateType::Payment);
        assert!("refund".parse::<UpdateType>().is_err());
    }

    #[test]
    fn update_type_serializes_lowercase() {
        let json = serde_json::to_string(&UpdateType::Attendance).unwrap();
        assert_eq!(json, "\"attendance\"");
    }

    #[test]
    fn valid_snapshot_passes() {
        let (event, rows) = snapshot();
        let task = SyncTask::create(event, rows, UpdateType::Registration, Utc::now());
        assert!(task.validate().is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        let (mut event, rows) = snapshot();
        event.title = "   ".to_string();
        let task = SyncTask::create(event, rows, UpdateType::Registration, Utc::now());
        assert_eq!(task.validate().unwrap_err(), "event title is empty");
    }

    #[test]
    fn duplicate_and_foreign_rows_are_rejected() {
        let (event, mut rows) = snapshot();
        rows.push(rows[0].clone());
        let task = SyncTask::update(
            Some("sheet-1".into()),
            event.clone(),
            rows,
            UpdateType::Registration,
            Utc::now(),
        );
        assert_eq!(task.validate().unwrap_err(), "duplicate registration id reg-1");

        let foreign = vec![RegistrationView::new("reg-9", "evt-2", "Kai", "kai@campus.edu")];
        let task = SyncTask::update(None, event, foreign, UpdateType::Manual, Utc::now());
        assert!(task.validate().unwrap_err().contains("belongs to event evt-2"));
    }

    #[test]
    fn bound_to_keeps_snapshot_and_identity() {
        let (event, rows) = snapshot();
        let task = SyncTask::update(None, event, rows, UpdateType::Attendance, Utc::now());
        let bound = task.bound_to("sheet-7");

        assert_eq!(bound.task_id(), task.task_id());
        assert_eq!(bound.spreadsheet_id(), Some("sheet-7"));
        assert_eq!(bound.kind(), TaskKind::Update);
        assert_eq!(bound.rows().len(), 2);
        assert_eq!(task.spreadsheet_id(), None);
    }

    #[test]
    fn registration_defaults_fill_missing_fields() {
        let json = r#"{"id":"reg-1","event_id":"evt-1","name":"Asha","email":"a@c.edu"}"#;
        let row: RegistrationView = serde_json::from_str(json).unwrap();
        assert!(!row.attended);
        assert_eq!(row.payment_status, PaymentStatus::NotRequired);
    }

    #[test]
    fn skipped_result_is_not_a_success() {
        let (event, rows) = snapshot();
        let task = SyncTask::create(event, rows, UpdateType::Manual, Utc::now());
        let result = TaskResult::skipped(&task, "auto-sync disabled");

        assert!(result.skipped);
        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(
            result.error,
            Some(SyncFailure::Skipped("auto-sync disabled".to_string()))
        );
    }
}
