//! Per-event sync state machine using rust-fsm.
//!
//! ## Transitions
//!
//! ```text
//! Disabled        EnableWithoutSheet ─► AwaitingCreate
//!                 EnableWithSheet    ─► Synced
//! AwaitingCreate  CreateSucceeded    ─► Synced
//!                 CreateExhausted    ─► Failing
//! Synced          UpdateSucceeded    ─► Synced
//!                 UpdateExhausted    ─► Failing
//! Failing         any success        ─► Synced
//! (any)           Disable            ─► Disabled
//! ```
//!
//! The machine is not stored anywhere. The current phase is derived from the
//! persisted [`SyncState`](crate::SyncState) and each outcome is checked
//! against the transition table before the coordinator persists it.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

use crate::types::TaskKind;

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub sync_machine(AwaitingCreate)

    Disabled => {
        EnableWithoutSheet => AwaitingCreate,
        EnableWithSheet => Synced,
        Disable => Disabled
    },
    AwaitingCreate => {
        CreateSucceeded => Synced,
        CreateExhausted => Failing,
        // Re-enabling while a create is queued keeps waiting on it
        EnableWithoutSheet => AwaitingCreate,
        Disable => Disabled
    },
    Synced => {
        UpdateSucceeded => Synced,
        UpdateExhausted => Failing,
        EnableWithSheet => Synced,
        Disable => Disabled
    },
    Failing => {
        CreateSucceeded => Synced,
        UpdateSucceeded => Synced,
        CreateExhausted => Failing,
        UpdateExhausted => Failing,
        EnableWithoutSheet => AwaitingCreate,
        EnableWithSheet => Synced,
        Disable => Disabled
    }
}

pub use sync_machine::Input as SyncMachineInput;
pub use sync_machine::State as SyncMachineState;
pub use sync_machine::StateMachine as SyncMachine;

/// Externally visible sync phase of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Auto-sync is off.
    Disabled,
    /// Auto-sync is on but no spreadsheet exists yet.
    AwaitingCreate,
    /// The last attempt succeeded.
    Synced,
    /// The last attempt exhausted its retries.
    Failing,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Disabled => "disabled",
            SyncPhase::AwaitingCreate => "awaiting_create",
            SyncPhase::Synced => "synced",
            SyncPhase::Failing => "failing",
        }
    }
}

impl From<&SyncMachineState> for SyncPhase {
    fn from(state: &SyncMachineState) -> Self {
        match state {
            SyncMachineState::Disabled => SyncPhase::Disabled,
            SyncMachineState::AwaitingCreate => SyncPhase::AwaitingCreate,
            SyncMachineState::Synced => SyncPhase::Synced,
            SyncMachineState::Failing => SyncPhase::Failing,
        }
    }
}

impl From<SyncPhase> for SyncMachineState {
    fn from(phase: SyncPhase) -> Self {
        match phase {
            SyncPhase::Disabled => SyncMachineState::Disabled,
            SyncPhase::AwaitingCreate => SyncMachineState::AwaitingCreate,
            SyncPhase::Synced => SyncMachineState::Synced,
            SyncPhase::Failing => SyncMachineState::Failing,
        }
    }
}

/// Machine input for a finished task.
pub fn outcome_input(kind: TaskKind, success: bool) -> SyncMachineInput {
    match (kind, success) {
        (TaskKind::Create, true) => SyncMachineInput::CreateSucceeded,
        (TaskKind::Create, false) => SyncMachineInput::CreateExhausted,
        (TaskKind::Update, true) => SyncMachineInput::UpdateSucceeded,
        (TaskKind::Update, false) => SyncMachineInput::UpdateExhausted,
    }
}

/// Machine input for an auto-sync toggle.
pub fn toggle_input(enabled: bool, has_sheet: bool) -> SyncMachineInput {
    match (enabled, has_sheet) {
        (false, _) => SyncMachineInput::Disable,
        (true, true) => SyncMachineInput::EnableWithSheet,
        (true, false) => SyncMachineInput::EnableWithoutSheet,
    }
}

/// Run one input from `from`. Returns `None` when the table has no such edge.
pub fn transition(from: SyncPhase, input: &SyncMachineInput) -> Option<SyncPhase> {
    let mut machine = SyncMachine::from_state(from.into());
    machine.consume(input).ok()?;
    Some(SyncPhase::from(machine.state()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_awaiting_create() {
        let machine = SyncMachine::new();
        assert_eq!(*machine.state(), SyncMachineState::AwaitingCreate);
    }

    #[test]
    fn test_create_success_then_update_failure_then_recovery() {
        let mut machine = SyncMachine::new();

        machine.consume(&SyncMachineInput::CreateSucceeded).unwrap();
        assert_eq!(*machine.state(), SyncMachineState::Synced);

        machine.consume(&SyncMachineInput::UpdateExhausted).unwrap();
        assert_eq!(*machine.state(), SyncMachineState::Failing);

        machine.consume(&SyncMachineInput::UpdateSucceeded).unwrap();
        assert_eq!(*machine.state(), SyncMachineState::Synced);
    }

    #[test]
    fn test_create_exhaustion_goes_to_failing() {
        assert_eq!(
            transition(SyncPhase::AwaitingCreate, &SyncMachineInput::CreateExhausted),
            Some(SyncPhase::Failing)
        );
    }

    #[test]
    fn test_disable_from_every_phase() {
        for phase in [
            SyncPhase::Disabled,
            SyncPhase::AwaitingCreate,
            SyncPhase::Synced,
            SyncPhase::Failing,
        ] {
            assert_eq!(
                transition(phase, &SyncMachineInput::Disable),
                Some(SyncPhase::Disabled)
            );
        }
    }

    #[test]
    fn test_enable_picks_target_by_sheet_presence() {
        assert_eq!(
            transition(SyncPhase::Disabled, &toggle_input(true, false)),
            Some(SyncPhase::AwaitingCreate)
        );
        assert_eq!(
            transition(SyncPhase::Disabled, &toggle_input(true, true)),
            Some(SyncPhase::Synced)
        );
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        // A disabled event never executes tasks
        assert_eq!(
            transition(SyncPhase::Disabled, &SyncMachineInput::UpdateSucceeded),
            None
        );
        // Updates cannot run before the sheet exists
        assert_eq!(
            transition(SyncPhase::AwaitingCreate, &SyncMachineInput::UpdateExhausted),
            None
        );
        // Synced events never create again
        assert_eq!(
            transition(SyncPhase::Synced, &SyncMachineInput::CreateSucceeded),
            None
        );
    }

    #[test]
    fn test_outcome_input_mapping() {
        assert_eq!(
            outcome_input(TaskKind::Create, false),
            SyncMachineInput::CreateExhausted
        );
        assert_eq!(
            outcome_input(TaskKind::Update, true),
            SyncMachineInput::UpdateSucceeded
        );
    }
}
