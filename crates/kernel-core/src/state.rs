// kernel-core/src/state.rs
// ============================================================================
// Module: Kernel Execution State Machine
// Description: Deterministic (state, signal) -> state transition table.
// Purpose: Advance an execution through its lifecycle and reject illegal
// transitions.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The execution state machine is a closed, nine-state system driven by
//! thirteen signals. `transition` is a pure function: given the current
//! state and an incoming signal it returns the next state, or rejects the
//! pair as an illegal transition. The table here is authoritative; nothing
//! else in the kernel is allowed to special-case a transition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Execution State
// ============================================================================

/// Lifecycle state of a single kernel execution.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Built, not started.
    Created,
    /// Phases advancing.
    Running,
    /// Suspended on an external signal.
    Waiting,
    /// Paused by policy.
    Suspended,
    /// In backoff before a retry.
    Retrying,
    /// Terminal success.
    Completed,
    /// Terminal failure.
    Failed,
    /// Rollback finished.
    Compensated,
    /// Explicit cancellation.
    Cancelled,
}

impl ExecutionState {
    /// Returns true when the state is terminal (no further transitions are
    /// meaningful).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true when the state represents an error outcome.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Failed)
    }
}

// ============================================================================
// SECTION: Signals
// ============================================================================

/// Signal driving a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Begin execution.
    Start,
    /// A phase completed successfully.
    PhaseSuccess,
    /// A phase failed.
    PhaseFailure,
    /// The whole execution completed successfully.
    ExecutionSuccess,
    /// The whole execution failed.
    ExecutionFailure,
    /// Retry budget exhausted.
    RetryExhausted,
    /// Execution must wait on an external signal.
    WaitRequested,
    /// A pending wait was approved.
    Approved,
    /// A pending wait was rejected.
    Rejected,
    /// Begin compensation (rollback).
    Compensate,
    /// Compensation finished.
    CompensationDone,
    /// Explicit cancellation requested.
    Cancel,
    /// Resume from a suspended or waiting state.
    Resume,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Raised when a `(state, signal)` pair has no legal transition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal state transition: {from:?} does not accept {signal:?}")]
pub struct IllegalStateTransition {
    /// State the transition was attempted from.
    pub from: ExecutionState,
    /// Signal that was rejected.
    pub signal: Signal,
}

// ============================================================================
// SECTION: Transition Function
// ============================================================================

/// Computes the next state for a `(state, signal)` pair.
///
/// This is the single authoritative implementation of the transition table
/// in the kernel's execution state machine; terminal states accept no
/// signal and every other state either advances, stays put on a no-op
/// signal, or rejects the signal outright.
///
/// # Errors
///
/// Returns [`IllegalStateTransition`] when `signal` has no legal effect from
/// `state`.
pub const fn transition(
    state: ExecutionState,
    signal: Signal,
) -> Result<ExecutionState, IllegalStateTransition> {
    use ExecutionState::{
        Cancelled, Compensated, Completed, Created, Failed, Retrying, Running, Suspended, Waiting,
    };
    use Signal::{
        Approved, Cancel, Compensate, CompensationDone, ExecutionFailure, ExecutionSuccess,
        PhaseFailure, RetryExhausted, Rejected, Resume, Start, WaitRequested,
    };

    match (state, signal) {
        // CREATED
        (Created, Start) => Ok(Running),
        (Created, Cancel) => Ok(Cancelled),
        (Created, _) => Ok(Created),

        // RUNNING
        (Running, ExecutionSuccess) => Ok(Completed),
        (Running, PhaseFailure | ExecutionFailure) => Ok(Retrying),
        (Running, WaitRequested) => Ok(Waiting),
        (Running, Compensate) => Ok(Compensated),
        (Running, Cancel) => Ok(Cancelled),
        (Running, _) => Ok(Running),

        // RETRYING
        (Retrying, Start | Resume) => Ok(Running),
        (Retrying, RetryExhausted) => Ok(Failed),
        (Retrying, Cancel) => Ok(Cancelled),
        (Retrying, _) => Err(IllegalStateTransition {
            from: Retrying,
            signal,
        }),

        // WAITING
        (Waiting, Approved | Resume) => Ok(Running),
        (Waiting, Rejected) => Ok(Failed),
        (Waiting, Cancel) => Ok(Cancelled),
        (Waiting, _) => Err(IllegalStateTransition {
            from: Waiting,
            signal,
        }),

        // SUSPENDED
        (Suspended, Resume) => Ok(Running),
        (Suspended, Cancel) => Ok(Cancelled),
        (Suspended, _) => Err(IllegalStateTransition {
            from: Suspended,
            signal,
        }),

        // COMPENSATED
        (Compensated, CompensationDone) => Ok(Completed),
        (Compensated, _) => Err(IllegalStateTransition {
            from: Compensated,
            signal,
        }),

        // Terminal states: any signal is a no-op.
        (Completed | Failed | Cancelled, _) => Ok(state),
    }
}

/// Returns true when `signal` legally transitions `state`.
#[must_use]
pub const fn can_transition_to(state: ExecutionState, signal: Signal) -> bool {
    transition(state, signal).is_ok()
}

#[cfg(test)]
mod tests {
    use super::ExecutionState::{
        Cancelled, Compensated, Completed, Created, Failed, Retrying, Running, Suspended, Waiting,
    };
    use super::Signal::{
        Approved, Cancel, Compensate, CompensationDone, ExecutionFailure, ExecutionSuccess,
        PhaseFailure, RetryExhausted, Rejected, Resume, Start, WaitRequested,
    };
    use super::transition;

    #[test]
    fn created_transitions() {
        assert_eq!(transition(Created, Start), Ok(Running));
        assert_eq!(transition(Created, Cancel), Ok(Cancelled));
        assert_eq!(transition(Created, Resume), Ok(Created));
    }

    #[test]
    fn running_transitions() {
        assert_eq!(transition(Running, ExecutionSuccess), Ok(Completed));
        assert_eq!(transition(Running, PhaseFailure), Ok(Retrying));
        assert_eq!(transition(Running, ExecutionFailure), Ok(Retrying));
        assert_eq!(transition(Running, WaitRequested), Ok(Waiting));
        assert_eq!(transition(Running, Compensate), Ok(Compensated));
        assert_eq!(transition(Running, Cancel), Ok(Cancelled));
    }

    #[test]
    fn retrying_transitions() {
        assert_eq!(transition(Retrying, Start), Ok(Running));
        assert_eq!(transition(Retrying, Resume), Ok(Running));
        assert_eq!(transition(Retrying, RetryExhausted), Ok(Failed));
        assert_eq!(transition(Retrying, Cancel), Ok(Cancelled));
        assert!(transition(Retrying, WaitRequested).is_err());
    }

    #[test]
    fn waiting_transitions() {
        assert_eq!(transition(Waiting, Approved), Ok(Running));
        assert_eq!(transition(Waiting, Resume), Ok(Running));
        assert_eq!(transition(Waiting, Rejected), Ok(Failed));
        assert_eq!(transition(Waiting, Cancel), Ok(Cancelled));
        assert!(transition(Waiting, ExecutionSuccess).is_err());
    }

    #[test]
    fn suspended_transitions() {
        assert_eq!(transition(Suspended, Resume), Ok(Running));
        assert_eq!(transition(Suspended, Cancel), Ok(Cancelled));
        assert!(transition(Suspended, Start).is_err());
    }

    #[test]
    fn compensated_transitions() {
        assert_eq!(transition(Compensated, CompensationDone), Ok(Completed));
        assert!(transition(Compensated, Start).is_err());
    }

    #[test]
    fn terminal_states_absorb_every_signal() {
        for terminal in [Completed, Failed, Cancelled] {
            for signal in [
                Start,
                PhaseFailure,
                ExecutionSuccess,
                ExecutionFailure,
                RetryExhausted,
                WaitRequested,
                Approved,
                Rejected,
                Compensate,
                CompensationDone,
                Cancel,
                Resume,
            ] {
                assert_eq!(transition(terminal, signal), Ok(terminal));
            }
        }
    }
}
