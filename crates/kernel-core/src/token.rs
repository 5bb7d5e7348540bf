// kernel-core/src/token.rs
// ============================================================================
// Module: Execution Token & Context
// Description: Immutable execution snapshots published through a mutex-
// guarded atomic cell, and the mutable envelope phases operate against.
// Purpose: Let every phase and observer read a consistent view of "where
// this execution currently is" without taking a lock across an await point.
// Dependencies: serde, serde_json, std::sync, crate::{error, identifiers,
// pipeline, state, tenant, time}
// ============================================================================

//! ## Overview
//! [`ExecutionToken`] is an immutable, cheaply-cloned snapshot of an
//! execution's current state, phase, and per-request scratch data.
//! [`ExecutionContext`] is the mutable envelope phases operate against: it
//! owns the authoritative token behind a `Mutex<Arc<ExecutionToken>>`,
//! carries the [`crate::tenant::TenantContext`] for the execution, and an
//! error slot set when a phase fails. Readers clone the `Arc` out from
//! under a short-held lock and never hold the lock across an `.await`, per
//! the kernel's concurrency discipline; writers publish a new token
//! wholesale rather than mutating the old one in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorEnvelope;
use crate::identifiers::ExecutionId;
use crate::identifiers::RequestId;
use crate::pipeline::Phase;
use crate::state::ExecutionState;
use crate::state::IllegalStateTransition;
use crate::state::Signal;
use crate::state::transition;
use crate::tenant::TenantContext;
use crate::time::Clock;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Execution Token
// ============================================================================

/// Immutable snapshot of a single execution's lifecycle position.
///
/// # Invariants
/// - Once constructed, a token's fields never change; advancing an
///   execution produces a new token rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionToken {
    /// Execution identifier, stable across the execution's lifetime.
    pub execution_id: ExecutionId,
    /// Originating request identifier.
    pub request_id: RequestId,
    /// Current lifecycle state.
    pub state: ExecutionState,
    /// Phase currently executing, or `None` before the pipeline starts.
    pub current_phase: Option<Phase>,
    /// Number of phase attempts made so far.
    pub attempt: u32,
    /// Timestamp the token was created.
    pub created_at: Timestamp,
    /// Timestamp this snapshot was published.
    pub updated_at: Timestamp,
    /// Per-request mutable scratch, passed phase-to-phase.
    pub variables: BTreeMap<String, Value>,
    /// Metadata that survives to observability emitters.
    pub metadata: BTreeMap<String, Value>,
}

impl ExecutionToken {
    /// Builds the initial token for a new execution, in
    /// [`ExecutionState::Created`] with no current phase.
    #[must_use]
    pub fn new(
        execution_id: impl Into<ExecutionId>,
        request_id: impl Into<RequestId>,
        now: Timestamp,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            request_id: request_id.into(),
            state: ExecutionState::Created,
            current_phase: None,
            attempt: 0,
            created_at: now,
            updated_at: now,
            variables: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Returns a new token with `signal` applied to this token's state, the
    /// attempt counter incremented on a phase- or execution-failure signal,
    /// and `updated_at` set to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalStateTransition`] when `signal` has no legal effect
    /// from this token's current state.
    pub fn advance(&self, signal: Signal, now: Timestamp) -> Result<Self, IllegalStateTransition> {
        let next_state = transition(self.state, signal)?;
        let attempt = if matches!(signal, Signal::PhaseFailure | Signal::ExecutionFailure) {
            self.attempt + 1
        } else {
            self.attempt
        };
        Ok(Self {
            state: next_state,
            attempt,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Returns a new token with `phase` as the current phase and
    /// `updated_at` set to `now`, state unchanged.
    #[must_use]
    pub fn enter_phase(&self, phase: Phase, now: Timestamp) -> Self {
        Self {
            current_phase: Some(phase),
            updated_at: now,
            ..self.clone()
        }
    }
}

// ============================================================================
// SECTION: Execution Context
// ============================================================================

/// Mutable envelope around an [`ExecutionToken`] that phases operate
/// against.
///
/// Exposes the tenant context, the latest token snapshot, and an optional
/// error slot. The token itself is published through a short-held lock and
/// never held across an `.await`.
pub struct ExecutionContext {
    current: Mutex<Arc<ExecutionToken>>,
    /// Tenant on whose behalf this execution runs.
    pub tenant: TenantContext,
    error_slot: Mutex<Option<ErrorEnvelope>>,
}

impl ExecutionContext {
    /// Creates a context seeded with `token` and `tenant`.
    #[must_use]
    pub fn new(token: ExecutionToken, tenant: TenantContext) -> Self {
        Self {
            current: Mutex::new(Arc::new(token)),
            tenant,
            error_slot: Mutex::new(None),
        }
    }

    /// Returns the current token snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned, which only happens if a
    /// prior holder panicked while holding the lock.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ExecutionToken> {
        Arc::clone(&self.current.lock().expect("execution context mutex poisoned"))
    }

    /// Publishes `token` as the new current snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned, which only happens if a
    /// prior holder panicked while holding the lock.
    pub fn publish(&self, token: ExecutionToken) {
        *self.current.lock().expect("execution context mutex poisoned") = Arc::new(token);
    }

    /// Advances the current token with `signal` using `clock` for the
    /// publish timestamp, publishing and returning the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalStateTransition`] when `signal` has no legal effect
    /// from the current token's state.
    pub fn advance(
        &self,
        signal: Signal,
        clock: &dyn Clock,
    ) -> Result<Arc<ExecutionToken>, IllegalStateTransition> {
        let now = clock.now();
        let next = self.snapshot().advance(signal, now)?;
        self.publish(next.clone());
        Ok(Arc::new(next))
    }

    /// Publishes a token with `phase` as the current phase.
    pub fn enter_phase(&self, phase: Phase, clock: &dyn Clock) {
        let next = self.snapshot().enter_phase(phase, clock.now());
        self.publish(next);
    }

    /// Sets the error slot, per spec's `ctx.setError`. Does not itself
    /// signal the state machine; the pipeline driver does that.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_error(&self, error: ErrorEnvelope) {
        *self.error_slot.lock().expect("error slot mutex poisoned") = Some(error);
    }

    /// Returns the current error slot contents, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn error(&self) -> Option<ErrorEnvelope> {
        self.error_slot.lock().expect("error slot mutex poisoned").clone()
    }

    /// Returns true when the error slot has been set.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error_slot.lock().expect("error slot mutex poisoned").is_some()
    }
}
