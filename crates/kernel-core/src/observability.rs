// kernel-core/src/observability.rs
// ============================================================================
// Module: Kernel Observability
// Description: Dependency-light metrics/event hook for kernel components.
// Purpose: Provide counters and latency observations without hard deps on
// any particular metrics backend.
// Dependencies: crate::{identifiers, pipeline}
// ============================================================================

//! ## Overview
//! This module exposes a thin observer interface for pipeline phase
//! outcomes and provider call latencies. It is intentionally dependency-
//! light so downstream deployments can plug in Prometheus or
//! OpenTelemetry without redesign.

use std::time::Duration;

use crate::identifiers::ExecutionId;
use crate::identifiers::ProviderId;
use crate::pipeline::Phase;

/// Outcome classification for a completed phase or provider call.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Successful completion.
    Ok,
    /// Failed completion.
    Error,
}

impl Outcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// A single phase-completion event passed to [`KernelObserver`].
#[derive(Debug, Clone)]
pub struct PhaseEvent {
    /// Execution this event belongs to.
    pub execution_id: ExecutionId,
    /// Phase that completed.
    pub phase: Phase,
    /// Outcome of the phase.
    pub outcome: Outcome,
    /// Normalized error kind label, when the outcome was an error.
    pub error_kind: Option<&'static str>,
}

/// A single provider-call event passed to [`KernelObserver`].
#[derive(Debug, Clone)]
pub struct ProviderCallEvent {
    /// Execution this event belongs to.
    pub execution_id: ExecutionId,
    /// Provider invoked.
    pub provider_id: ProviderId,
    /// Outcome of the call.
    pub outcome: Outcome,
    /// Attempt number for this provider within the execution.
    pub attempt: u32,
}

/// Observability sink for kernel phase and provider events.
pub trait KernelObserver: Send + Sync {
    /// Records a phase-completion event.
    fn record_phase(&self, event: PhaseEvent);

    /// Records a phase latency observation.
    fn record_phase_latency(&self, event: PhaseEvent, latency: Duration);

    /// Records a provider-call event.
    fn record_provider_call(&self, event: ProviderCallEvent);

    /// Records a provider-call latency observation.
    fn record_provider_latency(&self, event: ProviderCallEvent, latency: Duration);
}

/// No-op observer.
///
/// # Invariants
/// - Events are intentionally discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl KernelObserver for NoopObserver {
    fn record_phase(&self, _event: PhaseEvent) {}

    fn record_phase_latency(&self, _event: PhaseEvent, _latency: Duration) {}

    fn record_provider_call(&self, _event: ProviderCallEvent) {}

    fn record_provider_latency(&self, _event: ProviderCallEvent, _latency: Duration) {}
}
