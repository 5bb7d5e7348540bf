// kernel/src/audit_sink.rs
// ============================================================================
// Module: Audit Sink
// Description: Pluggable destination for AUDIT-phase events.
// Purpose: Let the AUDIT phase emit a tamper-evident record without the
// kernel depending on a specific persistence backend.
// Dependencies: async-trait, kernel-core
// ============================================================================

//! ## Overview
//! Persistence of audit events is out of scope for the kernel itself;
//! `AuditSink` gives a downstream deployment a single seam to wire one in.
//! Mirrors [`kernel_core::KernelObserver`]'s no-op-default shape.

use async_trait::async_trait;
use kernel_core::AuditEvent;

/// Destination for audit events emitted by the AUDIT phase.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records `event`. Implementations must not let a recording failure
    /// propagate back into the pipeline; the AUDIT phase runs best-effort.
    async fn record(&self, event: AuditEvent);
}

/// Discards every event. The default sink until a caller wires in a real
/// one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _event: AuditEvent) {}
}
