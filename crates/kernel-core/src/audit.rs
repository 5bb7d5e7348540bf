// kernel-core/src/audit.rs
// ============================================================================
// Module: Audit Events
// Description: Tamper-evident event envelope emitted at phase and execution
// boundaries.
// Purpose: Give operators and compliance tooling a stable, hashable record
// of what the kernel did and why.
// Dependencies: serde, serde_json, crate::{hashing, identifiers, time}
// ============================================================================

//! ## Overview
//! An [`AuditEvent`] is built via [`AuditEvent::new`], which computes its
//! `hash` from the five fields the wire contract hashes
//! (`timestamp|run_id|node_id|actor.id|event`). Nothing downstream may
//! mutate an event after construction without recomputing the hash, so the
//! struct's fields are public for reading but the hash itself is only ever
//! produced by the constructor.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::hashing::audit_hash;
use crate::identifiers::ExecutionId;
use crate::time::Timestamp;

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// Routine lifecycle event.
    Info,
    /// Noteworthy but non-fatal condition.
    Warning,
    /// An error that affected this execution.
    Error,
    /// A condition requiring operator attention.
    Critical,
}

/// Kind of actor that originated an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// The kernel itself.
    System,
    /// A human operator.
    Human,
    /// An upstream caller/tenant.
    Tenant,
    /// A provider or runner.
    Provider,
}

/// Who or what caused an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Kind of actor.
    pub kind: ActorKind,
    /// Actor identifier.
    pub id: String,
    /// Actor's role in this event, if applicable.
    pub role: Option<String>,
}

/// Tamper-evident record of a single kernel event.
///
/// # Invariants
/// - `hash` is always `hashing::audit_hash(timestamp, run_id, node_id,
///   actor.id, event)` for this event's field values; it is recomputed,
///   never copied, whenever those fields are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: Timestamp,
    /// Execution this event belongs to.
    pub run_id: ExecutionId,
    /// Node (phase, runner, or provider identifier) that emitted the event.
    pub node_id: String,
    /// Actor that caused the event.
    pub actor: Actor,
    /// Short event name, e.g. `phase.success`.
    pub event: String,
    /// Event severity.
    pub level: AuditLevel,
    /// Free-form tags for filtering.
    pub tags: Vec<String>,
    /// Structured event metadata.
    pub metadata: BTreeMap<String, Value>,
    /// Optional snapshot of execution context at the time of the event.
    pub context_snapshot: Option<Value>,
    /// Tamper-evidence hash over the five hashed fields.
    pub hash: String,
}

impl AuditEvent {
    /// Builds an audit event, computing its tamper-evidence hash.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "mirrors the wire envelope's fixed field set")]
    pub fn new(
        timestamp: Timestamp,
        run_id: impl Into<ExecutionId>,
        node_id: impl Into<String>,
        actor: Actor,
        event: impl Into<String>,
        level: AuditLevel,
    ) -> Self {
        let run_id = run_id.into();
        let node_id = node_id.into();
        let event = event.into();
        let timestamp_text = timestamp.to_rfc3339().unwrap_or_default();
        let hash = audit_hash(&timestamp_text, run_id.as_str(), &node_id, &actor.id, &event);
        Self {
            timestamp,
            run_id,
            node_id,
            actor,
            event,
            level,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            context_snapshot: None,
            hash,
        }
    }

    /// Returns true when `hash` matches the hash computed from this event's
    /// current field values, i.e. the event has not been tampered with.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        let timestamp_text = self.timestamp.to_rfc3339().unwrap_or_default();
        let recomputed = audit_hash(&timestamp_text, self.run_id.as_str(), &self.node_id, &self.actor.id, &self.event);
        recomputed == self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::Actor;
    use super::ActorKind;
    use super::AuditEvent;
    use super::AuditLevel;
    use crate::time::Timestamp;
    use time::macros::datetime;

    #[test]
    fn newly_built_event_is_intact() {
        let event = AuditEvent::new(
            Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
            "exec-1",
            "pipeline",
            Actor {
                kind: ActorKind::System,
                id: "kernel".to_owned(),
                role: None,
            },
            "phase.success",
            AuditLevel::Info,
        );
        assert!(event.is_intact());
    }

    #[test]
    fn tampering_with_event_field_breaks_the_hash() {
        let mut event = AuditEvent::new(
            Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
            "exec-1",
            "pipeline",
            Actor {
                kind: ActorKind::System,
                id: "kernel".to_owned(),
                role: None,
            },
            "phase.success",
            AuditLevel::Info,
        );
        event.event = "phase.failure".to_owned();
        assert!(!event.is_intact());
    }
}
