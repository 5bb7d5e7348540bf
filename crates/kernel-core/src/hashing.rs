// kernel-core/src/hashing.rs
// ============================================================================
// Module: Kernel Audit Hashing
// Description: SHA-256 tamper-evidence hashing for audit events.
// Purpose: Provide a stable, deterministic hash over the audit envelope's
// five hashed fields.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Audit events carry a `hash` field so downstream consumers can detect
//! tampering after the fact. The hash is computed over a fixed, pipe-joined
//! projection of the envelope (`timestamp|run_id|node_id|actor_id|event`),
//! not over the full canonical JSON document, per the wire contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Audit Hash
// ============================================================================

/// Computes the audit event hash over its five hashed fields.
///
/// The fields are joined with `|` in the order `timestamp`, `run_id`,
/// `node_id`, `actor_id`, `event` and hashed with SHA-256, rendered as
/// lowercase hex. Two events with identical field values produce an
/// identical hash; changing any of the five changes it.
#[must_use]
pub fn audit_hash(timestamp: &str, run_id: &str, node_id: &str, actor_id: &str, event: &str) -> String {
    let joined = format!("{timestamp}|{run_id}|{node_id}|{actor_id}|{event}");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
