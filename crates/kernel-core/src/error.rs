// kernel-core/src/error.rs
// ============================================================================
// Module: Kernel Error Taxonomy
// Description: Closed error-kind taxonomy and the wire-facing error envelope.
// Purpose: Give every failure a stable kind, a retryability default, and a
// serializable surface form.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Every fallible operation in the kernel eventually resolves to one of the
//! seven [`ErrorKind`] values. Crate-local error enums stay specific
//! (`PipelineError`, `ProviderError`, ...) for `?`-based propagation, but
//! implement [`ToErrorEnvelope`] so the orchestrator and the outermost
//! caller can always materialize the wire-facing [`ErrorEnvelope`] without
//! re-deriving retryability or suggested action by hand.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::time::Timestamp;

// ============================================================================
// SECTION: Error Kind
// ============================================================================

/// Closed taxonomy of kernel failure kinds.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request shape, schema, or parameter range violations.
    Validation,
    /// Authorization failures (missing/invalid credentials, model not
    /// entitled to the tenant).
    Authorization,
    /// Quota or concurrency-limit failures (rate limit, max concurrency).
    Quota,
    /// Model or format resolution failures (not found, corrupt, unsupported).
    ModelFormat,
    /// Device or runtime failures (OOM, init failure, driver error).
    DeviceRuntime,
    /// Provider-side failures (unreachable, invalid response, rate limit).
    Provider,
    /// Network or stream transport failures.
    NetworkStream,
    /// Internal kernel failures (serialization, cache, unexpected).
    Internal,
}

impl ErrorKind {
    /// Returns the default retryability for this kind, per the kernel's
    /// error taxonomy.
    #[must_use]
    pub const fn retryable_default(self) -> bool {
        match self {
            Self::Validation | Self::Authorization | Self::ModelFormat => false,
            Self::Quota | Self::DeviceRuntime | Self::Provider | Self::NetworkStream | Self::Internal => {
                true
            }
        }
    }
}

// ============================================================================
// SECTION: Suggested Action
// ============================================================================

/// Suggested next action carried by an error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the same candidate.
    Retry,
    /// Fall back to the next candidate.
    Fallback,
    /// Escalate to an operator or higher-tier policy.
    Escalate,
    /// Requires human review before proceeding.
    HumanReview,
}

// ============================================================================
// SECTION: Error Envelope
// ============================================================================

/// Wire-facing surface form of any kernel failure.
///
/// # Invariants
/// - `retryable` reflects the classification at the moment the envelope was
///   built, not necessarily `kind.retryable_default()` (a caller may
///   override it, e.g. a quota error that is retryable only because the
///   concurrency slot freed up).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Structured error details.
    pub details: Value,
    /// Whether the caller should retry.
    pub retryable: bool,
    /// Node (runner/provider) that originated the error, if known.
    pub origin_node: Option<String>,
    /// Execution/run identifier that originated the error, if known.
    pub origin_run_id: Option<String>,
    /// Attempt number at which this error occurred.
    pub attempt: u32,
    /// Maximum attempts configured for this operation.
    pub max_attempts: u32,
    /// Timestamp the error was recorded.
    pub timestamp: Timestamp,
    /// Suggested next action.
    pub suggested_action: SuggestedAction,
    /// Opaque provenance reference (e.g. an audit event id).
    pub provenance_ref: Option<String>,
}

/// Converts a crate-local error into the wire-facing [`ErrorEnvelope`].
pub trait ToErrorEnvelope {
    /// Builds an [`ErrorEnvelope`] for this error at the given `timestamp`
    /// and attempt counters.
    fn to_error_envelope(&self, timestamp: Timestamp, attempt: u32, max_attempts: u32) -> ErrorEnvelope;
}
