// kernel-broker/src/error.rs
// ============================================================================
// Module: Broker Error Taxonomy
// Description: Failures raised while ranking or dispatching across
// candidate runners.
// Dependencies: thiserror, kernel-core
// ============================================================================

use kernel_core::ErrorEnvelope;
use kernel_core::ErrorKind;
use kernel_core::SuggestedAction;
use kernel_core::Timestamp;
use kernel_core::ToErrorEnvelope;
use thiserror::Error;

/// Failures raised while ranking or dispatching across candidate runners.
#[derive(Debug, Error, Clone)]
pub enum BrokerError {
    /// Every candidate failed the selection policy's hard filters.
    #[error("no compatible runner available for model {model_id}")]
    NoCompatibleProviderAvailable {
        /// Requested model identifier.
        model_id: String,
    },
    /// Every ranked candidate was attempted and failed.
    #[error("all runners failed for model {model_id}: {last_error}")]
    AllRunnersFailed {
        /// Requested model identifier.
        model_id: String,
        /// Message from the last candidate attempted.
        last_error: String,
    },
    /// A candidate failed with a non-retryable error, surfaced immediately
    /// without trying the remaining candidates.
    #[error("non-retryable dispatch failure: {message}")]
    NonRetryable {
        /// Human-readable detail from the failing candidate.
        message: String,
    },
}

impl ToErrorEnvelope for BrokerError {
    fn to_error_envelope(&self, timestamp: Timestamp, attempt: u32, max_attempts: u32) -> ErrorEnvelope {
        let (kind, suggested_action, retryable) = match self {
            Self::NoCompatibleProviderAvailable { .. } => (ErrorKind::ModelFormat, SuggestedAction::Escalate, false),
            Self::AllRunnersFailed { .. } => (ErrorKind::Provider, SuggestedAction::Escalate, false),
            Self::NonRetryable { .. } => (ErrorKind::Provider, SuggestedAction::HumanReview, false),
        };
        ErrorEnvelope {
            kind,
            message: self.to_string(),
            details: serde_json::Value::Null,
            retryable,
            origin_node: None,
            origin_run_id: None,
            attempt,
            max_attempts,
            timestamp,
            suggested_action,
            provenance_ref: None,
        }
    }
}
