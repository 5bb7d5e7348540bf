// kernel/src/error.rs
// ============================================================================
// Module: Kernel Facade Error
// Description: Failures raised before or around pipeline execution itself —
// admission rejection and internal wiring faults. Pipeline-phase failures
// surface through `InferenceResponse` instead (see `kernel::Kernel::execute`).
// Dependencies: thiserror, kernel-core
// ============================================================================

use kernel_core::ErrorEnvelope;
use kernel_core::ErrorKind;
use kernel_core::SuggestedAction;
use kernel_core::TenantId;
use kernel_core::Timestamp;
use kernel_core::ToErrorEnvelope;
use thiserror::Error;

/// Failures raised by [`crate::Kernel::execute`] outside the pipeline
/// itself: admission rejection before an execution token even exists, or an
/// internal wiring fault. A failure once a phase has started running is
/// instead reported through the returned `InferenceResponse`'s
/// `finish_reason`.
#[derive(Debug, Error, Clone)]
pub enum KernelError {
    /// The tenant's rate limiter rejected this request before admission.
    #[error("tenant {tenant_id} exceeded its rate limit")]
    RateLimited {
        /// Tenant that was rejected.
        tenant_id: TenantId,
    },
    /// A request-building or variable round-trip failure the kernel
    /// considers a bug rather than a caller error.
    #[error("internal kernel fault: {0}")]
    Internal(String),
}

impl ToErrorEnvelope for KernelError {
    fn to_error_envelope(&self, timestamp: Timestamp, attempt: u32, max_attempts: u32) -> ErrorEnvelope {
        let (kind, suggested_action, retryable) = match self {
            Self::RateLimited { .. } => (ErrorKind::Quota, SuggestedAction::Retry, true),
            Self::Internal(_) => (ErrorKind::Internal, SuggestedAction::Escalate, false),
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
