// kernel-providers/src/wire.rs
// ============================================================================
// Module: Provider Wire Normalization
// Description: Wire-normalized counterparts of InferenceRequest/Response.
// Purpose: Give providers a stable request/response shape that also carries
// tenant context, independent of the kernel's own data model evolution.
// Dependencies: serde, kernel-core
// ============================================================================

//! ## Overview
//! `ProviderRequest` is produced by the `PRE_PROCESSING` phase from an
//! `InferenceRequest` plus its `TenantContext`; `ProviderResponse` is
//! consumed by `POST_PROCESSING` to build the final `InferenceResponse`.

use kernel_core::FinishReason;
use kernel_core::InferenceParams;
use kernel_core::Message;
use kernel_core::ModelId;
use kernel_core::RequestId;
use kernel_core::TenantContext;
use kernel_core::TokenUsage;
use serde::Deserialize;
use serde::Serialize;

/// Wire-normalized counterpart of [`kernel_core::InferenceRequest`], plus
/// tenant context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Originating request identifier.
    pub request_id: RequestId,
    /// Target model identifier.
    pub model_id: ModelId,
    /// Conversation history.
    pub messages: Vec<Message>,
    /// Recognized and passthrough parameters.
    pub params: InferenceParams,
    /// Whether a streamed response was requested.
    pub streaming: bool,
    /// Tenant on whose behalf this call is made.
    pub tenant: TenantContext,
}

/// Provider-side response, normalized into [`kernel_core::InferenceResponse`]
/// by the `POST_PROCESSING` phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Identifier of the provider that produced this response.
    pub provider_id: String,
    /// Response content.
    pub content: String,
    /// Model identifier echoed from the provider.
    pub model_id: ModelId,
    /// Token accounting.
    pub tokens_used: TokenUsage,
    /// Reason the inference terminated.
    pub finish_reason: FinishReason,
}
