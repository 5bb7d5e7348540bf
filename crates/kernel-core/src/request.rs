// kernel-core/src/request.rs
// ============================================================================
// Module: Inference Request/Response Data Model
// Description: Normalized request and response shapes accepted and returned
// by the kernel.
// Purpose: Give every phase and provider a single, immutable view of "the
// request" and "the response".
// Dependencies: serde, serde_json, crate::{identifiers, time}
// ============================================================================

//! ## Overview
//! `InferenceRequest` is the kernel's entry point: immutable once built, with
//! invariants enforced by [`InferenceRequest::build`] rather than by the
//! public fields alone (construction is via [`InferenceRequestBuilder`]).
//! `InferenceResponse` is the terminal shape returned for both blocking calls
//! and the folded result of a streaming call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::identifiers::ModelId;
use crate::identifiers::ProviderId;
use crate::identifiers::RequestId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Role of a message within a request's conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Prepends guidance for the whole conversation.
    System,
    /// A turn from the end user.
    User,
    /// A turn from the model.
    Assistant,
    /// Structured result of a function invocation.
    Function,
    /// Structured result of a tool invocation.
    Tool,
}

/// A single message in a request's ordered conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the speaker.
    pub role: Role,
    /// Message content.
    pub content: String,
}

impl Message {
    /// Builds a message with the given role and content.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

// ============================================================================
// SECTION: Inference Parameters
// ============================================================================

/// Recognized inference request parameters, with passthrough for unknown
/// keys.
///
/// # Invariants
/// - Unknown keys are preserved verbatim in `extra` and MAY be interpreted
///   by the provider; the kernel never rejects a request solely for
///   carrying an unrecognized key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Output token cap.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold.
    pub top_p: Option<f64>,
    /// Top-k sampling width.
    pub top_k: Option<u32>,
    /// Repetition penalty.
    pub repeat_penalty: Option<f64>,
    /// Mirostat mode (0, 1, or 2).
    pub mirostat: Option<u8>,
    /// Optional grammar constraint string.
    pub grammar: Option<String>,
    /// Constrain output to JSON.
    pub json_mode: Option<bool>,
    /// Session identifier for KV-cache reuse; passed through with no
    /// cross-provider correctness guarantee.
    pub session_id: Option<String>,
    /// Hard per-call timeout in milliseconds.
    pub inference_timeout_ms: Option<u64>,
    /// Override for the manifest's artifact path.
    pub model_path: Option<String>,
    /// Unrecognized keys, passed through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// SECTION: Inference Request
// ============================================================================

/// Errors raised building an [`InferenceRequest`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InferenceRequestError {
    /// The request identifier was empty.
    #[error("request identifier must not be empty")]
    EmptyRequestId,
    /// The model identifier was empty.
    #[error("model identifier must not be empty")]
    EmptyModelId,
    /// The message list was empty.
    #[error("request must contain at least one message")]
    NoMessages,
}

/// Immutable, normalized inference request.
///
/// # Invariants
/// - `request_id` is non-empty.
/// - `model_id` is non-empty.
/// - `messages` contains at least one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// Target model identifier.
    pub model_id: ModelId,
    /// Ordered conversation history.
    pub messages: Vec<Message>,
    /// Recognized and passthrough parameters.
    pub params: InferenceParams,
    /// Whether the caller wants a streamed response.
    pub streaming: bool,
    /// Optional caller-preferred provider.
    pub preferred_provider: Option<ProviderId>,
    /// Optional overall timeout for the request.
    #[serde(with = "duration_millis_opt")]
    pub timeout: Option<Duration>,
    /// Priority; higher wins ties during selection.
    pub priority: i32,
}

/// Default request priority when not specified.
pub const DEFAULT_PRIORITY: i32 = 5;

impl InferenceRequest {
    /// Returns a builder seeded with the required fields.
    #[must_use]
    pub fn builder(
        request_id: impl Into<RequestId>,
        model_id: impl Into<ModelId>,
        messages: Vec<Message>,
    ) -> InferenceRequestBuilder {
        InferenceRequestBuilder {
            request_id: request_id.into(),
            model_id: model_id.into(),
            messages,
            params: InferenceParams::default(),
            streaming: false,
            preferred_provider: None,
            timeout: None,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Returns a builder pre-populated from this request, for round-trip
    /// `build -> to_builder -> build` equivalence checks.
    #[must_use]
    pub fn to_builder(&self) -> InferenceRequestBuilder {
        InferenceRequestBuilder {
            request_id: self.request_id.clone(),
            model_id: self.model_id.clone(),
            messages: self.messages.clone(),
            params: self.params.clone(),
            streaming: self.streaming,
            preferred_provider: self.preferred_provider.clone(),
            timeout: self.timeout,
            priority: self.priority,
        }
    }
}

/// Builder enforcing [`InferenceRequest`]'s invariants at construction time.
#[derive(Debug, Clone)]
pub struct InferenceRequestBuilder {
    request_id: RequestId,
    model_id: ModelId,
    messages: Vec<Message>,
    params: InferenceParams,
    streaming: bool,
    preferred_provider: Option<ProviderId>,
    timeout: Option<Duration>,
    priority: i32,
}

impl InferenceRequestBuilder {
    /// Sets the recognized/passthrough parameters.
    #[must_use]
    pub fn params(mut self, params: InferenceParams) -> Self {
        self.params = params;
        self
    }

    /// Marks the request as streaming.
    #[must_use]
    pub const fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Sets the caller-preferred provider.
    #[must_use]
    pub fn preferred_provider(mut self, provider: impl Into<ProviderId>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    /// Sets the overall request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the request priority.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builds the request, validating its invariants.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceRequestError`] when the request identifier or
    /// model identifier is empty, or when no messages were supplied.
    pub fn build(self) -> Result<InferenceRequest, InferenceRequestError> {
        if self.request_id.is_empty() {
            return Err(InferenceRequestError::EmptyRequestId);
        }
        if self.model_id.is_empty() {
            return Err(InferenceRequestError::EmptyModelId);
        }
        if self.messages.is_empty() {
            return Err(InferenceRequestError::NoMessages);
        }
        Ok(InferenceRequest {
            request_id: self.request_id,
            model_id: self.model_id,
            messages: self.messages,
            params: self.params,
            streaming: self.streaming,
            preferred_provider: self.preferred_provider,
            timeout: self.timeout,
            priority: self.priority,
        })
    }
}

/// Serializes/deserializes an optional [`Duration`] as milliseconds.
mod duration_millis_opt {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    /// Serializes the duration as milliseconds.
    ///
    /// # Errors
    ///
    /// Never fails; present for symmetry with `deserialize`.
    pub fn serialize<S: Serializer>(value: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "timeout values fit comfortably within u64 milliseconds"
            )]
            Some(duration) => ser.serialize_some(&(duration.as_millis() as u64)),
            None => ser.serialize_none(),
        }
    }

    /// Deserializes a millisecond count into a [`Duration`].
    ///
    /// # Errors
    ///
    /// Never fails for well-formed input; present for symmetry.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        let millis: Option<u64> = Option::deserialize(de)?;
        Ok(millis.map(Duration::from_millis))
    }
}

// ============================================================================
// SECTION: Inference Response
// ============================================================================

/// Reason an inference terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model reached a natural stop.
    Stop,
    /// The output token cap was reached.
    Length,
    /// The model invoked a tool.
    ToolCall,
    /// The inference failed.
    Error,
    /// The inference was cancelled.
    Cancelled,
}

/// Token accounting for a completed inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens produced by the completion.
    pub completion_tokens: u32,
    /// Sum of prompt and completion tokens.
    pub total_tokens: u32,
}

/// Immutable inference response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// Identifier matching the originating request.
    pub request_id: RequestId,
    /// Response content. On error, carries the root-cause message.
    pub content: String,
    /// Model identifier echoed from the provider.
    pub model_id: ModelId,
    /// Token accounting.
    pub tokens_used: TokenUsage,
    /// Wall-clock duration of the inference in milliseconds.
    pub duration_ms: u64,
    /// Timestamp the response was produced.
    pub timestamp: Timestamp,
    /// Free-form response metadata.
    pub metadata: BTreeMap<String, Value>,
    /// Reason the inference terminated.
    pub finish_reason: FinishReason,
}

#[cfg(test)]
mod tests {
    use super::InferenceRequest;
    use super::Message;
    use super::Role;

    #[test]
    fn build_to_builder_build_round_trips() {
        let request = InferenceRequest::builder("r1", "m1", vec![Message::new(Role::User, "hi")])
            .priority(7)
            .build()
            .expect("request should build");
        let round_tripped = request.to_builder().build().expect("round trip should build");
        assert_eq!(request, round_tripped);
    }

    #[test]
    fn rejects_empty_request_id() {
        let err = InferenceRequest::builder("", "m1", vec![Message::new(Role::User, "hi")]).build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_empty_model_id() {
        let err = InferenceRequest::builder("r1", "", vec![Message::new(Role::User, "hi")]).build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_no_messages() {
        let err = InferenceRequest::builder("r1", "m1", Vec::new()).build();
        assert!(err.is_err());
    }
}
