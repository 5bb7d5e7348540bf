// kernel-core/src/stream.rs
// ============================================================================
// Module: Stream Chunk
// Description: A single unit of a streamed inference response.
// Purpose: Give providers, transports, and collectors one shared chunk
// shape.
// Dependencies: serde, crate::{identifiers, request}
// ============================================================================

//! ## Overview
//! `StreamChunk` is produced by a streaming provider call and consumed
//! either directly by a caller or folded by a collector into a single
//! [`crate::request::InferenceResponse`].

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::RequestId;
use crate::request::FinishReason;

/// One chunk of a streamed inference response.
///
/// # Invariants
/// - `sequence` is strictly monotonic per request.
/// - `finish_reason` is only ever set when `last` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Request this chunk belongs to.
    pub request_id: RequestId,
    /// Token delta produced by this chunk.
    pub delta: String,
    /// Strictly monotonic sequence index, starting at 0.
    pub sequence: u64,
    /// True when this is the final chunk of the stream.
    pub last: bool,
    /// Finish reason, present only on the last chunk.
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    /// Builds a non-terminal chunk.
    #[must_use]
    pub fn new(request_id: impl Into<RequestId>, delta: impl Into<String>, sequence: u64) -> Self {
        Self {
            request_id: request_id.into(),
            delta: delta.into(),
            sequence,
            last: false,
            finish_reason: None,
        }
    }

    /// Builds the terminal chunk of a stream.
    #[must_use]
    pub fn terminal(
        request_id: impl Into<RequestId>,
        sequence: u64,
        finish_reason: FinishReason,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            delta: String::new(),
            sequence,
            last: true,
            finish_reason: Some(finish_reason),
        }
    }
}
