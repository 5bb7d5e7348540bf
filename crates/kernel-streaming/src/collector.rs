// kernel-streaming/src/collector.rs
// ============================================================================
// Module: Chunk Collector
// Description: Folds a stream of `StreamChunk`s into one aggregated result.
// Purpose: Let a caller that invoked a streaming provider path on behalf of
// a blocking request recover a single response.
// Dependencies: futures, kernel-core
// ============================================================================

//! ## Overview
//! [`ChunkCollector::collect`] concatenates each chunk's `delta` in
//! arrival order. If no chunk carried an explicit `finish_reason`, the
//! aggregate defaults to [`FinishReason::Stop`] — matching a transport
//! (like SSE's `[DONE]` sentinel) that signals completion by ending the
//! stream rather than by tagging a terminal chunk.

use futures::Stream;
use futures::StreamExt;
use kernel_core::FinishReason;
use kernel_core::RequestId;
use kernel_core::StreamChunk;

/// Aggregate of a folded chunk stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedStream {
    /// Request the collected chunks belong to.
    pub request_id: RequestId,
    /// Concatenation of every chunk's delta, in arrival order.
    pub content: String,
    /// Number of chunks folded.
    pub chunk_count: u64,
    /// Finish reason carried by the last chunk that specified one, or
    /// [`FinishReason::Stop`] if none did.
    pub finish_reason: FinishReason,
}

/// Folds a chunk stream into a single [`CollectedStream`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkCollector;

impl ChunkCollector {
    /// Consumes `chunks` to completion, concatenating deltas for
    /// `request_id`. Returns the first error the stream yields, if any.
    ///
    /// # Errors
    ///
    /// Propagates the first `Err` item yielded by `chunks`.
    pub async fn collect<S, E>(request_id: impl Into<RequestId>, mut chunks: S) -> Result<CollectedStream, E>
    where
        S: Stream<Item = Result<StreamChunk, E>> + Unpin,
    {
        let request_id = request_id.into();
        let mut content = String::new();
        let mut chunk_count = 0_u64;
        let mut finish_reason = FinishReason::Stop;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            content.push_str(&chunk.delta);
            chunk_count += 1;
            if let Some(reason) = chunk.finish_reason {
                finish_reason = reason;
            }
        }
        Ok(CollectedStream {
            request_id,
            content,
            chunk_count,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::ChunkCollector;
    use kernel_core::FinishReason;
    use kernel_core::StreamChunk;

    #[tokio::test]
    async fn folds_deltas_in_order_and_defaults_finish_reason() {
        let chunks: Vec<Result<StreamChunk, String>> = (0..4)
            .map(|sequence| Ok(StreamChunk::new("req-1", "X", sequence)))
            .collect();
        let collected = ChunkCollector::collect("req-1", stream::iter(chunks))
            .await
            .expect("no errors in stream");
        assert_eq!(collected.content, "XXXX");
        assert_eq!(collected.chunk_count, 4);
        assert_eq!(collected.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn terminal_chunk_finish_reason_is_preserved() {
        let chunks: Vec<Result<StreamChunk, String>> = vec![
            Ok(StreamChunk::new("req-1", "hi", 0)),
            Ok(StreamChunk::terminal("req-1", 1, FinishReason::Length)),
        ];
        let collected = ChunkCollector::collect("req-1", stream::iter(chunks))
            .await
            .expect("no errors in stream");
        assert_eq!(collected.content, "hi");
        assert_eq!(collected.finish_reason, FinishReason::Length);
    }

    #[tokio::test]
    async fn propagates_first_error() {
        let chunks: Vec<Result<StreamChunk, String>> = vec![Ok(StreamChunk::new("req-1", "hi", 0)), Err("boom".to_owned())];
        let result = ChunkCollector::collect("req-1", stream::iter(chunks)).await;
        assert_eq!(result.expect_err("stream yields an error"), "boom");
    }
}
