// kernel-streaming/src/lib.rs
// ============================================================================
// Crate: kernel-streaming
// Description: SSE and WebSocket streaming transports plus the chunk
// collector that folds a stream into a single aggregated result.
// ============================================================================

//! Transport-level building blocks for the kernel's two streaming wire
//! formats. A concrete streaming provider implementation (in
//! `kernel-providers` or a downstream crate) uses [`sse::SseClient`] or
//! [`ws::WsClient`] to realize `StreamingProvider::stream`; this crate has
//! no opinion on the `Provider` trait itself.

mod collector;
mod error;
mod sse;
mod ws;

pub use collector::ChunkCollector;
pub use collector::CollectedStream;
pub use error::StreamTransportError;
pub use sse::SseClient;
pub use sse::SseConfig;
pub use ws::WsClient;
