// kernel-streaming/src/error.rs
// ============================================================================
// Module: Stream Transport Errors
// Description: Failures shared by the SSE and WebSocket transports.
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Failures raised while establishing or reading a streaming connection.
#[derive(Debug, Error, Clone)]
pub enum StreamTransportError {
    /// The request could not be sent, or the client could not be built.
    #[error("request to {url} failed: {message}")]
    Request {
        /// Target URL.
        url: String,
        /// Human-readable detail.
        message: String,
    },
    /// The response status was not the expected 200.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus {
        /// Target URL.
        url: String,
        /// Observed HTTP status code.
        status: u16,
    },
    /// The response content-type was not `text/event-stream`.
    #[error("response from {url} was not text/event-stream")]
    WrongContentType {
        /// Target URL.
        url: String,
    },
    /// A transport-level error occurred mid-stream.
    #[error("transport error reading from {url}: {message}")]
    Transport {
        /// Target URL.
        url: String,
        /// Human-readable detail.
        message: String,
    },
}
