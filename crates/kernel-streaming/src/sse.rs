// kernel-streaming/src/sse.rs
// ============================================================================
// Module: Server-Sent Events Transport
// Description: POSTs a request body and streams the `text/event-stream`
// response as a sequence of `StreamChunk`s.
// Purpose: Give a streaming provider implementation the SSE half of the
// wire contract without re-implementing framing per backend.
// Dependencies: reqwest (streaming body), kernel-core
// ============================================================================

//! ## Overview
//! [`SseClient::stream`] spawns a task that reads the response body
//! chunk-by-chunk, splits on `\n`, keeps lines prefixed `data: `, and stops
//! on the `[DONE]` sentinel or connection close — neither of which
//! produces a `StreamChunk` with `last = true`; the caller (typically
//! [`crate::collector::ChunkCollector`]) determines completion from the
//! stream ending rather than from a flag on the final item.

use std::time::Duration;

use kernel_core::RequestId;
use kernel_core::StreamChunk;
use reqwest::Client;
use reqwest::Response;
use reqwest::Url;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::StreamTransportError;

const DONE_SENTINEL: &str = "[DONE]";
const CHANNEL_CAPACITY: usize = 64;

/// Configuration for an [`SseClient`].
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Timeout applied to the full request lifecycle.
    pub request_timeout: Duration,
    /// User agent string sent with every request.
    pub user_agent: String,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            user_agent: "kernel-streaming/0.1".to_owned(),
        }
    }
}

/// Server-Sent Events streaming client.
pub struct SseClient {
    client: Client,
}

impl SseClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamTransportError::Request`] when the underlying HTTP
    /// client cannot be constructed.
    pub fn new(config: &SseConfig) -> Result<Self, StreamTransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|error| StreamTransportError::Request {
                url: String::new(),
                message: error.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Opens a streaming POST to `url` with JSON `body`, returning chunks
    /// for `request_id` as they arrive. Sequence numbers start at 0 and
    /// are strictly monotonic.
    ///
    /// # Errors
    ///
    /// Returns [`StreamTransportError`] when the connection cannot be
    /// established, the response status is not 200, or the response is not
    /// `text/event-stream`.
    pub async fn stream(
        &self,
        url: Url,
        body: Value,
        request_id: RequestId,
    ) -> Result<ReceiverStream<Result<StreamChunk, StreamTransportError>>, StreamTransportError> {
        let url_string = url.to_string();
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|error| StreamTransportError::Request {
                url: url_string.clone(),
                message: error.to_string(),
            })?;

        if response.status().as_u16() != 200 {
            return Err(StreamTransportError::UnexpectedStatus {
                url: url_string,
                status: response.status().as_u16(),
            });
        }
        let content_type_ok = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));
        if !content_type_ok {
            return Err(StreamTransportError::WrongContentType { url: url_string });
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(read_body(response, request_id, url_string, tx));
        Ok(ReceiverStream::new(rx))
    }
}

async fn read_body(
    mut response: Response,
    request_id: RequestId,
    url: String,
    tx: mpsc::Sender<Result<StreamChunk, StreamTransportError>>,
) {
    let mut buffer = String::new();
    let mut sequence = 0_u64;
    loop {
        let next = match response.chunk().await {
            Ok(next) => next,
            Err(error) => {
                let _ignored = tx
                    .send(Err(StreamTransportError::Transport {
                        url: url.clone(),
                        message: error.to_string(),
                    }))
                    .await;
                return;
            }
        };
        let Some(bytes) = next else {
            return;
        };
        buffer.push_str(&String::from_utf8_lossy(&bytes));
        while let Some(newline_at) = buffer.find('\n') {
            let line = buffer[..newline_at].trim_end_matches('\r').to_owned();
            buffer.drain(..=newline_at);
            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            if payload == DONE_SENTINEL {
                return;
            }
            let delta = serde_json::from_str::<String>(payload).unwrap_or_else(|_| payload.to_owned());
            let chunk = StreamChunk::new(request_id.clone(), delta, sequence);
            sequence += 1;
            if tx.send(Ok(chunk)).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SseConfig;
    use std::time::Duration;

    #[test]
    fn default_config_has_sane_timeout() {
        let config = SseConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(!config.user_agent.is_empty());
    }
}
