// kernel-streaming/src/ws.rs
// ============================================================================
// Module: WebSocket Transport
// Description: Opens a duplex WebSocket connection, sends one text frame as
// the request, and forwards each inbound text frame as a `StreamChunk`.
// Purpose: Give a streaming provider implementation the WebSocket half of
// the wire contract; the teacher pack has no WebSocket precedent, so this
// follows the ecosystem-standard `tokio-tungstenite` client shape.
// Dependencies: tokio-tungstenite, futures, kernel-core
// ============================================================================

//! ## Overview
//! [`WsClient::stream`] mirrors [`crate::sse::SseClient::stream`]'s
//! spawn-and-channel shape: a task owns the socket, forwards inbound text
//! frames as chunks, and exits on a close frame or transport error.

use futures::SinkExt;
use futures::StreamExt;
use kernel_core::RequestId;
use kernel_core::StreamChunk;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::StreamTransportError;

const CHANNEL_CAPACITY: usize = 64;

/// WebSocket streaming client.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsClient;

impl WsClient {
    /// Opens a connection to `url`, sends `request_payload` as a single
    /// text frame, and returns inbound text frames as chunks for
    /// `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamTransportError::Request`] when the connection
    /// cannot be established or the initial frame cannot be sent.
    pub async fn stream(
        &self,
        url: &str,
        request_payload: String,
        request_id: RequestId,
    ) -> Result<ReceiverStream<Result<StreamChunk, StreamTransportError>>, StreamTransportError> {
        let (socket, _response) = connect_async(url).await.map_err(|error| StreamTransportError::Request {
            url: url.to_owned(),
            message: error.to_string(),
        })?;
        let (mut sink, mut source) = socket.split();
        sink.send(Message::Text(request_payload.into()))
            .await
            .map_err(|error| StreamTransportError::Request {
                url: url.to_owned(),
                message: error.to_string(),
            })?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let url_owned = url.to_owned();
        tokio::spawn(async move {
            let mut sequence = 0_u64;
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let chunk = StreamChunk::new(request_id.clone(), text.to_string(), sequence);
                        sequence += 1;
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => return,
                    Ok(_) => continue,
                    Err(error) => {
                        let _ignored = tx
                            .send(Err(StreamTransportError::Transport {
                                url: url_owned.clone(),
                                message: error.to_string(),
                            }))
                            .await;
                        return;
                    }
                }
            }
        });
        Ok(ReceiverStream::new(rx))
    }
}
