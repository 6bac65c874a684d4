/*
[INPUT]:  Endpoint URL composed by stream registration
[OUTPUT]: Ordered stream of raw messages, ending on close or transport error
[POS]:    WebSocket layer - connection manager seam and default tungstenite implementation
[UPDATE]: When changing dial, frame handling or reader shutdown behavior
*/

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};

/// One frame as delivered by the connection, tagged with its arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    sequence: u64,
    payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(sequence: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    /// Position in the connection's delivery order, starting at 0
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as UTF-8, if it is
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Raw messages in arrival order.
///
/// `Err` is a terminal transport failure; end of stream is a clean close.
/// Dropping the stream releases the connection.
pub type RawMessageStream = BoxStream<'static, Result<RawMessage>>;

/// Opens the duplex channel behind a subscription.
///
/// Keep-alive, reconnection and backoff live behind this seam.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, endpoint: &Url) -> Result<RawMessageStream>;
}

/// Default connector over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
    buffer: usize,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration, buffer: usize) -> Self {
        Self {
            connect_timeout,
            buffer: buffer.max(1),
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.connect_timeout(), config.raw_buffer)
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, endpoint: &Url) -> Result<RawMessageStream> {
        let dial = connect_async(endpoint.as_str());
        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, dial)
            .await
            .map_err(|_| StreamError::ConnectTimeout {
                duration_ms: self.connect_timeout.as_millis() as u64,
            })??;
        info!(endpoint = %endpoint, "ws connected");

        let (mut write, mut read) = ws_stream.split();
        let (message_tx, message_rx) = mpsc::channel::<Result<RawMessage>>(self.buffer);
        let endpoint_for_task = endpoint.to_string();

        tokio::spawn(async move {
            let mut sequence: u64 = 0;
            loop {
                tokio::select! {
                    _ = message_tx.closed() => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        debug!(endpoint = %endpoint_for_task, "ws consumer dropped, closing");
                        break;
                    }
                    incoming = read.next() => {
                        let payload = match incoming {
                            Some(Ok(WsMessage::Text(text))) => text.as_bytes().to_vec(),
                            Some(Ok(WsMessage::Binary(bytes))) => bytes.to_vec(),
                            Some(Ok(WsMessage::Close(frame))) => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                info!(endpoint = %endpoint_for_task, ?frame, "ws closed by peer");
                                break;
                            }
                            Some(Ok(WsMessage::Ping(_)))
                            | Some(Ok(WsMessage::Pong(_)))
                            | Some(Ok(WsMessage::Frame(_))) => continue,
                            Some(Err(err)) => {
                                warn!(endpoint = %endpoint_for_task, error = %err, "ws read failed");
                                let _ = message_tx.send(Err(StreamError::WebSocket(err))).await;
                                break;
                            }
                            None => {
                                let _ = message_tx
                                    .send(Err(StreamError::transport("connection ended without close frame")))
                                    .await;
                                break;
                            }
                        };

                        if message_tx.send(Ok(RawMessage::new(sequence, payload))).await.is_err() {
                            let _ = write.send(WsMessage::Close(None)).await;
                            debug!(endpoint = %endpoint_for_task, "ws consumer dropped mid-send, closing");
                            break;
                        }
                        sequence += 1;
                    }
                }
            }
        });

        Ok(receiver_stream(message_rx))
    }
}

/// Adapt an mpsc receiver into a [`RawMessageStream`].
pub fn receiver_stream(receiver: mpsc::Receiver<Result<RawMessage>>) -> RawMessageStream {
    stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|item| (item, receiver))
    })
    .boxed()
}
