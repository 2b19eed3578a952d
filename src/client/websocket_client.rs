//! WebSocket transport for the deCONZ event feed
//!
//! The gateway pushes one JSON event per text message. Control frames are
//! handled here and never reach the decoder.

use crate::error::{DefluxError, Result};
use crate::events::{FrameConnection, Transport};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials websocket connections with a handshake timeout
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn dial(&self, address: &Url) -> Result<Box<dyn FrameConnection>> {
        debug!(address = %address, "Opening websocket");

        let handshake = tokio::time::timeout(self.connect_timeout, connect_async(address.as_str()))
            .await
            .map_err(|_| {
                DefluxError::dial_failed(
                    address,
                    format!("handshake timed out after {:?}", self.connect_timeout),
                )
            })?;

        let (stream, response) = handshake.map_err(|e| DefluxError::dial_failed(address, e.to_string()))?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WebSocketConnection { stream }))
    }
}

/// One open websocket to the gateway
pub struct WebSocketConnection {
    stream: WsStream,
}

#[async_trait]
impl FrameConnection for WebSocketConnection {
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "no reason given".to_string());
                    warn!(reason = %reason, "WebSocket closed by gateway");
                    return Err(DefluxError::connection_lost(format!(
                        "closed by gateway: {reason}"
                    )));
                }
                Some(Ok(other)) => {
                    trace!(message = ?other, "Skipping control frame");
                }
                Some(Err(e)) => return Err(DefluxError::connection_lost(e.to_string())),
                None => return Err(DefluxError::connection_lost("websocket stream ended")),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Ignoring error while closing websocket: {e}");
        }
    }
}
