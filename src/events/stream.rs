//! Event stream over a frame transport
//!
//! [`EventStream`] owns one logical connection to the gateway's event feed.
//! It turns frames into decoded events and sorts failures into two groups:
//! a bad event is dropped and the stream stays connected, a broken transport
//! drops the stream back to [`StreamState::Disconnected`].

use crate::error::{DefluxError, Result};
use crate::events::{DecodedEvent, StateDecoder};
use async_trait::async_trait;
use tracing::{debug, info, trace};
use url::Url;

/// A connected, message-oriented link to the gateway
#[async_trait]
pub trait FrameConnection: Send {
    /// Wait for the next data frame
    async fn read_frame(&mut self) -> Result<Vec<u8>>;

    /// Close the link. Errors are swallowed.
    async fn close(&mut self);
}

/// Dials frame connections
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(&self, address: &Url) -> Result<Box<dyn FrameConnection>>;
}

/// Source of decoded events driven by the pump
#[async_trait]
pub trait EventSource: Send {
    /// Establish the connection, no-op when already connected
    async fn connect(&mut self) -> Result<()>;

    /// Read and decode the next event
    async fn read_next(&mut self) -> Result<DecodedEvent>;

    /// Tear the connection down, idempotent
    async fn close(&mut self);
}

/// Connection state of an [`EventStream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connected,
}

/// Gateway event stream
pub struct EventStream {
    address: Url,
    transport: std::sync::Arc<dyn Transport>,
    decoder: StateDecoder,
    connection: Option<Box<dyn FrameConnection>>,
}

impl EventStream {
    pub fn new(
        address: Url,
        transport: std::sync::Arc<dyn Transport>,
        decoder: StateDecoder,
    ) -> Self {
        Self {
            address,
            transport,
            decoder,
            connection: None,
        }
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    pub fn state(&self) -> StreamState {
        if self.connection.is_some() {
            StreamState::Connected
        } else {
            StreamState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == StreamState::Connected
    }

    /// Dial the event feed
    pub async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        debug!(address = %self.address, "Dialing event feed");
        let connection = self.transport.dial(&self.address).await.map_err(|e| match e {
            dial @ DefluxError::DialFailed { .. } => dial,
            other => DefluxError::dial_failed(&self.address, other.to_string()),
        })?;

        info!(address = %self.address, "Connected to event feed");
        self.connection = Some(connection);
        Ok(())
    }

    /// Read the next event.
    ///
    /// Transport failures return [`DefluxError::ConnectionLost`] and leave the
    /// stream disconnected. Decode failures return
    /// [`DefluxError::EventDropped`] and keep it connected.
    pub async fn read_next(&mut self) -> Result<DecodedEvent> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| DefluxError::connection_lost("event stream is not connected"))?;

        let read = connection.read_frame().await;
        let frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                self.close().await;
                return Err(match e {
                    lost @ DefluxError::ConnectionLost(_) => lost,
                    other => DefluxError::connection_lost(other.to_string()),
                });
            }
        };

        trace!(bytes = frame.len(), "Received frame");
        self.decoder
            .parse(&frame)
            .await
            .map_err(DefluxError::event_dropped)
    }

    pub async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
            debug!(address = %self.address, "Event feed closed");
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("address", &self.address.as_str())
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl EventSource for EventStream {
    async fn connect(&mut self) -> Result<()> {
        EventStream::connect(self).await
    }

    async fn read_next(&mut self) -> Result<DecodedEvent> {
        EventStream::read_next(self).await
    }

    async fn close(&mut self) {
        EventStream::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DecodedState;
    use crate::sensors::{SensorId, TypeLookup};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct FixedLookup;

    #[async_trait]
    impl TypeLookup for FixedLookup {
        async fn lookup_type(&self, id: SensorId) -> Result<String> {
            match id {
                1 => Ok("ZHATemperature".to_string()),
                _ => Err(DefluxError::NotFound(id)),
            }
        }
    }

    struct QueueConnection {
        frames: VecDeque<Result<Vec<u8>>>,
    }

    #[async_trait]
    impl FrameConnection for QueueConnection {
        async fn read_frame(&mut self) -> Result<Vec<u8>> {
            self.frames
                .pop_front()
                .unwrap_or_else(|| Err(DefluxError::connection_lost("eof")))
        }

        async fn close(&mut self) {}
    }

    struct QueueTransport {
        sessions: Mutex<VecDeque<Result<Vec<Result<Vec<u8>>>>>>,
    }

    #[async_trait]
    impl Transport for QueueTransport {
        async fn dial(&self, _address: &Url) -> Result<Box<dyn FrameConnection>> {
            let next = self.sessions.lock().unwrap().pop_front();
            match next {
                Some(Ok(frames)) => Ok(Box::new(QueueConnection {
                    frames: frames.into(),
                })),
                Some(Err(e)) => Err(e),
                None => Err(DefluxError::connection_lost("refused")),
            }
        }
    }

    fn stream(sessions: Vec<Result<Vec<Result<Vec<u8>>>>>) -> EventStream {
        EventStream::new(
            Url::parse("ws://127.0.0.1:443/").unwrap(),
            Arc::new(QueueTransport {
                sessions: Mutex::new(sessions.into()),
            }),
            StateDecoder::new(Arc::new(FixedLookup)),
        )
    }

    const TEMPERATURE: &[u8] = br#"{"t":"event","e":"changed","r":"sensors","id":"1","state":{"temperature":2062}}"#;

    #[tokio::test]
    async fn test_dial_failure_stays_disconnected() {
        let mut stream = stream(vec![Err(DefluxError::invalid_input("no route"))]);

        let err = stream.connect().await.unwrap_err();
        match err {
            DefluxError::DialFailed { address, reason } => {
                assert_eq!(address, "ws://127.0.0.1:443/");
                assert!(reason.contains("no route"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(stream.state(), StreamState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_twice_dials_once() {
        let mut stream = stream(vec![Ok(vec![Ok(TEMPERATURE.to_vec())])]);
        stream.connect().await.unwrap();
        stream.connect().await.unwrap();

        let event = stream.read_next().await.unwrap();
        assert!(matches!(event.state, DecodedState::Temperature(_)));
    }

    #[tokio::test]
    async fn test_read_without_connect_is_connection_lost() {
        let mut stream = stream(vec![]);
        let err = stream.read_next().await.unwrap_err();
        assert!(matches!(err, DefluxError::ConnectionLost(_)));
    }

    #[tokio::test]
    async fn test_transport_error_disconnects() {
        let mut stream = stream(vec![Ok(vec![Err(DefluxError::invalid_input("protocol"))])]);
        stream.connect().await.unwrap();

        let err = stream.read_next().await.unwrap_err();
        assert!(matches!(err, DefluxError::ConnectionLost(_)));
        assert!(!err.is_recoverable());
        assert_eq!(stream.state(), StreamState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut stream = stream(vec![Ok(vec![])]);
        stream.connect().await.unwrap();
        stream.close().await;
        stream.close().await;
        assert_eq!(stream.state(), StreamState::Disconnected);
    }
}
