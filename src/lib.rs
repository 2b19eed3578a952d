//! deflux: deCONZ sensor events as typed, time series ready records
//!
//! This crate connects to a deCONZ Zigbee gateway, follows its websocket
//! event feed and turns every sensor state change into a [`SensorEvent`]
//! that carries both the sensor's identity and its decoded measurement.
//!
//! # Features
//!
//! - Lazily populated sensor directory backed by the REST API
//! - Closed set of typed sensor states, unknown sensor types are rejected
//! - Self-healing event stream with configurable redial backoff
//! - Per-event failures are logged and skipped without dropping the connection
//! - Gateway discovery and API key pairing
//!
//! # Example
//!
//! ```no_run
//! use deflux::{
//!     client::{DeconzHttpClient, WebSocketTransport},
//!     events::{EventStream, StateDecoder},
//!     DefluxConfig, SensorDirectory, SensorEventPump,
//! };
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> deflux::Result<()> {
//! let config = DefluxConfig::load(None)?;
//! let rest = Arc::new(DeconzHttpClient::new(&config.deconz)?);
//! let directory = Arc::new(SensorDirectory::new(rest.clone()));
//!
//! let stream = EventStream::new(
//!     rest.websocket_address().await?,
//!     Arc::new(WebSocketTransport::new(config.deconz.timeout)),
//!     StateDecoder::new(directory.clone()),
//! );
//!
//! let (tx, mut rx) = mpsc::channel(config.pump.channel_capacity);
//! let mut pump = SensorEventPump::new(config.pump.reconnection.clone())
//!     .with_sensor_lookup(directory)
//!     .with_event_source(Box::new(stream));
//! pump.start(tx)?;
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{}: {:?}", event.sensor.name, event.state);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod logging;
pub mod sensors;
pub mod services;

// Re-export main types for convenience
pub use config::DefluxConfig;
pub use error::{DefluxError, Result};
pub use events::{DecodedEvent, DecodedState, EventStream, RawEnvelope, StateDecoder};
pub use sensors::{SensorDirectory, SensorId, SensorMeta, Sensors};
pub use services::{SensorEvent, SensorEventPump, Timeseries};
