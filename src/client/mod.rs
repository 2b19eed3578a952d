//! deCONZ gateway clients for the REST API and the websocket event feed

pub mod http_client;
#[cfg(feature = "websocket")]
pub mod websocket_client;

pub use http_client::DeconzHttpClient;
#[cfg(feature = "websocket")]
pub use websocket_client::{WebSocketConnection, WebSocketTransport};

/// Device type announced to the gateway when requesting an API key
pub const DEFAULT_DEVICE_TYPE: &str = "Deflux";
