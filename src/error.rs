//! Error types for the deflux event bridge
//!
//! This module provides the single error enum used across the crate together
//! with structured error codes, severities and the recoverable/fatal
//! classification the event pump relies on.

use crate::sensors::SensorId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for deflux operations
pub type Result<T> = std::result::Result<T, DefluxError>;

/// Error types for gateway communication and event decoding
#[derive(Error, Debug)]
pub enum DefluxError {
    /// The transport connection to the event feed could not be established
    #[error("Unable to dial {address}: {reason}")]
    DialFailed { address: String, reason: String },

    /// An established event feed connection broke
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A single event could not be decoded, the connection is still usable
    #[error("Event dropped: {source}")]
    EventDropped {
        sensor_id: Option<SensorId>,
        #[source]
        source: Box<DefluxError>,
    },

    /// Type lookup for the sensor owning an event failed
    #[error("Unable to lookup type of sensor {sensor_id}: {source}")]
    LookupFailed {
        sensor_id: SensorId,
        #[source]
        source: Box<DefluxError>,
    },

    /// Sensor is not known to the gateway
    #[error("No such sensor: {0}")]
    NotFound(SensorId),

    /// Bulk sensor fetch failed
    #[error("Unable to populate sensors: {0}")]
    PopulationFailed(#[source] Box<DefluxError>),

    /// Sensor type tag outside the supported set
    #[error("Sensor {sensor_id} has unknown type {type_tag}")]
    UnknownType { sensor_id: SensorId, type_tag: String },

    /// Known sensor type whose state payload did not match its shape
    #[error("Malformed {type_tag} state: {reason}")]
    MalformedPayload { type_tag: String, reason: String },

    /// Frame that is not a valid event envelope
    #[error("Malformed event envelope: {0}")]
    MalformedEnvelope(String),

    /// Component started without a required collaborator
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Pump started twice
    #[error("Sensor event pump is already running")]
    AlreadyRunning,

    /// Event carries no time series fields
    #[error("Event has no time series data")]
    NoTimeseries,

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gateway discovery errors
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// API key pairing errors
    #[error("Pairing failed: {0}")]
    Pairing(String),

    /// WebSocket errors
    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Connection errors (1000-1099)
    DialFailed,
    ConnectionLost,
    NetworkUnreachable,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,
    NotConfigured,
    PairingFailed,

    // Sensor errors (1300-1399)
    SensorNotFound,
    SensorTypeUnsupported,
    DirectoryPopulationFailed,
    SensorLookupFailed,

    // Data errors (1400-1499)
    ParsingFailed,
    PayloadMalformed,
    EnvelopeMalformed,
    InvalidInput,
    EventDropped,
    NoTimeseries,

    // Service errors (1600-1699)
    ExternalServiceError,

    // Internal errors (1900-1999)
    InternalError,
    UnexpectedState,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::DialFailed => 1001,
            ErrorCode::ConnectionLost => 1002,
            ErrorCode::NetworkUnreachable => 1003,

            ErrorCode::ConfigurationInvalid => 1201,
            ErrorCode::NotConfigured => 1202,
            ErrorCode::PairingFailed => 1203,

            ErrorCode::SensorNotFound => 1301,
            ErrorCode::SensorTypeUnsupported => 1302,
            ErrorCode::DirectoryPopulationFailed => 1303,
            ErrorCode::SensorLookupFailed => 1304,

            ErrorCode::ParsingFailed => 1401,
            ErrorCode::PayloadMalformed => 1402,
            ErrorCode::EnvelopeMalformed => 1403,
            ErrorCode::InvalidInput => 1404,
            ErrorCode::EventDropped => 1405,
            ErrorCode::NoTimeseries => 1406,

            ErrorCode::ExternalServiceError => 1601,

            ErrorCode::InternalError => 1901,
            ErrorCode::UnexpectedState => 1902,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1000..=1099 => "connection",
            1200..=1299 => "configuration",
            1300..=1399 => "sensor",
            1400..=1499 => "data",
            1600..=1699 => "service",
            1900..=1999 => "internal",
            _ => "unknown",
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Low severity - information only
    Info,
    /// Medium severity - warning condition
    Warning,
    /// High severity - error condition
    Error,
    /// Critical severity - immediate attention required
    Critical,
}

impl DefluxError {
    /// Create a connection lost error
    pub fn connection_lost<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionLost(msg.into())
    }

    /// Create a dial error for an address
    pub fn dial_failed<A: ToString, S: Into<String>>(address: A, reason: S) -> Self {
        Self::DialFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a discovery error
    pub fn discovery<S: Into<String>>(msg: S) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a pairing error
    pub fn pairing<S: Into<String>>(msg: S) -> Self {
        Self::Pairing(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a not configured error
    pub fn not_configured<S: Into<String>>(msg: S) -> Self {
        Self::NotConfigured(msg.into())
    }

    /// Create a malformed payload error
    pub fn malformed_payload<T: Into<String>, S: ToString>(type_tag: T, reason: S) -> Self {
        Self::MalformedPayload {
            type_tag: type_tag.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a decode failure so callers skip the event and keep reading
    pub fn event_dropped(self) -> Self {
        match self {
            dropped @ Self::EventDropped { .. } => dropped,
            other => Self::EventDropped {
                sensor_id: other.sensor_id(),
                source: Box::new(other),
            },
        }
    }

    /// Sensor the error refers to, if any
    pub fn sensor_id(&self) -> Option<SensorId> {
        match self {
            Self::EventDropped { sensor_id, .. } => *sensor_id,
            Self::LookupFailed { sensor_id, .. } => Some(*sensor_id),
            Self::NotFound(id) => Some(*id),
            Self::UnknownType { sensor_id, .. } => Some(*sensor_id),
            _ => None,
        }
    }

    /// Map DefluxError to structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            DefluxError::DialFailed { .. } => ErrorCode::DialFailed,
            DefluxError::ConnectionLost(_) => ErrorCode::ConnectionLost,
            DefluxError::EventDropped { .. } => ErrorCode::EventDropped,
            DefluxError::LookupFailed { .. } => ErrorCode::SensorLookupFailed,
            DefluxError::NotFound(_) => ErrorCode::SensorNotFound,
            DefluxError::PopulationFailed(_) => ErrorCode::DirectoryPopulationFailed,
            DefluxError::UnknownType { .. } => ErrorCode::SensorTypeUnsupported,
            DefluxError::MalformedPayload { .. } => ErrorCode::PayloadMalformed,
            DefluxError::MalformedEnvelope(_) => ErrorCode::EnvelopeMalformed,
            DefluxError::NotConfigured(_) => ErrorCode::NotConfigured,
            DefluxError::AlreadyRunning => ErrorCode::UnexpectedState,
            DefluxError::NoTimeseries => ErrorCode::NoTimeseries,
            DefluxError::Http(_) => ErrorCode::ExternalServiceError,
            DefluxError::Json(_) => ErrorCode::ParsingFailed,
            DefluxError::Config(_) => ErrorCode::ConfigurationInvalid,
            DefluxError::Discovery(_) => ErrorCode::NetworkUnreachable,
            DefluxError::Pairing(_) => ErrorCode::PairingFailed,
            #[cfg(feature = "websocket")]
            DefluxError::WebSocket(_) => ErrorCode::ConnectionLost,
            DefluxError::InvalidInput(_) => ErrorCode::InvalidInput,
            DefluxError::Io(_) => ErrorCode::InternalError,
            DefluxError::Generic(_) => ErrorCode::InternalError,
        }
    }

    /// Short machine-readable kind used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            DefluxError::DialFailed { .. } => "dial_failed",
            DefluxError::ConnectionLost(_) => "connection_lost",
            DefluxError::EventDropped { source, .. } => source.kind(),
            DefluxError::LookupFailed { source, .. } => match source.as_ref() {
                DefluxError::NotFound(_) => "not_found",
                DefluxError::PopulationFailed(_) => "population_failed",
                _ => "lookup_failed",
            },
            DefluxError::NotFound(_) => "not_found",
            DefluxError::PopulationFailed(_) => "population_failed",
            DefluxError::UnknownType { .. } => "unknown_type",
            DefluxError::MalformedPayload { .. } => "malformed_payload",
            DefluxError::MalformedEnvelope(_) => "malformed_envelope",
            DefluxError::NotConfigured(_) => "not_configured",
            DefluxError::AlreadyRunning => "already_running",
            DefluxError::NoTimeseries => "no_timeseries",
            DefluxError::Http(_) => "http",
            DefluxError::Json(_) => "json",
            DefluxError::Config(_) => "config",
            DefluxError::Discovery(_) => "discovery",
            DefluxError::Pairing(_) => "pairing",
            #[cfg(feature = "websocket")]
            DefluxError::WebSocket(_) => "websocket",
            DefluxError::InvalidInput(_) => "invalid_input",
            DefluxError::Io(_) => "io",
            DefluxError::Generic(_) => "generic",
        }
    }

    /// Whether the failure only affects a single event.
    ///
    /// Recoverable errors leave the event stream connected; everything else
    /// means the current connection must be torn down and redialed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DefluxError::EventDropped { .. }
                | DefluxError::LookupFailed { .. }
                | DefluxError::NotFound(_)
                | DefluxError::PopulationFailed(_)
                | DefluxError::UnknownType { .. }
                | DefluxError::MalformedPayload { .. }
                | DefluxError::MalformedEnvelope(_)
        )
    }

    /// Check if error is retryable at the connection level
    pub fn is_retryable(&self) -> bool {
        match self {
            DefluxError::DialFailed { .. } | DefluxError::ConnectionLost(_) => true,
            #[cfg(feature = "websocket")]
            DefluxError::WebSocket(_) => true,
            DefluxError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        if self.is_recoverable() {
            return ErrorSeverity::Warning;
        }
        match self {
            DefluxError::DialFailed { .. } | DefluxError::ConnectionLost(_) => {
                ErrorSeverity::Warning
            }
            DefluxError::NoTimeseries => ErrorSeverity::Info,
            DefluxError::NotConfigured(_) | DefluxError::Config(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

#[cfg(feature = "websocket")]
impl From<tokio_tungstenite::tungstenite::Error> for DefluxError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        DefluxError::WebSocket(err.to_string())
    }
}

impl From<config::ConfigError> for DefluxError {
    fn from(err: config::ConfigError) -> Self {
        DefluxError::Config(err.to_string())
    }
}

/// Error logging utilities
pub struct ErrorReporter;

impl ErrorReporter {
    /// Log an error as a structured record with a level matching its severity
    pub fn log_error(error: &DefluxError, component: &str, operation: &str) {
        let code = error.to_error_code();
        let sensor_id = error.sensor_id();

        match error.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                tracing::error!(
                    error_code = code.as_number(),
                    category = code.category(),
                    error_kind = error.kind(),
                    sensor_id = ?sensor_id,
                    component,
                    operation,
                    "{}",
                    error
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error_code = code.as_number(),
                    category = code.category(),
                    error_kind = error.kind(),
                    sensor_id = ?sensor_id,
                    component,
                    operation,
                    "{}",
                    error
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error_code = code.as_number(),
                    category = code.category(),
                    error_kind = error.kind(),
                    sensor_id = ?sensor_id,
                    component,
                    operation,
                    "{}",
                    error
                );
            }
        }
    }
}
