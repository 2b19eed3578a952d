//! Gateway event feed: envelope format, state decoding and the stream
//!
//! Each websocket frame carries one JSON envelope:
//!
//! ```json
//! {"t":"event","e":"changed","r":"sensors","id":"1","state":{"temperature":2062}}
//! ```
//!
//! The shape of `state` depends on the type of the sensor named by `id`, which
//! is why decoding needs a [`TypeLookup`](crate::sensors::TypeLookup).

pub mod decoder;
pub mod state;
pub mod stream;

pub use decoder::StateDecoder;
pub use state::{DecodedState, FieldValue, Fields, SensorType};
pub use stream::{EventSource, EventStream, FrameConnection, StreamState, Transport};

use crate::sensors::SensorId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Resource kind of sensor state events
pub const SENSORS_RESOURCE: &str = "sensors";

/// Wire envelope of one gateway event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnvelope {
    /// Message type, always "event" for the feed
    #[serde(rename = "t")]
    pub type_discriminant: String,

    /// Change kind, e.g. "changed" or "added"
    #[serde(rename = "e", default)]
    pub change_kind: String,

    /// Resource kind, e.g. "sensors" or "lights"
    #[serde(rename = "r", default)]
    pub resource_kind: String,

    /// Sensor id, transmitted as a numeric string
    #[serde(
        rename = "id",
        default,
        deserialize_with = "sensor_id_from_wire",
        serialize_with = "sensor_id_to_wire"
    )]
    pub sensor_id: SensorId,

    /// Undecoded state payload
    #[serde(rename = "state", default, skip_serializing_if = "Option::is_none")]
    pub raw_state: Option<Value>,
}

impl RawEnvelope {
    /// Decode an envelope from one frame
    pub fn from_slice(frame: &[u8]) -> crate::error::Result<Self> {
        serde_json::from_slice(frame)
            .map_err(|e| crate::error::DefluxError::MalformedEnvelope(e.to_string()))
    }

    /// Whether this event concerns a sensor resource
    pub fn is_sensor_event(&self) -> bool {
        self.resource_kind == SENSORS_RESOURCE
    }

    /// Whether the envelope carries state worth decoding.
    ///
    /// Absent, `null` and `{}` states are all treated as no state.
    pub fn has_state(&self) -> bool {
        match &self.raw_state {
            None | Some(Value::Null) => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }
}

/// Accepts `"12"` as well as a bare `12`
fn sensor_id_from_wire<'de, D>(deserializer: D) -> Result<SensorId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Text(String),
        Number(SensorId),
    }

    match WireId::deserialize(deserializer)? {
        WireId::Number(id) => Ok(id),
        WireId::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid sensor id {s:?}: {e}"))),
    }
}

fn sensor_id_to_wire<S>(id: &SensorId, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&id.to_string())
}

/// An envelope together with its decoded state
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub envelope: RawEnvelope,
    pub state: DecodedState,
}

impl DecodedEvent {
    pub fn sensor_id(&self) -> SensorId {
        self.envelope.sensor_id
    }
}
