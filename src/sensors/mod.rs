//! Sensor metadata model and the lookup seams used by the decoder and pump
//!
//! The gateway's REST API is the only source of sensor identity. Everything in
//! the event path resolves an event's sensor through the traits defined here,
//! which keeps the directory injectable and the core free of process globals.

pub mod directory;

pub use directory::SensorDirectory;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Numeric sensor identifier as assigned by the gateway
pub type SensorId = u32;

/// Immutable snapshot of one sensor as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorMeta {
    /// Sensor id (the key of the REST sensors object, not part of its body)
    #[serde(default)]
    pub id: SensorId,

    /// Display name
    pub name: String,

    /// Type tag (e.g. "ZHATemperature")
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Hardware model
    #[serde(rename = "modelid", default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    /// Manufacturer name
    #[serde(
        rename = "manufacturername",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub manufacturer: Option<String>,

    /// Zigbee unique id
    #[serde(rename = "uniqueid", default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

impl SensorMeta {
    /// Create a sensor snapshot with only the fields decoding depends on
    pub fn new<N: Into<String>, T: Into<String>>(id: SensorId, name: N, type_tag: T) -> Self {
        Self {
            id,
            name: name.into(),
            type_tag: type_tag.into(),
            model_id: None,
            manufacturer: None,
            unique_id: None,
        }
    }
}

/// Full sensor listing keyed by id
pub type Sensors = HashMap<SensorId, SensorMeta>;

/// Bulk fetch of every sensor known to the gateway
#[async_trait]
pub trait SensorFetcher: Send + Sync {
    /// Fetch the complete sensor list in a single call
    async fn fetch_all_sensors(&self) -> Result<Sensors>;
}

/// Resolves the type tag of a sensor
#[async_trait]
pub trait TypeLookup: Send + Sync {
    async fn lookup_type(&self, id: SensorId) -> Result<String>;
}

/// Resolves the full metadata of a sensor
#[async_trait]
pub trait SensorLookup: Send + Sync {
    async fn lookup_sensor(&self, id: SensorId) -> Result<SensorMeta>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_meta_from_rest_payload() {
        let body = r#"{
            "config": {"battery": 100, "on": true, "reachable": true},
            "etag": "1b3b1b1d6c5e7a2e",
            "manufacturername": "LUMI",
            "modelid": "lumi.weather",
            "name": "Kitchen",
            "state": {"lastupdated": "2018-03-08T19:35:24", "temperature": 2062},
            "type": "ZHATemperature",
            "uniqueid": "00:15:8d:00:02:3d:26:5e-01-0402"
        }"#;

        let meta: SensorMeta = serde_json::from_str(body).unwrap();
        assert_eq!(meta.id, 0);
        assert_eq!(meta.name, "Kitchen");
        assert_eq!(meta.type_tag, "ZHATemperature");
        assert_eq!(meta.model_id.as_deref(), Some("lumi.weather"));
        assert_eq!(meta.manufacturer.as_deref(), Some("LUMI"));
        assert!(meta.unique_id.is_some());
    }

    #[test]
    fn test_sensor_meta_optional_fields() {
        let meta: SensorMeta =
            serde_json::from_str(r#"{"name": "Daylight", "type": "Daylight"}"#).unwrap();
        assert_eq!(meta, SensorMeta::new(0, "Daylight", "Daylight"));
    }
}
