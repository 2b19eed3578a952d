//! Resolved sensor events and their time series projection

use crate::error::{DefluxError, Result};
use crate::events::{DecodedEvent, DecodedState, Fields, RawEnvelope};
use crate::sensors::SensorMeta;
use serde::Serialize;
use std::collections::BTreeMap;

/// A decoded event joined with the metadata of the sensor that sent it
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub envelope: RawEnvelope,
    pub state: DecodedState,
    pub sensor: SensorMeta,
}

/// Tags and fields of one time series point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeseries {
    pub tags: BTreeMap<String, String>,
    pub fields: Fields,
}

impl SensorEvent {
    pub fn new(event: DecodedEvent, sensor: SensorMeta) -> Self {
        Self {
            envelope: event.envelope,
            state: event.state,
            sensor,
        }
    }

    /// Project the event into tags (`name`, `type`, `id`) and fields.
    ///
    /// Events without state have nothing to record and return
    /// [`DefluxError::NoTimeseries`].
    pub fn timeseries(&self) -> Result<Timeseries> {
        let fields = self.state.fields().ok_or(DefluxError::NoTimeseries)?;

        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), self.sensor.name.clone());
        tags.insert("type".to_string(), self.sensor.type_tag.clone());
        tags.insert("id".to_string(), self.sensor.id.to_string());

        Ok(Timeseries { tags, fields })
    }
}
