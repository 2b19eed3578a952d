//! Envelope decoding
//!
//! Resolves the sensor type of an event through a [`TypeLookup`] and parses
//! the state payload into the matching [`DecodedState`] variant.

use crate::error::{DefluxError, Result};
use crate::events::{DecodedEvent, DecodedState, RawEnvelope, SensorType};
use crate::sensors::TypeLookup;
use std::sync::Arc;
use tracing::trace;

/// Stateless decoder over a shared type lookup
#[derive(Clone)]
pub struct StateDecoder {
    types: Arc<dyn TypeLookup>,
}

impl StateDecoder {
    pub fn new(types: Arc<dyn TypeLookup>) -> Self {
        Self { types }
    }

    /// Decode the state carried by an envelope.
    ///
    /// Non-sensor resources and envelopes without state decode to
    /// [`DecodedState::Empty`] without touching the lookup.
    pub async fn decode(&self, envelope: &RawEnvelope) -> Result<DecodedState> {
        let raw = match &envelope.raw_state {
            Some(raw) if envelope.is_sensor_event() && envelope.has_state() => raw,
            _ => return Ok(DecodedState::Empty),
        };

        let sensor_id = envelope.sensor_id;
        let type_tag =
            self.types
                .lookup_type(sensor_id)
                .await
                .map_err(|e| DefluxError::LookupFailed {
                    sensor_id,
                    source: Box::new(e),
                })?;

        let sensor_type = SensorType::from_tag(&type_tag).ok_or_else(|| {
            DefluxError::UnknownType {
                sensor_id,
                type_tag: type_tag.clone(),
            }
        })?;

        trace!(sensor_id, sensor_type = %sensor_type, "Decoding sensor state");
        sensor_type.decode_state(raw)
    }

    /// Decode one raw frame into an envelope and its state
    pub async fn parse(&self, frame: &[u8]) -> Result<DecodedEvent> {
        let envelope = RawEnvelope::from_slice(frame)?;
        let state = self.decode(&envelope).await?;
        Ok(DecodedEvent { envelope, state })
    }
}

impl std::fmt::Debug for StateDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDecoder").finish_non_exhaustive()
    }
}
