//! Services that run on top of the event feed
//!
//! The sensor event pump supervises the feed connection and publishes
//! resolved [`SensorEvent`]s for downstream consumers.

pub mod sensor_event;
pub mod sensor_event_pump;

pub use sensor_event::{SensorEvent, Timeseries};
pub use sensor_event_pump::{PumpStats, ReconnectionConfig, SensorEventPump};
