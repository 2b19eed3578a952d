//! Test fixtures and in-memory collaborators
//!
//! Frames are taken from real Xiaomi sensors paired with a deCONZ gateway.

use async_trait::async_trait;
use deflux::error::{DefluxError, Result};
use deflux::sensors::{SensorFetcher, SensorId, SensorMeta, Sensors};
use rstest::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const TEMPERATURE_FRAME: &str = r#"{"e":"changed","id":"1","r":"sensors","state":{"lastupdated":"2018-03-08T19:35:24","temperature":2062},"t":"event"}"#;
pub const HUMIDITY_FRAME: &str = r#"{"e":"changed","id":"2","r":"sensors","state":{"humidity":2985,"lastupdated":"2018-03-08T19:35:24"},"t":"event"}"#;
pub const PRESSURE_FRAME: &str = r#"{"e":"changed","id":"3","r":"sensors","state":{"lastupdated":"2018-03-08T19:35:24","pressure":993},"t":"event"}"#;
pub const SMOKE_NO_FIRE_FRAME: &str = r#"{	"e": "changed",	"id": "5",	"r": "sensors",	"state": {	  "fire": false,	  "lastupdated": "2018-03-13T19:46:03",	  "lowbattery": false,	  "tampered": false	},	"t": "event"  }"#;
pub const FLOOD_DETECTED_FRAME: &str = r#"{ "e": "changed", "id": "6", "r": "sensors", "state": { "lastupdated": "2018-03-13T20:46:03", "lowbattery": false, "tampered": false, "water": true }, "t": "event"   }"#;
pub const SWITCH_FRAME: &str = r#"{	"e": "changed",	"id": "7",	"r": "sensors",	"state": {	  "buttonevent": 1000,	  "lastupdated": "2018-03-20T20:52:18"	},	"t": "event"  }  "#;
pub const BATTERY_ONLY_FRAME: &str = r#"{"e":"changed","id":"1","r":"sensors","config":{"battery":90},"t":"event"}"#;
pub const UNKNOWN_FRAME: &str = r#"{"e": "hello my friend", "y": "Pænt go dag Hr 🦆"}"#;

/// The sensors behind the frames above
#[fixture]
pub fn sensors() -> Sensors {
    [
        SensorMeta::new(1, "Kitchen", "ZHATemperature"),
        SensorMeta::new(2, "Kitchen Humidity", "ZHAHumidity"),
        SensorMeta::new(3, "Kitchen Pressure", "ZHAPressure"),
        SensorMeta::new(5, "Hallway Smoke", "ZHAFire"),
        SensorMeta::new(6, "Basement Flood", "ZHAWater"),
        SensorMeta::new(7, "Desk Switch", "ZHASwitch"),
    ]
    .into_iter()
    .map(|meta| (meta.id, meta))
    .collect()
}

/// Build a sensor map from `(id, name, type)` triples
pub fn sensor_map(entries: &[(SensorId, &str, &str)]) -> Sensors {
    entries
        .iter()
        .map(|(id, name, type_tag)| (*id, SensorMeta::new(*id, *name, *type_tag)))
        .collect()
}

/// In-memory fetcher that counts calls and can fail the first few
pub struct CountingFetcher {
    sensors: Sensors,
    calls: AtomicUsize,
    failures: usize,
    delay: Duration,
}

impl CountingFetcher {
    pub fn new(sensors: Sensors) -> Self {
        Self {
            sensors,
            calls: AtomicUsize::new(0),
            failures: 0,
            delay: Duration::ZERO,
        }
    }

    /// Fail the first `failures` fetches
    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    /// Hold every fetch for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorFetcher for CountingFetcher {
    async fn fetch_all_sensors(&self) -> Result<Sensors> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if call < self.failures {
            return Err(DefluxError::invalid_input("gateway answered 503"));
        }
        Ok(self.sensors.clone())
    }
}
