//! Typed sensor states
//!
//! Every sensor family the gateway reports has its own state shape. The set is
//! closed: a type tag outside [`SensorType`] is rejected instead of being
//! decoded into some generic shape.

use crate::error::{DefluxError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Sensor families with a known state shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    #[serde(rename = "ZHATemperature")]
    Temperature,
    #[serde(rename = "ZHAHumidity")]
    Humidity,
    #[serde(rename = "ZHAPressure")]
    Pressure,
    #[serde(rename = "ZHAFire")]
    Fire,
    #[serde(rename = "ZHAWater")]
    Water,
    #[serde(rename = "ZHASwitch")]
    Switch,
    #[serde(rename = "ZHAPresence")]
    Presence,
    #[serde(rename = "CLIPPresence")]
    ClipPresence,
    #[serde(rename = "ZHALightLevel")]
    LightLevel,
    #[serde(rename = "ZHAVibration")]
    Vibration,
    #[serde(rename = "ZHAOpenClose")]
    OpenClose,
    #[serde(rename = "ZHACarbonMonoxide")]
    CarbonMonoxide,
    #[serde(rename = "Daylight")]
    Daylight,
}

impl SensorType {
    /// All supported sensor types
    pub const ALL: [SensorType; 13] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Pressure,
        SensorType::Fire,
        SensorType::Water,
        SensorType::Switch,
        SensorType::Presence,
        SensorType::ClipPresence,
        SensorType::LightLevel,
        SensorType::Vibration,
        SensorType::OpenClose,
        SensorType::CarbonMonoxide,
        SensorType::Daylight,
    ];

    /// Map a gateway type tag to a sensor type
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_tag() == tag)
    }

    /// Gateway type tag
    pub fn as_tag(&self) -> &'static str {
        match self {
            SensorType::Temperature => "ZHATemperature",
            SensorType::Humidity => "ZHAHumidity",
            SensorType::Pressure => "ZHAPressure",
            SensorType::Fire => "ZHAFire",
            SensorType::Water => "ZHAWater",
            SensorType::Switch => "ZHASwitch",
            SensorType::Presence => "ZHAPresence",
            SensorType::ClipPresence => "CLIPPresence",
            SensorType::LightLevel => "ZHALightLevel",
            SensorType::Vibration => "ZHAVibration",
            SensorType::OpenClose => "ZHAOpenClose",
            SensorType::CarbonMonoxide => "ZHACarbonMonoxide",
            SensorType::Daylight => "Daylight",
        }
    }

    /// Decode a raw state payload into the shape of this sensor type
    pub fn decode_state(&self, raw: &Value) -> Result<DecodedState> {
        let state = match self {
            SensorType::Temperature => DecodedState::Temperature(self.parse(raw)?),
            SensorType::Humidity => DecodedState::Humidity(self.parse(raw)?),
            SensorType::Pressure => DecodedState::Pressure(self.parse(raw)?),
            SensorType::Fire => DecodedState::Fire(self.parse(raw)?),
            SensorType::Water => DecodedState::Water(self.parse(raw)?),
            SensorType::Switch => DecodedState::Switch(self.parse(raw)?),
            SensorType::Presence => DecodedState::Presence(self.parse(raw)?),
            SensorType::ClipPresence => DecodedState::ClipPresence(self.parse(raw)?),
            SensorType::LightLevel => DecodedState::LightLevel(self.parse(raw)?),
            SensorType::Vibration => DecodedState::Vibration(self.parse(raw)?),
            SensorType::OpenClose => DecodedState::OpenClose(self.parse(raw)?),
            SensorType::CarbonMonoxide => DecodedState::CarbonMonoxide(self.parse(raw)?),
            SensorType::Daylight => DecodedState::Daylight(self.parse(raw)?),
        };
        Ok(state)
    }

    fn parse<'a, T: Deserialize<'a>>(&self, raw: &'a Value) -> Result<T> {
        T::deserialize(raw).map_err(|e| DefluxError::malformed_payload(self.as_tag(), e))
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Temperature in hundredths of a degree Celsius
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub temperature: i32,
}

/// Relative humidity in hundredths of a percent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumidityState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub humidity: i32,
}

/// Air pressure in hPa
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub pressure: i32,
}

/// Smoke detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub fire: bool,
    #[serde(rename = "lowbattery", default)]
    pub low_battery: bool,
    #[serde(default)]
    pub tampered: bool,
}

/// Flood detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub water: bool,
    #[serde(rename = "lowbattery", default)]
    pub low_battery: bool,
    #[serde(default)]
    pub tampered: bool,
}

/// Button or switch press
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    #[serde(rename = "buttonevent")]
    pub button_event: i32,
}

/// Motion/presence sensor, shared by the Zigbee and CLIP families
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub presence: bool,
}

/// Ambient light sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightLevelState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    #[serde(rename = "lightlevel")]
    pub light_level: i32,
    #[serde(default)]
    pub lux: i32,
    #[serde(default)]
    pub dark: bool,
    #[serde(default)]
    pub daylight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibrationState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub vibration: bool,
}

/// Door/window contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCloseState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarbonMonoxideState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    #[serde(rename = "carbonmonoxide")]
    pub carbon_monoxide: bool,
    #[serde(rename = "lowbattery", default)]
    pub low_battery: bool,
    #[serde(default)]
    pub tampered: bool,
}

/// Gateway's virtual daylight sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaylightState {
    #[serde(rename = "lastupdated", default)]
    pub last_updated: String,
    pub daylight: bool,
    #[serde(default)]
    pub status: i32,
}

/// Decoded state of one event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedState {
    Temperature(TemperatureState),
    Humidity(HumidityState),
    Pressure(PressureState),
    Fire(FireState),
    Water(WaterState),
    Switch(SwitchState),
    Presence(PresenceState),
    ClipPresence(PresenceState),
    LightLevel(LightLevelState),
    Vibration(VibrationState),
    OpenClose(OpenCloseState),
    CarbonMonoxide(CarbonMonoxideState),
    Daylight(DaylightState),
    /// Event without resource state, e.g. a battery or config update
    Empty,
}

/// Value of a single time series field
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v.into())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

/// Time series fields keyed by name
pub type Fields = BTreeMap<String, FieldValue>;

fn fields<const N: usize>(pairs: [(&str, FieldValue); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn hundredths(value: i32) -> FieldValue {
    FieldValue::Float(f64::from(value) / 100.0)
}

impl DecodedState {
    /// Sensor type this state was decoded as, `None` for [`DecodedState::Empty`]
    pub fn sensor_type(&self) -> Option<SensorType> {
        let t = match self {
            DecodedState::Temperature(_) => SensorType::Temperature,
            DecodedState::Humidity(_) => SensorType::Humidity,
            DecodedState::Pressure(_) => SensorType::Pressure,
            DecodedState::Fire(_) => SensorType::Fire,
            DecodedState::Water(_) => SensorType::Water,
            DecodedState::Switch(_) => SensorType::Switch,
            DecodedState::Presence(_) => SensorType::Presence,
            DecodedState::ClipPresence(_) => SensorType::ClipPresence,
            DecodedState::LightLevel(_) => SensorType::LightLevel,
            DecodedState::Vibration(_) => SensorType::Vibration,
            DecodedState::OpenClose(_) => SensorType::OpenClose,
            DecodedState::CarbonMonoxide(_) => SensorType::CarbonMonoxide,
            DecodedState::Daylight(_) => SensorType::Daylight,
            DecodedState::Empty => return None,
        };
        Some(t)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DecodedState::Empty)
    }

    /// Gateway timestamp of the state change
    pub fn last_updated(&self) -> Option<&str> {
        let ts = match self {
            DecodedState::Temperature(s) => &s.last_updated,
            DecodedState::Humidity(s) => &s.last_updated,
            DecodedState::Pressure(s) => &s.last_updated,
            DecodedState::Fire(s) => &s.last_updated,
            DecodedState::Water(s) => &s.last_updated,
            DecodedState::Switch(s) => &s.last_updated,
            DecodedState::Presence(s) | DecodedState::ClipPresence(s) => &s.last_updated,
            DecodedState::LightLevel(s) => &s.last_updated,
            DecodedState::Vibration(s) => &s.last_updated,
            DecodedState::OpenClose(s) => &s.last_updated,
            DecodedState::CarbonMonoxide(s) => &s.last_updated,
            DecodedState::Daylight(s) => &s.last_updated,
            DecodedState::Empty => return None,
        };
        Some(ts.as_str())
    }

    /// Time series fields in human units, `None` for [`DecodedState::Empty`].
    ///
    /// Temperature and humidity arrive in hundredths and are scaled here.
    /// Pressure is already in hPa and passes through unchanged.
    pub fn fields(&self) -> Option<Fields> {
        let f = match self {
            DecodedState::Temperature(s) => fields([("temperature", hundredths(s.temperature))]),
            DecodedState::Humidity(s) => fields([("humidity", hundredths(s.humidity))]),
            DecodedState::Pressure(s) => fields([("pressure", s.pressure.into())]),
            DecodedState::Fire(s) => fields([
                ("fire", s.fire.into()),
                ("lowbattery", s.low_battery.into()),
                ("tampered", s.tampered.into()),
            ]),
            DecodedState::Water(s) => fields([
                ("water", s.water.into()),
                ("lowbattery", s.low_battery.into()),
                ("tampered", s.tampered.into()),
            ]),
            DecodedState::Switch(s) => fields([("buttonevent", s.button_event.into())]),
            DecodedState::Presence(s) | DecodedState::ClipPresence(s) => {
                fields([("presence", s.presence.into())])
            }
            DecodedState::LightLevel(s) => fields([
                ("daylight", s.daylight.into()),
                ("dark", s.dark.into()),
                ("lightlevel", s.light_level.into()),
                ("lux", s.lux.into()),
            ]),
            DecodedState::Vibration(s) => fields([("vibration", s.vibration.into())]),
            DecodedState::OpenClose(s) => fields([("open", s.open.into())]),
            DecodedState::CarbonMonoxide(s) => fields([
                ("CO", s.carbon_monoxide.into()),
                ("lowbattery", s.low_battery.into()),
                ("tampered", s.tampered.into()),
            ]),
            DecodedState::Daylight(s) => fields([
                ("daylight", s.daylight.into()),
                ("status", s.status.into()),
            ]),
            DecodedState::Empty => return None,
        };
        Some(f)
    }
}
