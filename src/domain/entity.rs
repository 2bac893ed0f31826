//! Home Assistant MQTT discovery entity payloads
//!
//! Field sets and vocabularies follow the Home Assistant MQTT integration's
//! `sensor`, `binary_sensor` and `device_tracker` platforms. Field order in
//! each struct is the serialization order on the wire, and every optional
//! field is omitted rather than serialized empty.

use crate::domain::vehicle::Vehicle;
use serde::Serialize;

/// Discovery payload for a numeric or textual sensor.
#[derive(Debug, Clone, Serialize)]
pub struct Sensor<'a> {
    pub device: &'a Vehicle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<SensorDeviceClass>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub icon: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<StateClass>,
    pub state_topic: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unique_id: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub unit_of_measurement: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub value_template: &'static str,
}

/// Discovery payload for an on/off sensor.
#[derive(Debug, Clone, Serialize)]
pub struct BinarySensor<'a> {
    pub device: &'a Vehicle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<BinarySensorDeviceClass>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub icon: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub name: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub payload_off: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub payload_on: &'static str,
    pub state_topic: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unique_id: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub value_template: &'static str,
}

/// Discovery payload for the per-vehicle location tracker.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceTracker<'a> {
    pub device: &'a Vehicle,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub icon: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub json_attributes_topic: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub name: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub payload_home: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub payload_not_home: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    pub state_topic: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unique_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value_template: String,
}

/// One discovery-publishable entity.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Entity<'a> {
    Sensor(Sensor<'a>),
    BinarySensor(BinarySensor<'a>),
    DeviceTracker(DeviceTracker<'a>),
}

impl Entity<'_> {
    /// Discovery platform this entity publishes under.
    pub fn component(&self) -> &'static str {
        match self {
            Entity::Sensor(_) => "sensor",
            Entity::BinarySensor(_) => "binary_sensor",
            Entity::DeviceTracker(_) => "device_tracker",
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Entity::Sensor(sensor) => &sensor.unique_id,
            Entity::BinarySensor(sensor) => &sensor.unique_id,
            Entity::DeviceTracker(tracker) => &tracker.unique_id,
        }
    }

    /// Retained discovery topic `{prefix}/{component}/{unique_id}/config`.
    pub fn config_topic(&self, discovery_prefix: &str) -> String {
        format!("{}/{}/{}/config", discovery_prefix, self.component(), self.unique_id())
    }
}

/// Sensor `device_class` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorDeviceClass {
    ApparentPower,
    Aqi,
    Battery,
    CarbonDioxide,
    CarbonMonoxide,
    Current,
    Date,
    Duration,
    Energy,
    Frequency,
    Gas,
    Humidity,
    Illuminance,
    Monetary,
    NitrogenDioxide,
    NitrogenMonoxide,
    NitrousOxide,
    Ozone,
    Pm1,
    Pm10,
    Pm25,
    PowerFactor,
    Power,
    Pressure,
    ReactivePower,
    SignalStrength,
    SulphurDioxide,
    Temperature,
    Timestamp,
    VolatileOrganicCompounds,
    Voltage,
}

/// Binary sensor `device_class` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinarySensorDeviceClass {
    Battery,
    BatteryCharging,
    CarbonMonoxide,
    Cold,
    Connectivity,
    Door,
    GarageDoor,
    Gas,
    Heat,
    Light,
    Lock,
    Moisture,
    Motion,
    Moving,
    Occupancy,
    Opening,
    Plug,
    Power,
    Presence,
    Problem,
    Running,
    Safety,
    Smoke,
    Sound,
    Tamper,
    Update,
    Vibration,
    Window,
}

/// Sensor `state_class` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

/// Device tracker `source_type` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Bluetooth,
    BluetoothLe,
    Gps,
    Router,
}
