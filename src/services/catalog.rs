//! Static entity catalog and per-vehicle discovery publishing
//!
//! One catalog entry per Home Assistant entity the bridge announces.
//! Entries are templates: instantiating one for a vehicle derives the state
//! topic, unique id and unit/template pair from the vehicle's identity and
//! the configured units. Catalog order is publish order.

use crate::domain::entity::{
    BinarySensor, BinarySensorDeviceClass, DeviceTracker, Entity, Sensor, SensorDeviceClass,
    SourceType, StateClass,
};
use crate::domain::units::{Units, ROUNDING_VALUE_TEMPLATE};
use crate::domain::vehicle::Vehicle;
use crate::io::mqtt::{Outcome, PublishError, Session};
use tokio::sync::watch;
use tracing::info;

const CHARGING_VALUE_TEMPLATE: &str = r#"{{ "ON" if value == "charging" else "OFF" }}"#;

const CENTER_DISPLAY_VALUE_TEMPLATE: &str = r#"{% if value == "0" %}Off{% elif value == "2" %}Standby{% elif value == "3" %}Charging{% elif value == "4" %}On{% elif value == "5" %}Big Charging{% elif value == "6" %}Ready to Unlock{% elif value == "7" %}Sentry Mode{% elif value == "8" %}Dog Mode{% elif value == "9" %}Media{% else %}Unknown{% endif %}"#;

/// How a sensor template resolves its unit of measurement.
#[derive(Debug, Clone, Copy)]
enum Unit {
    None,
    Fixed(&'static str),
    DistanceShort,
    DistanceLong,
    Speed,
    Pressure,
}

/// How a sensor template resolves its value template.
#[derive(Debug, Clone, Copy)]
enum ValueTemplate {
    None,
    Fixed(&'static str),
    Rounding,
    DistanceShort,
    DistanceLong,
    Speed,
    Pressure,
}

/// State topic suffix, fixed or derived from the configured range type.
#[derive(Debug, Clone, Copy)]
enum StateSuffix {
    Fixed(&'static str),
    BatteryRange,
}

struct SensorTemplate {
    name: &'static str,
    device_class: Option<SensorDeviceClass>,
    icon: &'static str,
    state_class: Option<StateClass>,
    state: StateSuffix,
    id_suffix: &'static str,
    unit: Unit,
    template: ValueTemplate,
}

impl SensorTemplate {
    const fn new(name: &'static str, suffix: &'static str) -> Self {
        Self {
            name,
            device_class: None,
            icon: "",
            state_class: None,
            state: StateSuffix::Fixed(suffix),
            id_suffix: suffix,
            unit: Unit::None,
            template: ValueTemplate::None,
        }
    }

    const fn device_class(mut self, device_class: SensorDeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }

    const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = icon;
        self
    }

    const fn state_class(mut self, state_class: StateClass) -> Self {
        self.state_class = Some(state_class);
        self
    }

    /// Unique id suffix when it differs from the state topic suffix.
    const fn id(mut self, suffix: &'static str) -> Self {
        self.id_suffix = suffix;
        self
    }

    const fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    const fn template(mut self, template: ValueTemplate) -> Self {
        self.template = template;
        self
    }

    /// Reads whichever battery range attribute the range type selects.
    const fn battery_range(mut self) -> Self {
        self.state = StateSuffix::BatteryRange;
        self
    }
}

struct BinarySensorTemplate {
    name: &'static str,
    device_class: Option<BinarySensorDeviceClass>,
    icon: &'static str,
    payload_off: &'static str,
    payload_on: &'static str,
    state_suffix: &'static str,
    id_suffix: &'static str,
    template: &'static str,
}

impl BinarySensorTemplate {
    /// Defaults to the `false`/`true` payload mapping most attributes use.
    const fn new(name: &'static str, suffix: &'static str) -> Self {
        Self {
            name,
            device_class: None,
            icon: "",
            payload_off: "false",
            payload_on: "true",
            state_suffix: suffix,
            id_suffix: suffix,
            template: "",
        }
    }

    const fn device_class(mut self, device_class: BinarySensorDeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }

    const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = icon;
        self
    }

    const fn id(mut self, suffix: &'static str) -> Self {
        self.id_suffix = suffix;
        self
    }

    const fn payloads(mut self, off: &'static str, on: &'static str) -> Self {
        self.payload_off = off;
        self.payload_on = on;
        self
    }

    const fn template(mut self, template: &'static str) -> Self {
        self.template = template;
        self
    }
}

enum EntityTemplate {
    Sensor(SensorTemplate),
    BinarySensor(BinarySensorTemplate),
    DeviceTracker,
}

/// Every entity announced per vehicle.
static CATALOG: &[EntityTemplate] = &[
    EntityTemplate::Sensor(
        SensorTemplate::new("Charge Current Request", "/charge_current_request")
            .device_class(SensorDeviceClass::Current)
            .unit(Unit::Fixed("A")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Charge Current Request (Max)", "/charge_current_request_max")
            .device_class(SensorDeviceClass::Current)
            .unit(Unit::Fixed("A")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Energy Added", "/charge_energy_added")
            .device_class(SensorDeviceClass::Energy)
            .unit(Unit::Fixed("kWh"))
            .template(ValueTemplate::Rounding),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Limit", "/charge_limit_soc")
            .icon("mdi:battery-charging-90")
            .state_class(StateClass::Measurement)
            .id("/limit")
            .unit(Unit::Fixed("%")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Charger Current", "/charger_actual_current")
            .device_class(SensorDeviceClass::Current)
            .id("/charger_current")
            .unit(Unit::Fixed("A")),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Charging", "/state")
            .device_class(BinarySensorDeviceClass::BatteryCharging)
            .id("/charging")
            .payloads("", "")
            .template(CHARGING_VALUE_TEMPLATE),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Plug", "/plugged_in")
            .device_class(BinarySensorDeviceClass::Plug)
            .id("/plug"),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Charger Phases", "/charger_phases").icon("mdi:sine-wave"),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Charger Power", "/charger_power")
            .device_class(SensorDeviceClass::Power)
            .unit(Unit::Fixed("kW")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Charger Voltage", "/charger_voltage")
            .device_class(SensorDeviceClass::Voltage)
            .unit(Unit::Fixed("V")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Scheduled Start Time", "/scheduled_charging_start_time")
            .device_class(SensorDeviceClass::Timestamp)
            .id("/start_time"),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Time to Charged", "/time_to_full_charge")
            .device_class(SensorDeviceClass::Duration)
            .icon("mdi:timer")
            .id("/time_to_charged")
            .unit(Unit::Fixed("h")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Inside Temp", "/inside_temp")
            .device_class(SensorDeviceClass::Temperature)
            .state_class(StateClass::Measurement)
            .unit(Unit::Fixed("°C"))
            .template(ValueTemplate::Rounding),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Climate", "/is_climate_on")
            .device_class(BinarySensorDeviceClass::Running)
            .icon("mdi:fan")
            .id("/climate"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Preconditioning", "/is_preconditioning")
            .device_class(BinarySensorDeviceClass::Running)
            .icon("mdi:fan")
            .id("/preconditioning"),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Outside Temp", "/outside_temp")
            .device_class(SensorDeviceClass::Temperature)
            .state_class(StateClass::Measurement)
            .unit(Unit::Fixed("°C"))
            .template(ValueTemplate::Rounding),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Elevation", "/elevation")
            .icon("mdi:image-filter-hdr")
            .unit(Unit::DistanceShort)
            .template(ValueTemplate::DistanceShort),
    ),
    EntityTemplate::Sensor(SensorTemplate::new("Geofence", "/geofence").icon("mdi:earth")),
    EntityTemplate::Sensor(
        SensorTemplate::new("Heading", "/heading").icon("mdi:compass").unit(Unit::Fixed("°")),
    ),
    EntityTemplate::DeviceTracker,
    EntityTemplate::Sensor(
        SensorTemplate::new("Power", "/power")
            .device_class(SensorDeviceClass::Power)
            .unit(Unit::Fixed("kW")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Speed", "/speed")
            .icon("mdi:speedometer")
            .unit(Unit::Speed)
            .template(ValueTemplate::Speed),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Battery", "/battery_level")
            .device_class(SensorDeviceClass::Battery)
            .state_class(StateClass::Measurement)
            .id("/battery")
            .unit(Unit::Fixed("%")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Usable Battery", "/usable_battery_level")
            .device_class(SensorDeviceClass::Battery)
            .state_class(StateClass::Measurement)
            .id("/usable_battery")
            .unit(Unit::Fixed("%")),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Center Display", "/center_display_state")
            .icon("mdi:television")
            .id("/center_display")
            .template(ValueTemplate::Fixed(CENTER_DISPLAY_VALUE_TEMPLATE)),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Charge Port", "/charge_port_door_open")
            .device_class(BinarySensorDeviceClass::Door)
            .icon("mdi:ev-plug-tesla")
            .id("/charge_port"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Doors", "/doors_open")
            .device_class(BinarySensorDeviceClass::Door)
            .icon("mdi:car-door")
            .id("/doors"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Door (Driver Front)", "/driver_front_door_open")
            .device_class(BinarySensorDeviceClass::Door)
            .icon("mdi:car")
            .id("/door_driver_front"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Door (Driver Rear)", "/driver_rear_door_open")
            .device_class(BinarySensorDeviceClass::Door)
            .icon("mdi:car")
            .id("/door_driver_rear"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Frunk", "/frunk_open")
            .device_class(BinarySensorDeviceClass::Door)
            .icon("mdi:car")
            .id("/frunk"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Health", "/healthy")
            .device_class(BinarySensorDeviceClass::Problem)
            .icon("mdi:heart-pulse")
            .id("/health")
            .payloads("true", "false"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Locked", "/locked")
            .device_class(BinarySensorDeviceClass::Lock)
            .payloads("true", "false"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Occupied", "/is_user_present")
            .device_class(BinarySensorDeviceClass::Occupancy)
            .icon("mdi:account")
            .id("/occupied"),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Odometer", "/odometer")
            .icon("mdi:counter")
            .state_class(StateClass::TotalIncreasing)
            .unit(Unit::DistanceLong)
            .template(ValueTemplate::DistanceLong),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Door (Passenger Front)", "/passenger_front_door_open")
            .device_class(BinarySensorDeviceClass::Door)
            .icon("mdi:car")
            .id("/door_passenger_front"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Door (Passenger Rear)", "/passenger_rear_door_open")
            .device_class(BinarySensorDeviceClass::Door)
            .icon("mdi:car")
            .id("/door_passenger_rear"),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Range", "/range")
            .icon("mdi:map-marker-distance")
            .state_class(StateClass::Measurement)
            .battery_range()
            .unit(Unit::DistanceLong)
            .template(ValueTemplate::DistanceLong),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Sentry Mode", "/sentry_mode").icon("mdi:cctv"),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Shift State", "/shift_state").icon("mdi:car-shift-pattern"),
    ),
    EntityTemplate::Sensor(SensorTemplate::new("State", "/state").icon("mdi:car-connected")),
    EntityTemplate::Sensor(
        SensorTemplate::new("Tire Pressure (Front Left)", "/tpms_pressure_fl")
            .device_class(SensorDeviceClass::Pressure)
            .icon("mdi:gauge")
            .state_class(StateClass::Measurement)
            .id("/tire_pressure_front_left")
            .unit(Unit::Pressure)
            .template(ValueTemplate::Pressure),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Tire Pressure (Front Right)", "/tpms_pressure_fr")
            .device_class(SensorDeviceClass::Pressure)
            .icon("mdi:gauge")
            .state_class(StateClass::Measurement)
            .id("/tire_pressure_front_right")
            .unit(Unit::Pressure)
            .template(ValueTemplate::Pressure),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Tire Pressure (Rear Left)", "/tpms_pressure_rl")
            .device_class(SensorDeviceClass::Pressure)
            .icon("mdi:gauge")
            .state_class(StateClass::Measurement)
            .id("/tire_pressure_rear_left")
            .unit(Unit::Pressure)
            .template(ValueTemplate::Pressure),
    ),
    EntityTemplate::Sensor(
        SensorTemplate::new("Tire Pressure (Rear Right)", "/tpms_pressure_rr")
            .device_class(SensorDeviceClass::Pressure)
            .icon("mdi:gauge")
            .state_class(StateClass::Measurement)
            .id("/tire_pressure_rear_right")
            .unit(Unit::Pressure)
            .template(ValueTemplate::Pressure),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Tire Soft (Front Left)", "/tpms_soft_warning_fl")
            .device_class(BinarySensorDeviceClass::Problem)
            .icon("mdi:car-tire-alert")
            .id("/tire_soft_front_left"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Tire Soft (Front Right)", "/tpms_soft_warning_fr")
            .device_class(BinarySensorDeviceClass::Problem)
            .icon("mdi:car-tire-alert")
            .id("/tire_soft_front_right"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Tire Soft (Rear Left)", "/tpms_soft_warning_rl")
            .device_class(BinarySensorDeviceClass::Problem)
            .icon("mdi:car-tire-alert")
            .id("/tire_soft_rear_left"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Tire Soft (Rear Right)", "/tpms_soft_warning_rr")
            .device_class(BinarySensorDeviceClass::Problem)
            .icon("mdi:car-tire-alert")
            .id("/tire_soft_rear_right"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Trunk", "/trunk_open")
            .device_class(BinarySensorDeviceClass::Door)
            .icon("mdi:car")
            .id("/trunk"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Update", "/update_available")
            .device_class(BinarySensorDeviceClass::Update)
            .id("/update"),
    ),
    EntityTemplate::BinarySensor(
        BinarySensorTemplate::new("Windows", "/windows_open")
            .device_class(BinarySensorDeviceClass::Window)
            .icon("mdi:car-door")
            .id("/windows"),
    ),
    EntityTemplate::Sensor(SensorTemplate::new("Version", "/version").icon("mdi:numeric")),
];

/// Instantiates the full catalog for one finalized vehicle, in publish
/// order. Deterministic: the same vehicle and units always produce the same
/// batch.
pub fn entities<'a>(vehicle: &'a Vehicle, units: Units) -> Vec<Entity<'a>> {
    CATALOG.iter().map(|template| instantiate(template, vehicle, units)).collect()
}

/// Publishes the full discovery catalog for one vehicle.
pub async fn publish_discovery(
    session: &mut Session,
    vehicle: &Vehicle,
    discovery_prefix: &str,
    units: Units,
    cancel: &mut watch::Receiver<bool>,
) -> Result<Outcome<()>, PublishError> {
    info!(vehicle = %vehicle.name, car_id = %vehicle.id, "configuring_vehicle");
    let batch = entities(vehicle, units);
    session.publish(discovery_prefix, &batch, cancel).await
}

fn instantiate<'a>(template: &EntityTemplate, vehicle: &'a Vehicle, units: Units) -> Entity<'a> {
    match template {
        EntityTemplate::Sensor(t) => {
            let state_topic = match t.state {
                StateSuffix::Fixed(suffix) => vehicle.state_topic(suffix),
                StateSuffix::BatteryRange => vehicle
                    .state_topic(&format!("/{}_battery_range_km", units.range_type.prefix())),
            };
            Entity::Sensor(Sensor {
                device: vehicle,
                device_class: t.device_class,
                icon: t.icon,
                name: t.name,
                state_class: t.state_class,
                state_topic,
                unique_id: vehicle.unique_id(t.id_suffix),
                unit_of_measurement: resolve_unit(t.unit, units),
                value_template: resolve_template(t.template, units),
            })
        }
        EntityTemplate::BinarySensor(t) => Entity::BinarySensor(BinarySensor {
            device: vehicle,
            device_class: t.device_class,
            icon: t.icon,
            name: t.name,
            payload_off: t.payload_off,
            payload_on: t.payload_on,
            state_topic: vehicle.state_topic(t.state_suffix),
            unique_id: vehicle.unique_id(t.id_suffix),
            value_template: t.template,
        }),
        EntityTemplate::DeviceTracker => {
            let location_topic = vehicle.state_topic("/location");
            Entity::DeviceTracker(DeviceTracker {
                device: vehicle,
                icon: "mdi:car",
                json_attributes_topic: location_topic.clone(),
                name: "",
                payload_home: "",
                payload_not_home: "",
                source_type: Some(SourceType::Gps),
                state_topic: location_topic,
                unique_id: vehicle.unique_id("/location"),
                value_template: format!(
                    r#"{{{{ "home" if "home" in (states("sensor.{}_geofence") | lower) else "not_home" }}}}"#,
                    snake_case(&vehicle.name)
                ),
            })
        }
    }
}

fn resolve_unit(unit: Unit, units: Units) -> &'static str {
    match unit {
        Unit::None => "",
        Unit::Fixed(unit) => unit,
        Unit::DistanceShort => units.distance.distance_short_units(),
        Unit::DistanceLong => units.distance.distance_long_units(),
        Unit::Speed => units.distance.speed_units(),
        Unit::Pressure => units.pressure.pressure_units(),
    }
}

fn resolve_template(template: ValueTemplate, units: Units) -> &'static str {
    match template {
        ValueTemplate::None => "",
        ValueTemplate::Fixed(template) => template,
        ValueTemplate::Rounding => ROUNDING_VALUE_TEMPLATE,
        ValueTemplate::DistanceShort => units.distance.distance_short_value_template(),
        ValueTemplate::DistanceLong => units.distance.distance_long_value_template(),
        ValueTemplate::Speed => units.distance.speed_value_template(),
        ValueTemplate::Pressure => units.pressure.pressure_value_template(),
    }
}

/// Lowercased snake_case form of a vehicle name, matching the object id
/// Home Assistant derives for the vehicle's geofence sensor.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}
