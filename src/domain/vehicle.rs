//! Vehicle identity aggregated from telemetry topics

use serde::Serialize;

/// One vehicle's identity, serialized as the Home Assistant `device` object
/// shared by every discovery entity the bridge announces for it.
///
/// Fields are filled piecemeal while attribute messages are collected.
/// `finalize` must run exactly once before any entity is built from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Vehicle {
    /// Car id from the topic path. Keys the aggregation map, not part of
    /// the serialized device object.
    #[serde(skip)]
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suggested_area: String,
    #[serde(rename = "sw_version", skip_serializing_if = "String::is_empty")]
    pub software_version: String,
}

impl Vehicle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Identifier path `{tm_prefix}/cars/{id}`, set by `finalize`. Doubles
    /// as the root of every state topic.
    pub fn identifier(&self) -> &str {
        self.identifiers.first().map(String::as_str).unwrap_or_default()
    }

    /// Fills the fields Home Assistant expects on every device, defaulting
    /// the name for vehicles that never reported one.
    pub fn finalize(&mut self, tm_prefix: &str) {
        if self.name.is_empty() {
            self.name = "Tesla".to_string();
        }
        self.identifiers = vec![format!("{}/cars/{}", tm_prefix, self.id)];
        self.manufacturer = "Tesla".to_string();
        self.suggested_area = "Garage".to_string();
    }

    /// Telemetry topic for one of this vehicle's attributes.
    pub fn state_topic(&self, suffix: &str) -> String {
        format!("{}{}", self.identifier(), suffix)
    }

    /// Entity id, unique per vehicle and suffix. The broker path separators
    /// are flattened so the id stays a single discovery topic segment.
    pub fn unique_id(&self, suffix: &str) -> String {
        format!("{}{}", self.identifier().replace('/', "_"), suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_fills_defaults() {
        let mut vehicle = Vehicle::new("1");
        vehicle.finalize("teslamate");

        assert_eq!(vehicle.name, "Tesla");
        assert_eq!(vehicle.identifiers, vec!["teslamate/cars/1".to_string()]);
        assert_eq!(vehicle.manufacturer, "Tesla");
        assert_eq!(vehicle.suggested_area, "Garage");
    }

    #[test]
    fn test_finalize_keeps_reported_name() {
        let mut vehicle = Vehicle::new("2");
        vehicle.name = "Blue Lightning".to_string();
        vehicle.finalize("teslamate");

        assert_eq!(vehicle.name, "Blue Lightning");
    }

    #[test]
    fn test_topic_and_id_derivation() {
        let mut vehicle = Vehicle::new("1");
        vehicle.finalize("teslamate");

        assert_eq!(vehicle.identifier(), "teslamate/cars/1");
        assert_eq!(vehicle.state_topic("/battery_level"), "teslamate/cars/1/battery_level");
        assert_eq!(vehicle.unique_id("/battery"), "teslamate_cars_1/battery");
    }

    #[test]
    fn test_device_json_omits_empty_fields() {
        let mut vehicle = Vehicle::new("3");
        vehicle.model = "Model 3".to_string();

        let json = serde_json::to_value(&vehicle).unwrap();
        assert_eq!(json, serde_json::json!({ "model": "Model 3" }));
    }

    #[test]
    fn test_device_json_after_finalize() {
        let mut vehicle = Vehicle::new("1");
        vehicle.software_version = "2024.8.7".to_string();
        vehicle.finalize("teslamate");

        let json = serde_json::to_string(&vehicle).unwrap();
        assert_eq!(
            json,
            r#"{"identifiers":["teslamate/cars/1"],"manufacturer":"Tesla","name":"Tesla","suggested_area":"Garage","sw_version":"2024.8.7"}"#
        );
    }
}
