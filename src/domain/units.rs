//! Unit system and range type preferences
//!
//! TeslaMate publishes metric values. Home Assistant renders whatever unit a
//! discovery message declares, so imperial preferences pair the declared unit
//! with a Jinja template that converts the metric payload at display time.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Applied wherever a metric payload only needs rounding.
pub const ROUNDING_VALUE_TEMPLATE: &str = "{{ value | round(1) }}";

const DISTANCE_LONG_IMPERIAL_TEMPLATE: &str = "{{ (value | float(0) / 1.609344) | round(1) }}";
const DISTANCE_SHORT_IMPERIAL_TEMPLATE: &str = "{{ (value | float(0) * 3.280839) | round(1) }}";
const PRESSURE_IMPERIAL_TEMPLATE: &str = "{{ (value | float(0) * 14.503773) | round(1) }}";

/// Measurement system for distance, speed and pressure entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemOfMeasurement {
    Imperial,
    Metric,
}

impl SystemOfMeasurement {
    pub fn distance_long_units(self) -> &'static str {
        match self {
            SystemOfMeasurement::Imperial => "mi",
            SystemOfMeasurement::Metric => "km",
        }
    }

    pub fn distance_long_value_template(self) -> &'static str {
        match self {
            SystemOfMeasurement::Imperial => DISTANCE_LONG_IMPERIAL_TEMPLATE,
            SystemOfMeasurement::Metric => ROUNDING_VALUE_TEMPLATE,
        }
    }

    pub fn distance_short_units(self) -> &'static str {
        match self {
            SystemOfMeasurement::Imperial => "ft",
            SystemOfMeasurement::Metric => "m",
        }
    }

    pub fn distance_short_value_template(self) -> &'static str {
        match self {
            SystemOfMeasurement::Imperial => DISTANCE_SHORT_IMPERIAL_TEMPLATE,
            SystemOfMeasurement::Metric => ROUNDING_VALUE_TEMPLATE,
        }
    }

    pub fn speed_units(self) -> &'static str {
        match self {
            SystemOfMeasurement::Imperial => "mph",
            SystemOfMeasurement::Metric => "kph",
        }
    }

    /// Speed payloads are km/h, so the long-distance conversion applies.
    pub fn speed_value_template(self) -> &'static str {
        self.distance_long_value_template()
    }

    pub fn pressure_units(self) -> &'static str {
        match self {
            SystemOfMeasurement::Imperial => "psi",
            SystemOfMeasurement::Metric => "bar",
        }
    }

    pub fn pressure_value_template(self) -> &'static str {
        match self {
            SystemOfMeasurement::Imperial => PRESSURE_IMPERIAL_TEMPLATE,
            SystemOfMeasurement::Metric => ROUNDING_VALUE_TEMPLATE,
        }
    }
}

impl Default for SystemOfMeasurement {
    fn default() -> Self {
        SystemOfMeasurement::Imperial
    }
}

impl FromStr for SystemOfMeasurement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imperial" => Ok(SystemOfMeasurement::Imperial),
            "metric" => Ok(SystemOfMeasurement::Metric),
            _ => Err("must be one of imperial, metric".to_string()),
        }
    }
}

impl fmt::Display for SystemOfMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemOfMeasurement::Imperial => write!(f, "imperial"),
            SystemOfMeasurement::Metric => write!(f, "metric"),
        }
    }
}

/// Which battery range estimate the Range sensor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    Estimated,
    Ideal,
    Rated,
}

impl RangeType {
    /// Topic prefix of the matching `{prefix}_battery_range_km` attribute.
    pub fn prefix(self) -> &'static str {
        match self {
            RangeType::Estimated => "est",
            RangeType::Ideal => "ideal",
            RangeType::Rated => "rated",
        }
    }
}

impl Default for RangeType {
    fn default() -> Self {
        RangeType::Rated
    }
}

impl FromStr for RangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "estimated" => Ok(RangeType::Estimated),
            "ideal" => Ok(RangeType::Ideal),
            "rated" => Ok(RangeType::Rated),
            _ => Err("must be one of estimated, ideal, rated".to_string()),
        }
    }
}

impl fmt::Display for RangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeType::Estimated => write!(f, "estimated"),
            RangeType::Ideal => write!(f, "ideal"),
            RangeType::Rated => write!(f, "rated"),
        }
    }
}

/// Resolved unit preferences applied when instantiating the entity catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Units {
    pub distance: SystemOfMeasurement,
    pub pressure: SystemOfMeasurement,
    pub range_type: RangeType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_units_round_in_place() {
        let metric = SystemOfMeasurement::Metric;
        assert_eq!(metric.distance_long_units(), "km");
        assert_eq!(metric.distance_short_units(), "m");
        assert_eq!(metric.speed_units(), "kph");
        assert_eq!(metric.pressure_units(), "bar");
        assert_eq!(metric.distance_long_value_template(), ROUNDING_VALUE_TEMPLATE);
        assert_eq!(metric.distance_short_value_template(), ROUNDING_VALUE_TEMPLATE);
        assert_eq!(metric.speed_value_template(), ROUNDING_VALUE_TEMPLATE);
        assert_eq!(metric.pressure_value_template(), ROUNDING_VALUE_TEMPLATE);
    }

    #[test]
    fn test_imperial_units_convert_at_display_time() {
        let imperial = SystemOfMeasurement::Imperial;
        assert_eq!(imperial.distance_long_units(), "mi");
        assert_eq!(
            imperial.distance_long_value_template(),
            "{{ (value | float(0) / 1.609344) | round(1) }}"
        );
        assert_eq!(imperial.distance_short_units(), "ft");
        assert_eq!(
            imperial.distance_short_value_template(),
            "{{ (value | float(0) * 3.280839) | round(1) }}"
        );
        assert_eq!(imperial.speed_units(), "mph");
        assert_eq!(imperial.speed_value_template(), imperial.distance_long_value_template());
        assert_eq!(imperial.pressure_units(), "psi");
        assert_eq!(
            imperial.pressure_value_template(),
            "{{ (value | float(0) * 14.503773) | round(1) }}"
        );
    }

    #[test]
    fn test_range_type_topic_prefix() {
        assert_eq!(RangeType::Estimated.prefix(), "est");
        assert_eq!(RangeType::Ideal.prefix(), "ideal");
        assert_eq!(RangeType::Rated.prefix(), "rated");
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        assert_eq!(
            "km".parse::<SystemOfMeasurement>().unwrap_err(),
            "must be one of imperial, metric"
        );
        assert_eq!(
            "est".parse::<RangeType>().unwrap_err(),
            "must be one of estimated, ideal, rated"
        );
        assert_eq!("metric".parse::<SystemOfMeasurement>().unwrap(), SystemOfMeasurement::Metric);
        assert_eq!("estimated".parse::<RangeType>().unwrap(), RangeType::Estimated);
    }

    #[test]
    fn test_defaults() {
        let units = Units::default();
        assert_eq!(units.distance, SystemOfMeasurement::Imperial);
        assert_eq!(units.pressure, SystemOfMeasurement::Imperial);
        assert_eq!(units.range_type, RangeType::Rated);
    }
}
