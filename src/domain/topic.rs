//! Topic routing for TeslaMate telemetry topics

/// One telemetry topic resolved to a vehicle attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarTopic<'a> {
    pub car_id: &'a str,
    pub attribute: &'a str,
}

/// Matches a topic against `{prefix}/cars/{id}/{attribute}`.
///
/// The prefix comparison is literal and anchored at the start of the topic,
/// so other namespaces on a shared broker are never misread. The id must be
/// all digits and the attribute a single `[0-9A-Za-z_]+` segment ending the
/// topic. Anything else is not an error, just traffic that isn't ours.
pub fn route<'a>(prefix: &str, topic: &'a str) -> Option<CarTopic<'a>> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix("/cars/")?;
    let (car_id, attribute) = rest.split_once('/')?;

    if car_id.is_empty() || !car_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if attribute.is_empty() || !attribute.bytes().all(is_word_byte) {
        return None;
    }

    Some(CarTopic { car_id, attribute })
}

fn is_word_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_attribute_topic() {
        let car = route("teslamate", "teslamate/cars/1/display_name").unwrap();
        assert_eq!(car.car_id, "1");
        assert_eq!(car.attribute, "display_name");

        let car = route("teslamate", "teslamate/cars/42/version").unwrap();
        assert_eq!(car.car_id, "42");
        assert_eq!(car.attribute, "version");
    }

    #[test]
    fn test_route_prefix_containing_slash() {
        let car = route("tm/prod", "tm/prod/cars/7/model").unwrap();
        assert_eq!(car.car_id, "7");
        assert_eq!(car.attribute, "model");
    }

    #[test]
    fn test_route_rejects_other_namespaces() {
        assert!(route("teslamate", "other/cars/1/display_name").is_none());
        assert!(route("teslamate", "x/teslamate/cars/1/display_name").is_none());
        assert!(route("teslamate", "teslamatextra/cars/1/display_name").is_none());
    }

    #[test]
    fn test_route_rejects_wrong_shape() {
        // Missing attribute segment
        assert!(route("teslamate", "teslamate/cars/1").is_none());
        // Extra trailing segment
        assert!(route("teslamate", "teslamate/cars/1/location/extra").is_none());
        // Missing cars segment
        assert!(route("teslamate", "teslamate/1/display_name").is_none());
        // Empty id
        assert!(route("teslamate", "teslamate/cars//display_name").is_none());
    }

    #[test]
    fn test_route_rejects_non_digit_id() {
        assert!(route("teslamate", "teslamate/cars/one/display_name").is_none());
        assert!(route("teslamate", "teslamate/cars/1a/display_name").is_none());
    }

    #[test]
    fn test_route_rejects_non_word_attribute() {
        assert!(route("teslamate", "teslamate/cars/1/display-name").is_none());
        assert!(route("teslamate", "teslamate/cars/1/state!").is_none());
    }
}
