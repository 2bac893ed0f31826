//! Vehicle discovery by windowed aggregation of telemetry topics
//!
//! TeslaMate retains every per-car attribute it publishes, so a fresh
//! wildcard subscription replays the current state of every vehicle in one
//! burst. Aggregation rides that burst: collect until the subscription goes
//! quiet, then finalize what arrived.

use crate::domain::topic::route;
use crate::domain::vehicle::Vehicle;
use crate::io::mqtt::{cancelled, Outcome, Session, SubscribeError, Subscription};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How long the subscription must stay quiet before the snapshot is
/// considered complete. Every inbound message restarts the window, matched
/// or not.
const IDLE_TIMEOUT: Duration = Duration::from_millis(250);

/// Discovers every vehicle currently publishing identity attributes under
/// `{tm_prefix}/cars/…`, keyed by car id.
///
/// Returns an empty map when shutdown interrupts the listing.
pub async fn list_vehicles(
    session: &mut Session,
    tm_prefix: &str,
    cancel: &mut watch::Receiver<bool>,
) -> Result<BTreeMap<String, Vehicle>, SubscribeError> {
    let filter = format!("{}/#", tm_prefix);
    info!(filter = %filter, "listing_vehicles");

    let mut subscription = match session.subscribe(&filter, cancel).await? {
        Outcome::Completed(subscription) => subscription,
        Outcome::Cancelled => return Ok(BTreeMap::new()),
    };

    let outcome = collect(&mut subscription, tm_prefix, cancel).await;

    // Cleanup only; a failed unsubscribe must not fail the run.
    if let Err(e) = session.unsubscribe(&filter, cancel).await {
        warn!(filter = %filter, error = %e, "unsubscribe_failed");
    }

    match outcome {
        Outcome::Completed(vehicles) => {
            info!(count = vehicles.len(), "vehicles_listed");
            Ok(vehicles)
        }
        Outcome::Cancelled => Ok(BTreeMap::new()),
    }
}

/// Drains the subscription until it stays idle for the full window, merging
/// identity attributes as they arrive.
async fn collect(
    subscription: &mut Subscription,
    tm_prefix: &str,
    cancel: &mut watch::Receiver<bool>,
) -> Outcome<BTreeMap<String, Vehicle>> {
    let mut vehicles = BTreeMap::new();

    loop {
        tokio::select! {
            biased;
            _ = cancelled(cancel) => {
                debug!("vehicle_listing_cancelled");
                return Outcome::Cancelled;
            }
            message = subscription.recv() => {
                let Some(message) = message else { break };
                match std::str::from_utf8(&message.payload) {
                    Ok(payload) => merge(&mut vehicles, tm_prefix, &message.topic, payload),
                    Err(e) => warn!(topic = %message.topic, error = %e, "Invalid UTF-8 in MQTT payload"),
                }
            }
            _ = tokio::time::sleep(IDLE_TIMEOUT) => break,
        }
    }

    for vehicle in vehicles.values_mut() {
        vehicle.finalize(tm_prefix);
    }

    Outcome::Completed(vehicles)
}

/// Applies one attribute message. Only the four identity attributes create
/// or mutate a vehicle; other telemetry under the namespace is ignored.
fn merge(vehicles: &mut BTreeMap<String, Vehicle>, tm_prefix: &str, topic: &str, payload: &str) {
    let Some(car) = route(tm_prefix, topic) else { return };

    match car.attribute {
        "display_name" => entry(vehicles, car.car_id).name = payload.to_string(),
        // Model and trim compose into one string whichever arrives first
        "model" => {
            let vehicle = entry(vehicles, car.car_id);
            vehicle.model = format!("Model {}{}", payload, vehicle.model);
        }
        "trim_badging" => {
            let vehicle = entry(vehicles, car.car_id);
            vehicle.model = format!("{} {}", vehicle.model, payload);
        }
        "version" => entry(vehicles, car.car_id).software_version = payload.to_string(),
        _ => {}
    }
}

fn entry<'a>(vehicles: &'a mut BTreeMap<String, Vehicle>, id: &str) -> &'a mut Vehicle {
    vehicles.entry(id.to_string()).or_insert_with(|| Vehicle::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{Publish, QoS};
    use tokio::sync::mpsc;

    fn feed(tx: &mpsc::UnboundedSender<Publish>, topic: &str, payload: &str) {
        tx.send(Publish::new(topic, QoS::AtMostOnce, payload.to_string())).unwrap();
    }

    #[test]
    fn test_merge_composes_model_and_trim_in_any_order() {
        let mut vehicles = BTreeMap::new();
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/1/model", "3");
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/1/trim_badging", "Long Range");
        assert_eq!(vehicles["1"].model, "Model 3 Long Range");

        let mut vehicles = BTreeMap::new();
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/1/trim_badging", "Long Range");
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/1/model", "3");
        assert_eq!(vehicles["1"].model, "Model 3 Long Range");
    }

    #[test]
    fn test_merge_ignores_non_identity_attributes() {
        let mut vehicles = BTreeMap::new();
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/1/battery_level", "42");
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/1/odometer", "120934.1");
        assert!(vehicles.is_empty());
    }

    #[test]
    fn test_merge_ignores_other_namespaces() {
        let mut vehicles = BTreeMap::new();
        merge(&mut vehicles, "test-prefix", "other/cars/1/display_name", "Intruder");
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/not-a-number/display_name", "Nope");
        assert!(vehicles.is_empty());
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut vehicles = BTreeMap::new();
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/1/display_name", "Old Name");
        merge(&mut vehicles, "test-prefix", "test-prefix/cars/1/display_name", "New Name");
        assert_eq!(vehicles["1"].name, "New Name");
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_builds_identities_from_burst() {
        let (tx, mut subscription) = Subscription::direct();
        let (_cancel_tx, mut cancel) = watch::channel(false);

        let messages = [
            ("test-prefix/cars/1/display_name", "test-display-name-1"),
            ("test-prefix/cars/1/model", "test-model-1"),
            ("test-prefix/cars/1/trim_badging", "test-trim-badging-1"),
            ("test-prefix/cars/1/version", "test-version-1"),
            ("test-prefix/cars/2/display_name", "test-display-name-2"),
            ("test-prefix/cars/2/trim_badging", "test-trim-badging-2"),
            ("test-prefix/cars/2/model", "test-model-2"),
            ("test-prefix/cars/2/version", "test-version-2"),
            ("test-prefix/cars/3/trim_badging", "test-trim-badging-3"),
            ("test-prefix/cars/3/model", "test-model-3"),
            ("test-prefix/cars/3/version", "test-version-3"),
        ];
        for (topic, payload) in messages {
            feed(&tx, topic, payload);
        }

        let Outcome::Completed(vehicles) =
            collect(&mut subscription, "test-prefix", &mut cancel).await
        else {
            panic!("collect was cancelled");
        };

        assert_eq!(vehicles.len(), 3);

        let one = &vehicles["1"];
        assert_eq!(one.name, "test-display-name-1");
        assert_eq!(one.model, "Model test-model-1 test-trim-badging-1");
        assert_eq!(one.software_version, "test-version-1");
        assert_eq!(one.identifiers, vec!["test-prefix/cars/1".to_string()]);
        assert_eq!(one.manufacturer, "Tesla");
        assert_eq!(one.suggested_area, "Garage");

        let two = &vehicles["2"];
        assert_eq!(two.name, "test-display-name-2");
        assert_eq!(two.model, "Model test-model-2 test-trim-badging-2");
        assert_eq!(two.software_version, "test-version-2");

        // Never reported a display name
        let three = &vehicles["3"];
        assert_eq!(three.name, "Tesla");
        assert_eq!(three.model, "Model test-model-3 test-trim-badging-3");
        assert_eq!(three.software_version, "test-version-3");
    }

    #[tokio::test]
    async fn test_collect_finalizes_when_stream_ends() {
        let (tx, mut subscription) = Subscription::direct();
        let (_cancel_tx, mut cancel) = watch::channel(false);

        feed(&tx, "test-prefix/cars/7/display_name", "Roadster");
        feed(&tx, "test-prefix/cars/7/version", "2024.8.7");
        drop(tx);

        let Outcome::Completed(vehicles) =
            collect(&mut subscription, "test-prefix", &mut cancel).await
        else {
            panic!("collect was cancelled");
        };

        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles["7"].name, "Roadster");
        assert_eq!(vehicles["7"].software_version, "2024.8.7");
    }

    #[tokio::test]
    async fn test_collect_skips_invalid_utf8_payloads() {
        let (tx, mut subscription) = Subscription::direct();
        let (_cancel_tx, mut cancel) = watch::channel(false);

        tx.send(Publish::new("test-prefix/cars/1/display_name", QoS::AtMostOnce, vec![0xff, 0xfe]))
            .unwrap();
        feed(&tx, "test-prefix/cars/1/version", "2024.8.7");
        drop(tx);

        let Outcome::Completed(vehicles) =
            collect(&mut subscription, "test-prefix", &mut cancel).await
        else {
            panic!("collect was cancelled");
        };

        assert_eq!(vehicles["1"].name, "Tesla");
        assert_eq!(vehicles["1"].software_version, "2024.8.7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_returns_empty_on_cancellation() {
        let (tx, mut subscription) = Subscription::direct();
        let (cancel_tx, mut cancel) = watch::channel(false);

        feed(&tx, "test-prefix/cars/1/display_name", "test-display-name-1");
        cancel_tx.send(true).unwrap();

        let outcome = collect(&mut subscription, "test-prefix", &mut cancel).await;
        assert!(outcome.is_cancelled());
    }
}
