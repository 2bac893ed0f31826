//! Domain models - vehicle identity and discovery entity types
//!
//! This module contains the canonical data types used throughout the bridge:
//! - `Vehicle` - per-vehicle identity aggregated from telemetry topics
//! - `Sensor` / `BinarySensor` / `DeviceTracker` - discovery entity payloads
//! - `CarTopic` - one telemetry topic resolved to a vehicle attribute
//! - `Units` - unit system and range type preferences

pub mod entity;
pub mod topic;
pub mod units;
pub mod vehicle;

// Re-export commonly used types at module level
pub use entity::{BinarySensor, DeviceTracker, Entity, Sensor};
pub use topic::{route, CarTopic};
pub use units::{RangeType, SystemOfMeasurement, Units};
pub use vehicle::Vehicle;
