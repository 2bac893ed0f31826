//! Services - discovery workflow logic
//!
//! This module contains the two halves of the bridge's workflow:
//! - `aggregator` - Listens to the telemetry namespace and assembles vehicle identities
//! - `catalog` - The fixed entity catalog and per-vehicle discovery publishing

pub mod aggregator;
pub mod catalog;

// Re-export commonly used types
pub use aggregator::list_vehicles;
pub use catalog::{entities, publish_discovery};
