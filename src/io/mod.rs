//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `mqtt` - MQTT session: connect, subscribe, unsubscribe, retained publish

pub mod mqtt;

// Re-export commonly used types
pub use mqtt::{cancelled, Outcome, Session, Subscription};
