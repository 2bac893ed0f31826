//! Infrastructure - configuration
//!
//! This module contains infrastructure concerns:
//! - `config` - flag, environment and TOML file configuration

pub mod config;

// Re-export commonly used types
pub use config::{Args, Config};
