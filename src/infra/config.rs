//! Configuration loading and merging
//!
//! Settings come from four layers, highest precedence first:
//! 1. Command line flags
//! 2. Environment variables (handled by clap alongside the flags)
//! 3. TOML config file (`--config <path>`, missing file tolerated)
//! 4. Built-in defaults

use crate::domain::units::{RangeType, SystemOfMeasurement, Units};
use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::io;

/// Configure Home Assistant MQTT discovery for TeslaMate vehicles.
#[derive(Parser, Debug, Default)]
#[command(name = "teslamate-discovery", version, about)]
pub struct Args {
    /// Path to TOML configuration file
    #[arg(short = 'c', long, env = "CONFIG_FILE", default_value = "teslamate-discovery.toml")]
    pub config: String,

    /// Home Assistant discovery prefix
    #[arg(long, env = "HA_DISCOVERY_PREFIX")]
    pub ha_discovery_prefix: Option<String>,

    /// MQTT broker scheme (mqtt, tcp, ssl, tls, mqtts, tcps)
    #[arg(short = 's', long, env = "MQTT_SCHEME")]
    pub mqtt_scheme: Option<String>,

    /// MQTT broker host
    #[arg(short = 'H', long, env = "MQTT_HOST")]
    pub mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(short = 'p', long, env = "MQTT_PORT")]
    pub mqtt_port: Option<u16>,

    /// MQTT broker username
    #[arg(short = 'u', long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    /// MQTT broker password
    #[arg(short = 'P', long, env = "MQTT_PASSWORD")]
    pub mqtt_password: Option<String>,

    /// TeslaMate topic prefix
    #[arg(long, env = "TM_PREFIX")]
    pub tm_prefix: Option<String>,

    /// Distance and speed units (imperial, metric)
    #[arg(long, env = "UNITS_DISTANCE")]
    pub units_distance: Option<SystemOfMeasurement>,

    /// Pressure units (imperial, metric)
    #[arg(long, env = "UNITS_PRESSURE")]
    pub units_pressure: Option<SystemOfMeasurement>,

    /// Battery range flavor (estimated, ideal, rated)
    #[arg(long, env = "UNITS_RANGE")]
    pub units_range: Option<RangeType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HaToml {
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

impl Default for HaToml {
    fn default() -> Self {
        Self { discovery_prefix: default_discovery_prefix() }
    }
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttToml {
    #[serde(default = "default_mqtt_scheme")]
    pub scheme: String,
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for MqttToml {
    fn default() -> Self {
        Self {
            scheme: default_mqtt_scheme(),
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
        }
    }
}

fn default_mqtt_scheme() -> String {
    "ssl".to_string()
}

fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mqtt_port() -> u16 {
    8883
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmToml {
    #[serde(default = "default_tm_prefix")]
    pub prefix: String,
}

impl Default for TmToml {
    fn default() -> Self {
        Self { prefix: default_tm_prefix() }
    }
}

fn default_tm_prefix() -> String {
    "teslamate".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitsToml {
    #[serde(default)]
    pub distance: SystemOfMeasurement,
    #[serde(default)]
    pub pressure: SystemOfMeasurement,
    #[serde(default)]
    pub range_type: RangeType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub ha: HaToml,
    #[serde(default)]
    pub mqtt: MqttToml,
    #[serde(default)]
    pub tm: TmToml,
    #[serde(default)]
    pub units: UnitsToml,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    discovery_prefix: String,
    mqtt_scheme: String,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_username: String,
    mqtt_password: String,
    tm_prefix: String,
    units: Units,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_prefix: default_discovery_prefix(),
            mqtt_scheme: default_mqtt_scheme(),
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            mqtt_username: String::new(),
            mqtt_password: String::new(),
            tm_prefix: default_tm_prefix(),
            units: Units::default(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Merge flags, environment, config file and defaults into the final
    /// configuration. A missing config file falls through to the defaults;
    /// an unreadable or unparsable one is fatal.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = match fs::read_to_string(&args.config) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", args.config))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %args.config, "config_file_not_found");
                TomlConfig::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file {}", args.config));
            }
        };

        let mqtt_scheme = args.mqtt_scheme.clone().unwrap_or(toml_config.mqtt.scheme);
        if !matches!(mqtt_scheme.as_str(), "mqtt" | "tcp" | "ssl" | "tls" | "mqtts" | "tcps") {
            anyhow::bail!("mqtt scheme must be one of mqtt, tcp, ssl, tls, mqtts, tcps");
        }

        let mqtt_username = args
            .mqtt_username
            .clone()
            .or(toml_config.mqtt.username)
            .context("mqtt username must be specified")?;
        let mqtt_password = args
            .mqtt_password
            .clone()
            .or(toml_config.mqtt.password)
            .context("mqtt password must be specified")?;

        Ok(Self {
            discovery_prefix: args
                .ha_discovery_prefix
                .clone()
                .unwrap_or(toml_config.ha.discovery_prefix),
            mqtt_scheme,
            mqtt_host: args.mqtt_host.clone().unwrap_or(toml_config.mqtt.host),
            mqtt_port: args.mqtt_port.unwrap_or(toml_config.mqtt.port),
            mqtt_username,
            mqtt_password,
            tm_prefix: args.tm_prefix.clone().unwrap_or(toml_config.tm.prefix),
            units: Units {
                distance: args.units_distance.unwrap_or(toml_config.units.distance),
                pressure: args.units_pressure.unwrap_or(toml_config.units.pressure),
                range_type: args.units_range.unwrap_or(toml_config.units.range_type),
            },
            config_file: args.config.clone(),
        })
    }

    // Getters for all config fields
    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    pub fn mqtt_scheme(&self) -> &str {
        &self.mqtt_scheme
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_username(&self) -> &str {
        &self.mqtt_username
    }

    pub fn mqtt_password(&self) -> &str {
        &self.mqtt_password
    }

    pub fn tm_prefix(&self) -> &str {
        &self.tm_prefix
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Broker address as `{scheme}://{host}:{port}`, for logging.
    pub fn broker_uri(&self) -> String {
        format!("{}://{}:{}", self.mqtt_scheme, self.mqtt_host, self.mqtt_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with_credentials() -> Args {
        Args {
            config: "does-not-exist.toml".to_string(),
            mqtt_username: Some("test-user".to_string()),
            mqtt_password: Some("test-pass".to_string()),
            ..Args::default()
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        let config = Config::load(&args_with_credentials()).unwrap();
        assert_eq!(config.discovery_prefix(), "homeassistant");
        assert_eq!(config.mqtt_scheme(), "ssl");
        assert_eq!(config.mqtt_host(), "127.0.0.1");
        assert_eq!(config.mqtt_port(), 8883);
        assert_eq!(config.tm_prefix(), "teslamate");
        assert_eq!(config.units().distance, SystemOfMeasurement::Imperial);
        assert_eq!(config.units().pressure, SystemOfMeasurement::Imperial);
        assert_eq!(config.units().range_type, RangeType::Rated);
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        let args = Args { config: "does-not-exist.toml".to_string(), ..Args::default() };
        let err = Config::load(&args).unwrap_err();
        assert!(err.to_string().contains("mqtt username must be specified"));

        let args = Args {
            config: "does-not-exist.toml".to_string(),
            mqtt_username: Some("test-user".to_string()),
            ..Args::default()
        };
        let err = Config::load(&args).unwrap_err();
        assert!(err.to_string().contains("mqtt password must be specified"));
    }

    #[test]
    fn test_unknown_scheme_is_fatal() {
        let args = Args {
            mqtt_scheme: Some("gopher".to_string()),
            ..args_with_credentials()
        };
        let err = Config::load(&args).unwrap_err();
        assert!(err.to_string().contains("mqtt scheme must be one of"));
    }

    #[test]
    fn test_broker_uri() {
        let args = Args {
            mqtt_scheme: Some("mqtt".to_string()),
            mqtt_host: Some("broker.local".to_string()),
            mqtt_port: Some(1883),
            ..args_with_credentials()
        };
        let config = Config::load(&args).unwrap();
        assert_eq!(config.broker_uri(), "mqtt://broker.local:1883");
    }
}
