//! TeslaMate Home Assistant discovery bridge
//!
//! Connects to the broker TeslaMate publishes to, listens briefly to find
//! out which vehicles exist, then publishes a retained Home Assistant
//! discovery config for every entity of every vehicle and exits.
//!
//! Module structure:
//! - `domain/` - Core types (Vehicle, entities, topic routing, units)
//! - `io/` - MQTT session (connect, subscribe, publish, event loop pump)
//! - `services/` - Workflow logic (vehicle aggregation, entity catalog)
//! - `infra/` - Infrastructure (configuration)

use clap::Parser;
use teslamate_discovery::infra::{Args, Config};
use teslamate_discovery::io::Session;
use teslamate_discovery::services::{list_vehicles, publish_discovery};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(revision = env!("GIT_HASH"), "teslamate-discovery starting");

    // Parse command line arguments using clap
    let args = Args::parse();

    // Merge flags, environment and the TOML file into one configuration
    let config = Config::load(&args)?;

    info!(
        config_file = %config.config_file(),
        broker = %config.broker_uri(),
        ha_discovery_prefix = %config.discovery_prefix(),
        tm_prefix = %config.tm_prefix(),
        units_distance = %config.units().distance,
        units_pressure = %config.units().pressure,
        units_range = %config.units().range_type,
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let Some(mut session) = Session::connect(&config, &mut shutdown_rx).await? else {
        return Ok(());
    };

    let vehicles = list_vehicles(&mut session, config.tm_prefix(), &mut shutdown_rx).await?;

    for vehicle in vehicles.values() {
        let outcome = publish_discovery(
            &mut session,
            vehicle,
            config.discovery_prefix(),
            config.units(),
            &mut shutdown_rx,
        )
        .await?;
        if outcome.is_cancelled() {
            break;
        }
    }

    info!("teslamate-discovery complete");
    Ok(())
}
