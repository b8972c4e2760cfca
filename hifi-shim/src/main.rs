//! HiFi Shim (hifi-shim) - Main entry point
//!
//! Loads bootstrap configuration, selects the device adapter, and serves
//! the REST and WebSocket surfaces until shutdown.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hifi_common::config::{ConfigOverrides, DeviceKind, TomlConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hifi_shim::api::{self, AppContext};
use hifi_shim::device;

/// Command-line arguments for hifi-shim
#[derive(Parser, Debug)]
#[command(name = "hifi-shim")]
#[command(about = "REST/WebSocket control shim for a single audio device")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "HIFI_SHIM_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "HIFI_SHIM_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "HIFI_SHIM_BIND")]
    bind: Option<String>,

    /// Device adapter (hifiberry or mock)
    #[arg(long, env = "HIFI_SHIM_DEVICE")]
    device: Option<DeviceKind>,

    /// Base URL of the device API
    #[arg(long, env = "HIFI_SHIM_DEVICE_URL")]
    device_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "HIFI_SHIM_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?
        .apply_overrides(ConfigOverrides {
            port: args.port,
            bind_address: args.bind,
            device_kind: args.device,
            device_url: args.device_url,
            log_level: args.log_level,
        })
        .context("Invalid configuration")?;

    // Initialize tracing
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("hifi_shim={level},hifi_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting HiFi shim v{} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.bind_address,
        config.port
    );

    let device = device::from_config(&config.device).context("Failed to create device adapter")?;
    if config.device.kind == DeviceKind::HifiBerry {
        info!("Device API: {}", config.device.base_url);
    }

    let ctx = AppContext::new(device);
    api::run(&config, ctx).await.context("Server error")?;

    Ok(())
}
