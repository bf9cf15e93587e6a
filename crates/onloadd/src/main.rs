//! onloadd — the Onload device plugin daemon.
//!
//! Fingerprints the host for Onload, TCPDirect and the NICs and
//! timekeeping devices they can use, and logs every change to the
//! published device groups until stopped.
//!
//! # Usage
//!
//! ```text
//! onloadd run --config /etc/onloadd/config.toml
//! onloadd run --config /etc/onloadd/config.toml --once
//! onloadd reserve --config /etc/onloadd/config.toml eth0-0 eth0-1
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use onload_core::{DeviceGroup, PluginConfig, ReservationSpec};
use onload_device::{FingerprintResponse, OnloadDevicePlugin};
use onload_probe::SystemProbe;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "onloadd", about = "Onload device plugin daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fingerprint the host and publish device groups until interrupted.
    Run {
        /// Plugin configuration file (TOML).
        #[arg(long)]
        config: PathBuf,

        /// Print the first fingerprint as JSON and exit.
        #[arg(long)]
        once: bool,
    },
    /// Fingerprint once and print the reservation for the given devices.
    Reserve {
        /// Plugin configuration file (TOML).
        #[arg(long)]
        config: PathBuf,

        /// Device IDs to reserve.
        #[arg(required = true)]
        devices: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Run { config, once: true } => run_once(&config),
        Command::Run { config, once: false } => run(&config).await,
        Command::Reserve { config, devices } => reserve(&config, &devices),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,onloadd=debug,onload_device=debug"));

    // Logs go to stderr so JSON output on stdout stays parseable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_plugin(path: &Path) -> anyhow::Result<OnloadDevicePlugin> {
    let config = PluginConfig::from_file(path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    let probe = Arc::new(SystemProbe::new(config.sysfs_root.clone()));
    let plugin = OnloadDevicePlugin::new(config, probe).context("invalid plugin config")?;

    let plugin_info = plugin.plugin_info();
    info!(
        name = plugin_info.name,
        version = plugin_info.version,
        period = ?plugin.fingerprint_period(),
        "onload device plugin ready"
    );
    Ok(plugin)
}

async fn run(config_path: &Path) -> anyhow::Result<()> {
    let plugin = load_plugin(config_path)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });

    // ── Fingerprint stream ─────────────────────────────────────

    let mut updates = plugin.fingerprint(shutdown_rx);
    while let Some(update) = updates.recv().await {
        match update {
            FingerprintResponse::Groups(groups) => log_groups(&groups),
            FingerprintResponse::Error(e) => warn!(error = %e, "fingerprint pass failed"),
        }
    }

    info!("onload device plugin stopped");
    Ok(())
}

/// One pass from an empty inventory; prints the device groups as JSON.
fn run_once(config_path: &Path) -> anyhow::Result<()> {
    let plugin = load_plugin(config_path)?;
    let groups = match plugin.fingerprint_once() {
        Some(FingerprintResponse::Groups(groups)) => groups,
        Some(FingerprintResponse::Error(e)) => anyhow::bail!("fingerprint failed: {e}"),
        None => Vec::new(),
    };
    log_groups(&groups);
    println!("{}", serde_json::to_string_pretty(&groups)?);
    Ok(())
}

fn log_groups(groups: &[DeviceGroup]) {
    let devices: usize = groups.iter().map(|g| g.devices.len()).sum();
    info!(groups = groups.len(), devices, "device groups updated");
    for group in groups {
        info!(
            vendor = %group.vendor,
            device_type = %group.device_type,
            name = %group.name,
            devices = group.devices.len(),
            "device group"
        );
    }
}

fn reserve(config_path: &Path, devices: &[String]) -> anyhow::Result<()> {
    let plugin = load_plugin(config_path)?;
    let spec = reserve_after_pass(&plugin, devices)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

/// Fingerprint once, then reserve `devices` against the fresh inventory.
fn reserve_after_pass(
    plugin: &OnloadDevicePlugin,
    devices: &[String],
) -> anyhow::Result<ReservationSpec> {
    if let Some(FingerprintResponse::Error(e)) = plugin.fingerprint_once() {
        anyhow::bail!("fingerprint failed: {e}");
    }
    Ok(plugin.reserve(devices)?)
}
