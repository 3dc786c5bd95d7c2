//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Binary entrypoint for the F-EMS daemon."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{info, warn};

use f_ems_alerts::{AlertReconciler, AlertStatus, JsonFileStore};
use f_ems_common::config::AppConfig;
use f_ems_common::logging::init_tracing;
use f_ems_model::ContainerStatus;
use f_ems_sim::{seed_fleet, TelemetryHub};

#[derive(Debug, Parser)]
#[command(author, version, about = "F-EMS fleet monitoring daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "MILLIS",
        help = "Override the telemetry tick interval"
    )]
    tick_interval_ms: Option<u64>,

    #[arg(
        long,
        value_name = "COUNT",
        help = "Exit after this many ticks instead of waiting for ctrl-c"
    )]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let mut config = match AppConfig::load_with_source(&candidates) {
        Ok(loaded) => {
            let config = loaded.config;
            init_tracing("f-emsd", &config.logging)?;
            info!(config_path = %loaded.source.display(), "configuration loaded");
            config
        }
        Err(err) => {
            let config = AppConfig::default();
            init_tracing("f-emsd", &config.logging)?;
            info!(reason = %err, "no configuration found; using built-in defaults");
            config
        }
    };

    if let Some(millis) = cli.tick_interval_ms {
        config.simulation.tick_interval = Duration::from_millis(millis);
    }

    run_daemon(config, cli.ticks).await
}

async fn run_daemon(config: AppConfig, tick_limit: Option<u64>) -> Result<()> {
    let fleet = seed_fleet(&config.fleet, &config.simulation);
    info!(containers = fleet.len(), "fleet seeded");

    let hub = TelemetryHub::new(fleet, &config.simulation);
    let store = JsonFileStore::new(config.alerts.store_path.clone());
    let reconciler = Arc::new(Mutex::new(AlertReconciler::load(
        store,
        config.alerts.retention,
    )));

    let tick_counter = Arc::new(AtomicU64::new(0));
    let limit_notify = Arc::new(Notify::new());

    let subscription = {
        let reconciler = reconciler.clone();
        let tick_counter = tick_counter.clone();
        let limit_notify = limit_notify.clone();
        hub.subscribe(move |assets| {
            let tick = tick_counter.fetch_add(1, Ordering::SeqCst);
            let mut reconciler = reconciler.lock();
            let alerts = reconciler.reconcile(assets);

            let active = alerts
                .iter()
                .filter(|a| a.status == AlertStatus::Active)
                .count();
            let acknowledged = alerts
                .iter()
                .filter(|a| a.status == AlertStatus::Acknowledged)
                .count();
            let charging = assets
                .iter()
                .filter(|a| a.status == ContainerStatus::Charging)
                .count();
            let discharging = assets
                .iter()
                .filter(|a| a.status == ContainerStatus::Discharging)
                .count();
            let mean_soc = if assets.is_empty() {
                0.0
            } else {
                assets.iter().map(|a| a.state_of_charge()).sum::<f64>() / assets.len() as f64
            };
            info!(
                tick,
                containers = assets.len(),
                charging,
                discharging,
                mean_soc = (mean_soc * 10.0).round() / 10.0,
                active_alerts = active,
                acknowledged_alerts = acknowledged,
                "fleet snapshot"
            );

            if let Some(limit) = tick_limit {
                // The subscription delivery at registration counts as tick 0.
                if tick >= limit {
                    limit_notify.notify_one();
                }
            }
        })
    };

    hub.start(config.simulation.tick_interval);
    info!(
        interval_ms = config.simulation.tick_interval.as_millis() as u64,
        "daemon running; waiting for termination signal"
    );

    let limit_reached = async {
        match tick_limit {
            Some(_) => limit_notify.notified().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "failed to listen for ctrl-c; shutting down");
            } else {
                info!("ctrl-c received; shutting down");
            }
        }
        _ = limit_reached => {
            info!(limit = tick_limit.unwrap_or_default(), "tick limit reached; shutting down");
        }
    }

    hub.stop();
    drop(subscription);
    info!("daemon shutdown complete");
    Ok(())
}
