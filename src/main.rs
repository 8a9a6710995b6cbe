//! fare-watch - tracks the lowest fare per date and reports drops
//!
//! Periodically searches one route across a date range, keeps the lowest
//! price ever seen per date, and sends one report per cycle when any date
//! gets cheaper.
//!
//! Module structure:
//! - `domain/` - Core types (DateKey, quotes, drops, cycle report)
//! - `io/` - External interfaces (providers, ledger storage, notifiers, journal)
//! - `services/` - Business logic (normalize, aggregate, detect, dispatch, schedule)
//! - `infra/` - Infrastructure (Config, Metrics, logging)

use clap::Parser;
use fare_watch::infra::logging::init_logging;
use fare_watch::infra::{Config, Metrics};
use fare_watch::io::{notifier, prometheus, provider};
use fare_watch::services::{CycleRunner, PriceLedger, Scheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// fare-watch - flight price drop tracker
#[derive(Parser, Debug)]
#[command(name = "fare-watch", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!(version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "fare_watch_starting");

    let args = Args::parse();
    let config = Config::load_from_path(&Config::resolve_config_path(args.config.as_deref()));

    info!(
        config_file = %config.config_file(),
        route = %config.route_label(),
        start_date = %config.start_date(),
        end_date = %config.end_date(),
        provider = ?config.provider_kind(),
        ledger = %config.ledger_backend().as_str(),
        notifier = %config.notifier_kind().as_str(),
        interval_secs = %config.interval_secs(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    let ledger = PriceLedger::open(&config).await?;
    let provider = provider::from_config(&config)?;
    let notifier = notifier::from_config(&config)?;

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 && !args.once {
        let prom_metrics = metrics.clone();
        let prom_shutdown = shutdown_rx.clone();
        let route = format!("{}-{}", config.origin(), config.destination());
        tokio::spawn(async move {
            if let Err(e) =
                prometheus::start_metrics_server(prometheus_port, prom_metrics, route, prom_shutdown)
                    .await
            {
                error!(error = %e, "prometheus_metrics_server_error");
            }
        });
    }

    // Start metrics reporter (lock-free reads with full summary)
    if !args.once {
        let metrics_clone = metrics.clone();
        let metrics_interval = config.metrics_interval_secs().max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                metrics_clone.report().log();
            }
        });
    }

    let interval = Duration::from_secs(config.interval_secs());
    let run_on_start = config.run_on_start();
    let runner = CycleRunner::new(config, provider, ledger, notifier, metrics.clone());
    let mut scheduler = Scheduler::new(runner, interval, run_on_start);

    if args.once {
        scheduler.run_once().await;
        metrics.report().log();
        info!("fare_watch_single_cycle_complete");
        return Ok(());
    }

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;

    metrics.report().log();
    info!("fare_watch_shutdown_complete");
    Ok(())
}
