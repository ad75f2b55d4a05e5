//! Trade Sink - Main Entry Point
//!
//! Reads JSON-lines trade records from stdin and persists each one to the
//! primary store and the CSV file, while a background monitor keeps the
//! primary connection healthy.

use trade_sink::*;
use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time;
use tracing::{info, warn, error, debug};

const STATUS_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    let _logging_guard = utils::setup_logging()?;

    // Load configuration
    let config = Config::load();
    utils::setup_output_directories(&config)?;

    info!("📈 Trade Sink v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Primary store: {} ({}:{}/{})",
        if config.persistence.save_to_db { "enabled" } else { "disabled" },
        config.database.host, config.database.port, config.database.database);
    info!("   CSV store: {} ({})",
        if config.persistence.save_to_csv { "enabled" } else { "disabled" },
        config.persistence.csv_path.display());
    info!("   Health check interval: {}s", config.monitor.check_interval.as_secs());

    let monitor = if config.persistence.save_to_db {
        Some(start_monitor(&config).await)
    } else {
        None
    };

    let result = run(&config, monitor.clone()).await;

    // Explicit release on every exit path, including a failed run.
    if let Some(monitor) = &monitor {
        monitor.shutdown().await;
    }
    if let Err(e) = &result {
        error!("Trade sink stopped with error: {:#}", e);
    }
    info!("👋 Trade sink stopped");
    result
}

async fn start_monitor(config: &Config) -> Arc<HealthMonitor> {
    let handle = ConnectionHandle::mysql(config.database.clone());
    let monitor = Arc::new(HealthMonitor::new(handle, config.monitor.clone()));

    if !monitor.handle().connect().await {
        warn!("⚠️  Primary store unreachable at startup, CSV will carry reads until it recovers");
    }
    // Seed the health signal so routing does not wait a full interval.
    monitor.check_health().await;
    monitor.start().await;
    monitor
}

async fn run(config: &Config, monitor: Option<Arc<HealthMonitor>>) -> Result<()> {
    let router = Arc::new(PersistenceRouter::new(config.persistence.clone(), monitor.clone())?);
    let aggregator = StatisticsAggregator::new(Arc::clone(&router));

    // Setup shutdown handler
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("\n📛 Received shutdown signal (Ctrl+C)...");
                let _ = shutdown_tx.send(());
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = time::interval(Duration::from_secs(STATUS_INTERVAL_SECS));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    interval.tick().await;

    let mut ingested = 0u64;
    let mut rejected = 0u64;

    info!("\n🚀 Reading trades from stdin...\n");

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<TradeRecord>(line) {
                        Ok(trade) => {
                            if !router.save(&trade).await {
                                warn!(option = %trade.option_code, "Trade was not persisted");
                            }
                            ingested += 1;
                        }
                        Err(e) => {
                            rejected += 1;
                            warn!("Skipping malformed trade line: {}", e);
                        }
                    }
                }
                Ok(None) => {
                    info!("Input closed, shutting down...");
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = interval.tick() => {
                report_status(monitor.as_deref(), &router, &aggregator).await;
            }
            Ok(()) = &mut shutdown_rx => {
                info!("Shutdown signal received, exiting main loop...");
                break;
            }
        }
    }

    info!("📥 Ingested {} trades, rejected {} lines", ingested, rejected);
    report_status(monitor.as_deref(), &router, &aggregator).await;
    Ok(())
}

async fn report_status(
    monitor: Option<&HealthMonitor>,
    router: &PersistenceRouter,
    aggregator: &StatisticsAggregator,
) {
    if let Some(monitor) = monitor {
        let status = monitor.get_health_status().await;
        let uptime = monitor.uptime_info().await;
        utils::print_health_status(&status, &uptime);

        if status.is_healthy {
            let today = Local::now().date_naive();
            if !router.refresh_daily_summary(today).await {
                debug!("Daily summary refresh skipped for {}", today);
            }
        }
    }

    utils::print_router_stats(&router.stats());
    utils::print_trade_statistics(&aggregator.get_statistics().await);
}
