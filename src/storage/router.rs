//! Dual-sink routing of trade records between the primary store and the
//! CSV secondary store
//!
//! Writes go to every enabled sink on every call: the CSV file is a
//! durability floor, not a fallback. Reads prefer the primary store while
//! the health monitor reports it healthy and fall back to the CSV file
//! otherwise.

use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Level, debug, error, warn};
use crate::{
    config::PersistenceConfig,
    db::repository,
    errors::{RecoveryAction, StoreError, StoreResult},
    monitor::HealthMonitor,
    storage::CsvTradeStore,
    types::{DailySummary, DataSource, PriceSnapshot, PushRecord, RecentTrades, TradeRecord},
};

/// What one sink did with a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkOutcome {
    /// Sink disabled or not configured.
    Skipped,
    Stored,
    Failed(String),
}

impl SinkOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SinkOutcome::Stored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub primary: SinkOutcome,
    pub secondary: SinkOutcome,
}

impl SaveOutcome {
    /// The secondary outcome when the CSV sink is enabled, otherwise the
    /// primary outcome. Nothing enabled counts as not saved.
    pub fn succeeded(&self) -> bool {
        match (&self.primary, &self.secondary) {
            (_, SinkOutcome::Stored) => true,
            (_, SinkOutcome::Failed(_)) => false,
            (primary, SinkOutcome::Skipped) => primary.is_stored(),
        }
    }
}

/// Running totals since the router was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub saves: u64,
    pub primary_stored: u64,
    pub primary_failures: u64,
    pub secondary_stored: u64,
    pub secondary_failures: u64,
}

#[derive(Default)]
struct Counters {
    saves: AtomicU64,
    primary_stored: AtomicU64,
    primary_failures: AtomicU64,
    secondary_stored: AtomicU64,
    secondary_failures: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &SaveOutcome) {
        self.saves.fetch_add(1, Ordering::Relaxed);
        let tally = |outcome: &SinkOutcome, stored: &AtomicU64, failed: &AtomicU64| match outcome {
            SinkOutcome::Stored => {
                stored.fetch_add(1, Ordering::Relaxed);
            }
            SinkOutcome::Failed(_) => {
                failed.fetch_add(1, Ordering::Relaxed);
            }
            SinkOutcome::Skipped => {}
        };
        tally(&outcome.primary, &self.primary_stored, &self.primary_failures);
        tally(&outcome.secondary, &self.secondary_stored, &self.secondary_failures);
    }

    fn snapshot(&self) -> RouterStats {
        RouterStats {
            saves: self.saves.load(Ordering::Relaxed),
            primary_stored: self.primary_stored.load(Ordering::Relaxed),
            primary_failures: self.primary_failures.load(Ordering::Relaxed),
            secondary_stored: self.secondary_stored.load(Ordering::Relaxed),
            secondary_failures: self.secondary_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct PersistenceRouter {
    config: PersistenceConfig,
    monitor: Option<Arc<HealthMonitor>>,
    csv: Option<CsvTradeStore>,
    counters: Counters,
}

impl PersistenceRouter {
    /// `monitor` owns the primary-store handle; without one the primary sink
    /// is skipped even when enabled.
    pub fn new(config: PersistenceConfig, monitor: Option<Arc<HealthMonitor>>) -> StoreResult<Self> {
        let csv = if config.save_to_csv {
            Some(CsvTradeStore::new(&config.csv_path)?)
        } else {
            None
        };

        if config.save_to_db && monitor.is_none() {
            warn!("Primary persistence enabled without a store handle, primary writes will be skipped");
        }

        Ok(Self {
            config,
            monitor,
            csv,
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn stats(&self) -> RouterStats {
        self.counters.snapshot()
    }

    /// Stores the record in every enabled sink. See [`SaveOutcome::succeeded`]
    /// for what the returned flag means.
    pub async fn save(&self, trade: &TradeRecord) -> bool {
        self.save_detailed(trade).await.succeeded()
    }

    pub async fn save_detailed(&self, trade: &TradeRecord) -> SaveOutcome {
        let secondary = self.save_secondary(trade);
        let primary = self.save_primary(trade).await;

        let outcome = SaveOutcome { primary, secondary };
        self.counters.record(&outcome);
        outcome
    }

    fn save_secondary(&self, trade: &TradeRecord) -> SinkOutcome {
        let Some(csv) = &self.csv else {
            return SinkOutcome::Skipped;
        };
        match csv.append(trade) {
            Ok(()) => SinkOutcome::Stored,
            Err(e) => {
                log_secondary_failure(&e, "Failed to save trade to CSV");
                SinkOutcome::Failed(e.to_string())
            }
        }
    }

    async fn save_primary(&self, trade: &TradeRecord) -> SinkOutcome {
        let Some(monitor) = self.primary_monitor() else {
            return SinkOutcome::Skipped;
        };
        if repository::save_trade(monitor.handle(), trade).await {
            SinkOutcome::Stored
        } else {
            error!(option = %trade.option_code, "Failed to save trade to primary store");
            SinkOutcome::Failed("primary store rejected the trade".to_string())
        }
    }

    /// Trades newer than `window`. The primary store answers while healthy;
    /// an empty primary answer is final, a failed one falls back to CSV.
    pub async fn load_recent(&self, window: Duration) -> RecentTrades {
        if let Some(monitor) = self.primary_monitor() {
            if monitor.is_database_available().await {
                let hours = window.num_hours().max(1);
                match repository::recent_trades(monitor.handle(), hours, None).await {
                    Some(records) => {
                        debug!(count = records.len(), "Loaded recent trades from primary store");
                        return RecentTrades {
                            source: DataSource::Primary,
                            records,
                        };
                    }
                    None => warn!("Primary store read failed, falling back to CSV"),
                }
            } else {
                debug!("Primary store unhealthy, reading recent trades from CSV");
            }
        }

        let Some(csv) = &self.csv else {
            return RecentTrades::empty();
        };

        let cutoff = Local::now().naive_local() - window;
        match csv.load_since(cutoff) {
            Ok(records) => {
                debug!(count = records.len(), "Loaded recent trades from CSV");
                RecentTrades {
                    source: DataSource::Secondary,
                    records,
                }
            }
            Err(e) => {
                log_secondary_failure(&e, "Failed to read recent trades from CSV");
                RecentTrades::empty()
            }
        }
    }

    pub async fn save_price_snapshot(&self, snapshot: &PriceSnapshot) -> bool {
        match self.primary_monitor() {
            Some(monitor) => repository::save_price_snapshot(monitor.handle(), snapshot).await,
            None => false,
        }
    }

    pub async fn save_push_record(&self, record: &PushRecord) -> bool {
        match self.primary_monitor() {
            Some(monitor) => repository::save_push_record(monitor.handle(), record).await,
            None => false,
        }
    }

    pub async fn refresh_daily_summary(&self, date: NaiveDate) -> bool {
        match self.primary_monitor() {
            Some(monitor) => repository::update_daily_summary(monitor.handle(), date).await,
            None => false,
        }
    }

    pub async fn daily_summary(&self, date: NaiveDate) -> Vec<DailySummary> {
        let Some(monitor) = self.primary_monitor() else {
            return Vec::new();
        };
        repository::daily_summary(monitor.handle(), date)
            .await
            .unwrap_or_default()
    }

    fn primary_monitor(&self) -> Option<&HealthMonitor> {
        if !self.config.save_to_db {
            return None;
        }
        self.monitor.as_deref()
    }
}

fn log_secondary_failure(e: &StoreError, context: &str) {
    match e.recovery_action() {
        RecoveryAction::Skip { log_level } if log_level == Level::WARN => warn!(error = %e, "{}", context),
        _ => error!(error = %e, "{}", context),
    }
}
