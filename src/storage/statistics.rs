//! Summary metrics over recently persisted trades

use chrono::Duration;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use crate::{
    storage::PersistenceRouter,
    types::{Activity, RecentTrades, TradeStatistics},
};

pub const DEFAULT_STATISTICS_WINDOW_DAYS: i64 = 7;

pub struct StatisticsAggregator {
    router: Arc<PersistenceRouter>,
    window: Duration,
}

impl StatisticsAggregator {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self::with_window(router, Duration::days(DEFAULT_STATISTICS_WINDOW_DAYS))
    }

    pub fn with_window(router: Arc<PersistenceRouter>, window: Duration) -> Self {
        Self { router, window }
    }

    pub async fn get_statistics(&self) -> TradeStatistics {
        summarize(self.router.load_recent(self.window).await)
    }
}

/// Single pass over the loaded trades.
pub fn summarize(recent: RecentTrades) -> TradeStatistics {
    if recent.records.is_empty() {
        return TradeStatistics::no_activity(recent.source);
    }

    let mut stocks = HashSet::new();
    let mut options = HashSet::new();
    let mut total_volume = 0i64;
    let mut total_turnover = Decimal::ZERO;
    let mut latest = None;

    for trade in &recent.records {
        stocks.insert(trade.stock_code.as_str());
        options.insert(trade.option_code.as_str());
        total_volume = total_volume.saturating_add(trade.volume);
        total_turnover += trade.turnover;
        latest = latest.max(Some(trade.trade_time));
    }

    let total_trades = recent.records.len();
    TradeStatistics {
        activity: Activity::Active,
        source: recent.source,
        total_trades,
        unique_stocks: stocks.len(),
        unique_options: options.len(),
        total_volume,
        total_turnover,
        avg_trade_size: Some(Decimal::from(total_volume) / Decimal::from(total_trades)),
        latest_trade_time: latest,
    }
}
