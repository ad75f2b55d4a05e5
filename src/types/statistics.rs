//! Trade activity summary types

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use super::TradeRecord;

/// Which store answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Primary,
    Secondary,
    /// No enabled store could answer.
    None,
}

#[derive(Debug, Clone)]
pub struct RecentTrades {
    pub source: DataSource,
    pub records: Vec<TradeRecord>,
}

impl RecentTrades {
    pub fn empty() -> Self {
        Self {
            source: DataSource::None,
            records: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Active,
    NoActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStatistics {
    pub activity: Activity,
    pub source: DataSource,
    pub total_trades: usize,
    pub unique_stocks: usize,
    pub unique_options: usize,
    pub total_volume: i64,
    pub total_turnover: Decimal,
    pub avg_trade_size: Option<Decimal>,
    pub latest_trade_time: Option<NaiveDateTime>,
}

impl TradeStatistics {
    pub fn no_activity(source: DataSource) -> Self {
        Self {
            activity: Activity::NoActivity,
            source,
            total_trades: 0,
            unique_stocks: 0,
            unique_options: 0,
            total_volume: 0,
            total_turnover: Decimal::ZERO,
            avg_trade_size: None,
            latest_trade_time: None,
        }
    }
}
