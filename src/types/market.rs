//! Price snapshots, push audit records and daily summaries

use chrono::{Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::{Row, SqlValue, DEFAULT_DATA_SOURCE};

/// Latest price for an underlying; upserted by stock code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSnapshot {
    pub stock_code: String,
    pub stock_name: String,
    pub price: Decimal,
    pub change_amount: Option<Decimal>,
    pub change_rate: Option<f64>,
    pub volume: Option<i64>,
    pub turnover: Option<Decimal>,
    pub high_price: Option<Decimal>,
    pub low_price: Option<Decimal>,
    pub open_price: Option<Decimal>,
    pub prev_close: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub pe_ratio: Option<f64>,
    pub record_time: NaiveDateTime,
    pub data_source: String,
}

impl Default for PriceSnapshot {
    fn default() -> Self {
        Self {
            stock_code: String::new(),
            stock_name: String::new(),
            price: Decimal::ZERO,
            change_amount: None,
            change_rate: None,
            volume: None,
            turnover: None,
            high_price: None,
            low_price: None,
            open_price: None,
            prev_close: None,
            market_cap: None,
            pe_ratio: None,
            record_time: Local::now().naive_local(),
            data_source: DEFAULT_DATA_SOURCE.to_string(),
        }
    }
}

impl PriceSnapshot {
    pub fn to_params(&self) -> Vec<SqlValue> {
        vec![
            (&self.stock_code).into(),
            (&self.stock_name).into(),
            self.price.into(),
            self.change_amount.into(),
            self.change_rate.into(),
            self.volume.into(),
            self.turnover.into(),
            self.high_price.into(),
            self.low_price.into(),
            self.open_price.into(),
            self.prev_close.into(),
            self.market_cap.into(),
            self.pe_ratio.into(),
            self.record_time.into(),
            (&self.data_source).into(),
        ]
    }
}

/// Audit entry for one outbound notification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushRecord {
    pub option_id: String,
    pub push_type: String,
    pub push_status: String,
    pub push_content: String,
    pub push_time: NaiveDateTime,
    pub error_message: String,
    pub retry_count: u32,
}

impl Default for PushRecord {
    fn default() -> Self {
        Self {
            option_id: String::new(),
            push_type: String::new(),
            push_status: String::new(),
            push_content: String::new(),
            push_time: Local::now().naive_local(),
            error_message: String::new(),
            retry_count: 0,
        }
    }
}

impl PushRecord {
    pub fn to_params(&self) -> Vec<SqlValue> {
        vec![
            (&self.option_id).into(),
            (&self.push_type).into(),
            (&self.push_status).into(),
            (&self.push_content).into(),
            self.push_time.into(),
            (&self.error_message).into(),
            self.retry_count.into(),
        ]
    }
}

/// Per-instrument aggregate for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub summary_date: Option<NaiveDate>,
    pub stock_code: String,
    pub stock_name: String,
    pub total_trades: i64,
    pub total_volume: i64,
    pub total_turnover: Decimal,
    pub call_trades: i64,
    pub put_trades: i64,
    pub call_volume: i64,
    pub put_volume: i64,
    pub call_turnover: Decimal,
    pub put_turnover: Decimal,
    pub avg_premium: Option<Decimal>,
    pub max_single_trade: Option<Decimal>,
    pub active_options_count: i64,
    pub unique_expiry_dates: i64,
}

impl DailySummary {
    pub fn from_row(row: &Row) -> Self {
        Self {
            summary_date: row.date("summary_date"),
            stock_code: row.text("stock_code").unwrap_or_default(),
            stock_name: row.text("stock_name").unwrap_or_default(),
            total_trades: row.int("total_trades").unwrap_or_default(),
            total_volume: row.int("total_volume").unwrap_or_default(),
            total_turnover: row.decimal("total_turnover").unwrap_or_default(),
            call_trades: row.int("call_trades").unwrap_or_default(),
            put_trades: row.int("put_trades").unwrap_or_default(),
            call_volume: row.int("call_volume").unwrap_or_default(),
            put_volume: row.int("put_volume").unwrap_or_default(),
            call_turnover: row.decimal("call_turnover").unwrap_or_default(),
            put_turnover: row.decimal("put_turnover").unwrap_or_default(),
            avg_premium: row.decimal("avg_premium"),
            max_single_trade: row.decimal("max_single_trade"),
            active_options_count: row.int("active_options_count").unwrap_or_default(),
            unique_expiry_dates: row.int("unique_expiry_dates").unwrap_or_default(),
        }
    }
}
