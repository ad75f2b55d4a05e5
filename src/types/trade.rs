//! Option trade record types

use chrono::{Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::{Row, SqlValue};

pub const DEFAULT_DATA_SOURCE: &str = "futu";

/// One persisted option trade event.
///
/// Missing fields are filled from [`Default`] when a record crosses a
/// boundary (JSON ingest, CSV read, row decode). Required identifiers
/// default to empty strings, volume and turnover to zero, and the trade
/// time to the moment the record was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeRecord {
    pub trade_time: NaiveDateTime,
    pub stock_code: String,
    pub stock_name: String,
    pub stock_price: Option<Decimal>,
    pub option_code: String,
    pub option_type: String,
    pub strike_price: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
    pub volume: i64,
    pub turnover: Decimal,
    pub premium: Option<Decimal>,
    pub trade_direction: String,
    pub bid_price: Option<Decimal>,
    pub ask_price: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub change_rate: Option<f64>,
    pub implied_volatility: Option<f64>,
    pub delta_value: Option<f64>,
    pub gamma_value: Option<f64>,
    pub theta_value: Option<f64>,
    pub vega_value: Option<f64>,
    pub open_interest: Option<i64>,
    pub time_to_expiry: Option<f64>,
    pub moneyness: String,
    pub data_source: String,
}

impl Default for TradeRecord {
    fn default() -> Self {
        Self {
            trade_time: Local::now().naive_local(),
            stock_code: String::new(),
            stock_name: String::new(),
            stock_price: None,
            option_code: String::new(),
            option_type: String::new(),
            strike_price: None,
            expiry_date: None,
            volume: 0,
            turnover: Decimal::ZERO,
            premium: None,
            trade_direction: String::new(),
            bid_price: None,
            ask_price: None,
            last_price: None,
            change_rate: None,
            implied_volatility: None,
            delta_value: None,
            gamma_value: None,
            theta_value: None,
            vega_value: None,
            open_interest: None,
            time_to_expiry: None,
            moneyness: String::new(),
            data_source: DEFAULT_DATA_SOURCE.to_string(),
        }
    }
}

impl TradeRecord {
    /// Positional parameters matching [`crate::db::queries::INSERT_OPTION_TRADE`].
    pub fn to_params(&self) -> Vec<SqlValue> {
        vec![
            self.trade_time.into(),
            (&self.stock_code).into(),
            (&self.stock_name).into(),
            self.stock_price.into(),
            (&self.option_code).into(),
            (&self.option_type).into(),
            self.strike_price.into(),
            self.expiry_date.into(),
            self.volume.into(),
            self.turnover.into(),
            self.premium.into(),
            (&self.trade_direction).into(),
            self.bid_price.into(),
            self.ask_price.into(),
            self.last_price.into(),
            self.change_rate.into(),
            self.implied_volatility.into(),
            self.delta_value.into(),
            self.gamma_value.into(),
            self.theta_value.into(),
            self.vega_value.into(),
            self.open_interest.into(),
            self.time_to_expiry.into(),
            (&self.moneyness).into(),
            (&self.data_source).into(),
        ]
    }

    /// Decodes an `option_trades` row, defaulting absent or NULL columns.
    pub fn from_row(row: &Row) -> Self {
        let defaults = TradeRecord::default();
        Self {
            trade_time: row.timestamp("trade_time").unwrap_or(defaults.trade_time),
            stock_code: row.text("stock_code").unwrap_or_default(),
            stock_name: row.text("stock_name").unwrap_or_default(),
            stock_price: row.decimal("stock_price"),
            option_code: row.text("option_code").unwrap_or_default(),
            option_type: row.text("option_type").unwrap_or_default(),
            strike_price: row.decimal("strike_price"),
            expiry_date: row.date("expiry_date"),
            volume: row.int("volume").unwrap_or_default(),
            turnover: row.decimal("turnover").unwrap_or_default(),
            premium: row.decimal("premium"),
            trade_direction: row.text("trade_direction").unwrap_or_default(),
            bid_price: row.decimal("bid_price"),
            ask_price: row.decimal("ask_price"),
            last_price: row.decimal("last_price"),
            change_rate: row.float("change_rate"),
            implied_volatility: row.float("implied_volatility"),
            delta_value: row.float("delta_value"),
            gamma_value: row.float("gamma_value"),
            theta_value: row.float("theta_value"),
            vega_value: row.float("vega_value"),
            open_interest: row.int("open_interest"),
            time_to_expiry: row.float("time_to_expiry"),
            moneyness: row.text("moneyness").unwrap_or_default(),
            data_source: row.text("data_source").unwrap_or(defaults.data_source),
        }
    }
}
