//! Statement parameters and result rows

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::Serialize;

/// A single positional statement parameter or result cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Bool(v) => Some(*v as i64),
            SqlValue::Decimal(v) => v.to_i64(),
            SqlValue::Float(v) => Some(*v as i64),
            SqlValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Float(v) => Some(*v),
            SqlValue::Int(v) => Some(*v as f64),
            SqlValue::Decimal(v) => v.to_f64(),
            SqlValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            SqlValue::Decimal(v) => Some(*v),
            SqlValue::Int(v) => Some(Decimal::from(*v)),
            SqlValue::Float(v) => Decimal::from_f64(*v),
            SqlValue::Text(v) => Decimal::from_str(v.trim()).ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Text(v) => Some(v.clone()),
            SqlValue::Bool(v) => Some(v.to_string()),
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Float(v) => Some(v.to_string()),
            SqlValue::Decimal(v) => Some(v.to_string()),
            SqlValue::Timestamp(v) => Some(v.to_string()),
            SqlValue::Date(v) => Some(v.to_string()),
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(v) => Some(*v),
            SqlValue::Date(v) => v.and_hms_opt(0, 0, 0),
            SqlValue::Text(v) => NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S").ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqlValue::Date(v) => Some(*v),
            SqlValue::Timestamp(v) => Some(v.date()),
            SqlValue::Text(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d").ok(),
            _ => None,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row: column names in select order, each with its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(SqlValue::as_text)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(SqlValue::as_f64)
    }

    pub fn decimal(&self, column: &str) -> Option<Decimal> {
        self.get(column).and_then(SqlValue::as_decimal)
    }

    pub fn timestamp(&self, column: &str) -> Option<NaiveDateTime> {
        self.get(column).and_then(SqlValue::as_timestamp)
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).and_then(SqlValue::as_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_preserves_column_order() {
        let row = Row::new()
            .with("stock_code", "HK.00700")
            .with("volume", 100i64)
            .with("premium", SqlValue::Null);
        let names: Vec<_> = row.columns().collect();
        assert_eq!(names, vec!["stock_code", "volume", "premium"]);
        assert_eq!(row.int("volume"), Some(100));
        assert_eq!(row.decimal("premium"), None);
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_numeric_coercions() {
        assert_eq!(SqlValue::Decimal(dec!(12.5)).as_f64(), Some(12.5));
        assert_eq!(SqlValue::Int(7).as_decimal(), Some(dec!(7)));
        assert_eq!(SqlValue::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(SqlValue::Null.as_text(), None);
    }

    #[test]
    fn test_option_converts_to_null() {
        let none: Option<Decimal> = None;
        assert!(SqlValue::from(none).is_null());
        assert_eq!(SqlValue::from(Some(dec!(1.5))), SqlValue::Decimal(dec!(1.5)));
    }
}
