//! Record-level operations against the primary store

use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use tracing::{debug, info, warn};
use crate::{
    db::{ConnectionHandle, queries},
    errors::{StoreError, StoreResult},
    types::{DailySummary, PriceSnapshot, PushRecord, SqlValue, TradeRecord},
};

pub async fn save_trade(handle: &ConnectionHandle, trade: &TradeRecord) -> bool {
    let saved = handle.execute(queries::INSERT_OPTION_TRADE, &trade.to_params()).await;
    if saved {
        debug!(option = %trade.option_code, volume = trade.volume, "Trade stored in primary store");
    }
    saved
}

/// Last write wins on every mutable column of an existing snapshot.
pub async fn save_price_snapshot(handle: &ConnectionHandle, snapshot: &PriceSnapshot) -> bool {
    handle.execute(queries::UPSERT_PRICE_SNAPSHOT, &snapshot.to_params()).await
}

pub async fn save_push_record(handle: &ConnectionHandle, record: &PushRecord) -> bool {
    handle.execute(queries::INSERT_PUSH_RECORD, &record.to_params()).await
}

/// Newest-first trades from the last `hours`, optionally for one stock.
pub async fn recent_trades(
    handle: &ConnectionHandle,
    hours: i64,
    stock_code: Option<&str>,
) -> Option<Vec<TradeRecord>> {
    let cutoff = Local::now().naive_local() - ChronoDuration::hours(hours);
    let rows = match stock_code {
        Some(code) => {
            handle
                .query(queries::RECENT_TRADES_FOR_STOCK, &[SqlValue::from(cutoff), SqlValue::from(code)])
                .await?
        }
        None => handle.query(queries::RECENT_TRADES, &[SqlValue::from(cutoff)]).await?,
    };

    if rows.len() >= queries::RECENT_TRADES_LIMIT {
        warn!(limit = queries::RECENT_TRADES_LIMIT, "Recent trades truncated");
    }
    Some(rows.iter().map(TradeRecord::from_row).collect())
}

pub async fn daily_summary(handle: &ConnectionHandle, date: NaiveDate) -> Option<Vec<DailySummary>> {
    let rows = handle.query(queries::DAILY_SUMMARY, &[SqlValue::from(date)]).await?;
    Some(rows.iter().map(DailySummary::from_row).collect())
}

/// Re-aggregates one day of trades into the summary table.
pub async fn update_daily_summary(handle: &ConnectionHandle, date: NaiveDate) -> bool {
    let updated = handle.execute(queries::REFRESH_DAILY_SUMMARY, &[SqlValue::from(date)]).await;
    if updated {
        info!(%date, "📊 Daily summary refreshed");
    }
    updated
}

/// Round-trips the liveness query. The error carries the failure reason.
pub async fn health_check(handle: &ConnectionHandle) -> StoreResult<()> {
    let rows = handle.try_query(queries::HEALTH_CHECK, &[]).await?;
    if rows.is_empty() {
        return Err(StoreError::statement(queries::HEALTH_CHECK, "health check returned no rows"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::testing::MockBackend;
    use crate::types::Row;
    use rust_decimal_macros::dec;

    fn handle(backend: &MockBackend) -> ConnectionHandle {
        ConnectionHandle::new(DatabaseConfig::default(), backend.connector())
    }

    #[tokio::test]
    async fn test_save_trade_binds_every_column() {
        let backend = MockBackend::new();
        let trade = TradeRecord {
            option_code: "HK.TCH250328C400000".to_string(),
            volume: 10,
            turnover: dec!(5000),
            ..TradeRecord::default()
        };

        assert!(save_trade(&handle(&backend), &trade).await);
        let committed = backend.committed();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].1.len(), 25);
        assert_eq!(committed[0].1[4], SqlValue::from("HK.TCH250328C400000"));
    }

    #[tokio::test]
    async fn test_recent_trades_filters_by_stock() {
        let backend = MockBackend::new();
        backend.set_rows(vec![
            Row::new()
                .with("stock_code", "HK.00700")
                .with("option_code", "HK.TCH250328C400000")
                .with("volume", 7i64),
        ]);
        let handle = handle(&backend);

        let trades = recent_trades(&handle, 24, Some("HK.00700")).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].volume, 7);

        let (sql, params) = backend.last_query().unwrap();
        assert!(sql.contains("stock_code = ?"));
        assert_eq!(params.len(), 2);
    }

    #[tokio::test]
    async fn test_recent_trades_none_on_failure() {
        let backend = MockBackend::new();
        backend.set_fail_queries(true);
        assert!(recent_trades(&handle(&backend), 24, None).await.is_none());
    }

    #[tokio::test]
    async fn test_health_check_keeps_failure_reason() {
        let backend = MockBackend::new();
        backend.script_health_checks([None, Some("server has gone away")]);
        let handle = handle(&backend);

        tokio_test::assert_ok!(health_check(&handle).await);
        let err = tokio_test::assert_err!(health_check(&handle).await);
        assert!(err.requires_reconnect());
        assert!(err.to_string().contains("server has gone away"));
    }
}
