//! SQL statements against the primary store

pub const HEALTH_CHECK: &str = "SELECT 1 AS health_check";

pub const INSERT_OPTION_TRADE: &str = "
    INSERT INTO option_trades (
        trade_time, stock_code, stock_name, stock_price, option_code,
        option_type, strike_price, expiry_date, volume, turnover,
        premium, trade_direction, bid_price, ask_price, last_price,
        change_rate, implied_volatility, delta_value, gamma_value,
        theta_value, vega_value, open_interest, time_to_expiry,
        moneyness, data_source
    ) VALUES (
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?, ?, ?
    )";

pub const UPSERT_PRICE_SNAPSHOT: &str = "
    INSERT INTO stock_prices_history (
        stock_code, stock_name, price, change_amount, change_rate,
        volume, turnover, high_price, low_price, open_price,
        prev_close, market_cap, pe_ratio, record_time, data_source
    ) VALUES (
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?, ?
    )
    ON DUPLICATE KEY UPDATE
        price = VALUES(price),
        change_amount = VALUES(change_amount),
        change_rate = VALUES(change_rate),
        volume = VALUES(volume),
        turnover = VALUES(turnover),
        high_price = VALUES(high_price),
        low_price = VALUES(low_price),
        open_price = VALUES(open_price),
        prev_close = VALUES(prev_close),
        market_cap = VALUES(market_cap),
        pe_ratio = VALUES(pe_ratio)";

pub const INSERT_PUSH_RECORD: &str = "
    INSERT INTO push_records (
        option_id, push_type, push_status, push_content,
        push_time, error_message, retry_count
    ) VALUES (?, ?, ?, ?, ?, ?, ?)";

/// Newest-first trades since a cutoff, capped at [`RECENT_TRADES_LIMIT`].
pub const RECENT_TRADES: &str = "
    SELECT * FROM option_trades
    WHERE trade_time >= ?
    ORDER BY trade_time DESC
    LIMIT 1000";

pub const RECENT_TRADES_FOR_STOCK: &str = "
    SELECT * FROM option_trades
    WHERE trade_time >= ? AND stock_code = ?
    ORDER BY trade_time DESC
    LIMIT 1000";

pub const RECENT_TRADES_LIMIT: usize = 1000;

pub const DAILY_SUMMARY: &str = "
    SELECT * FROM daily_summary
    WHERE summary_date = ?
    ORDER BY total_turnover DESC";

pub const REFRESH_DAILY_SUMMARY: &str = "
    INSERT INTO daily_summary (
        summary_date, stock_code, stock_name, total_trades, total_volume,
        total_turnover, call_trades, put_trades, call_volume, put_volume,
        call_turnover, put_turnover, avg_premium, max_single_trade,
        active_options_count, unique_expiry_dates
    )
    SELECT
        DATE(trade_time) AS summary_date,
        stock_code,
        stock_name,
        COUNT(*) AS total_trades,
        SUM(volume) AS total_volume,
        SUM(turnover) AS total_turnover,
        SUM(CASE WHEN option_type = 'Call' THEN 1 ELSE 0 END) AS call_trades,
        SUM(CASE WHEN option_type = 'Put' THEN 1 ELSE 0 END) AS put_trades,
        SUM(CASE WHEN option_type = 'Call' THEN volume ELSE 0 END) AS call_volume,
        SUM(CASE WHEN option_type = 'Put' THEN volume ELSE 0 END) AS put_volume,
        SUM(CASE WHEN option_type = 'Call' THEN turnover ELSE 0 END) AS call_turnover,
        SUM(CASE WHEN option_type = 'Put' THEN turnover ELSE 0 END) AS put_turnover,
        AVG(premium) AS avg_premium,
        MAX(turnover) AS max_single_trade,
        COUNT(DISTINCT option_code) AS active_options_count,
        COUNT(DISTINCT expiry_date) AS unique_expiry_dates
    FROM option_trades
    WHERE DATE(trade_time) = ?
    GROUP BY DATE(trade_time), stock_code, stock_name
    ON DUPLICATE KEY UPDATE
        total_trades = VALUES(total_trades),
        total_volume = VALUES(total_volume),
        total_turnover = VALUES(total_turnover),
        call_trades = VALUES(call_trades),
        put_trades = VALUES(put_trades),
        call_volume = VALUES(call_volume),
        put_volume = VALUES(put_volume),
        call_turnover = VALUES(call_turnover),
        put_turnover = VALUES(put_turnover),
        avg_premium = VALUES(avg_premium),
        max_single_trade = VALUES(max_single_trade),
        active_options_count = VALUES(active_options_count),
        unique_expiry_dates = VALUES(unique_expiry_dates),
        updated_at = CURRENT_TIMESTAMP";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriceSnapshot, PushRecord, TradeRecord};

    fn placeholders(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn test_placeholders_match_record_params() {
        assert_eq!(placeholders(INSERT_OPTION_TRADE), TradeRecord::default().to_params().len());
        assert_eq!(placeholders(UPSERT_PRICE_SNAPSHOT), PriceSnapshot::default().to_params().len());
        assert_eq!(placeholders(INSERT_PUSH_RECORD), PushRecord::default().to_params().len());
    }
}
