//! MySQL implementation of the store backend

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Executor, Row as _, TypeInfo, ValueRef};
use std::future::Future;
use std::time::Duration;
use crate::{
    config::DatabaseConfig,
    db::backend::{StoreConnector, StoreSession},
    errors::{StoreError, StoreResult},
    types::{Row, SqlValue},
};

/// Opens sqlx MySQL connections with the configured timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

#[async_trait]
impl StoreConnector for MySqlConnector {
    async fn connect(&self, config: &DatabaseConfig) -> StoreResult<Box<dyn StoreSession>> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .charset(&config.charset);

        let mut conn = bounded("connect", "connect", config.connect_timeout, options.connect())
            .await
            .map_err(connect_failure)?;

        if !config.autocommit {
            let sql = "SET autocommit = 0";
            bounded("set autocommit", sql, config.write_timeout, (&mut conn).execute(sql))
                .await
                .map_err(connect_failure)?;
        }

        Ok(Box::new(MySqlSession {
            conn,
            broken: false,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }))
    }
}

pub struct MySqlSession {
    conn: MySqlConnection,
    broken: bool,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl MySqlSession {
    fn observe<T>(&mut self, result: StoreResult<T>) -> StoreResult<T> {
        track_broken(&mut self.broken, result)
    }

    /// Transaction control and session settings go over the text protocol;
    /// MySQL refuses to prepare them.
    async fn run_raw(&mut self, sql: &str) -> StoreResult<()> {
        let result = bounded(sql, sql, self.write_timeout, (&mut self.conn).execute(sql)).await;
        self.observe(result).map(|_| ())
    }
}

/// Marks a session dead after any connection-class failure.
fn track_broken<T>(broken: &mut bool, result: StoreResult<T>) -> StoreResult<T> {
    if let Err(e) = &result {
        if e.requires_reconnect() {
            *broken = true;
        }
    }
    result
}

/// Handshake and auth rejections come back as database errors; while
/// connecting they are connection failures.
fn connect_failure(error: StoreError) -> StoreError {
    match error {
        StoreError::Statement { message, .. } => StoreError::connection(message),
        other => other,
    }
}

#[async_trait]
impl StoreSession for MySqlSession {
    fn is_open(&self) -> bool {
        !self.broken
    }

    async fn ping(&mut self) -> StoreResult<()> {
        let result = bounded("ping", "ping", self.read_timeout, self.conn.ping()).await;
        self.observe(result)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Row>> {
        let result = bounded(
            "query",
            sql,
            self.read_timeout,
            bind_params(sqlx::query(sql), params).fetch_all(&mut self.conn),
        )
        .await;
        let rows = self.observe(result)?;
        rows.iter().map(|row| decode_row(row, sql)).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<u64> {
        let result = bounded(
            "execute",
            sql,
            self.write_timeout,
            bind_params(sqlx::query(sql), params).execute(&mut self.conn),
        )
        .await;
        self.observe(result).map(|done| done.rows_affected())
    }

    async fn begin(&mut self) -> StoreResult<()> {
        self.run_raw("START TRANSACTION").await
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.run_raw("COMMIT").await
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.run_raw("ROLLBACK").await
    }

    async fn close(self: Box<Self>) -> StoreResult<()> {
        let limit = self.write_timeout;
        bounded("close", "close", limit, self.conn.close()).await
    }
}

async fn bounded<T, F>(operation: &str, statement: &str, limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(classify(e, statement)),
        Err(_) => Err(StoreError::timeout(operation, limit)),
    }
}

fn classify(error: sqlx::Error, statement: &str) -> StoreError {
    let lost_connection = matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    );

    if lost_connection {
        return StoreError::Connection {
            message: error.to_string(),
            source: Some(error.into()),
        };
    }

    match error {
        sqlx::Error::Database(db) => StoreError::statement(statement, db.message()),
        other => StoreError::statement(statement, other.to_string()),
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Decimal(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Timestamp(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
        };
    }
    query
}

fn decode_row(row: &MySqlRow, sql: &str) -> StoreResult<Row> {
    let mut decoded = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, idx, column.type_info().name()).map_err(|e| {
            StoreError::statement(sql, format!("cannot decode column `{}`: {}", column.name(), e))
        })?;
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn decode_cell(row: &MySqlRow, idx: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match type_name {
        "BOOLEAN" => SqlValue::Bool(row.try_get(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => SqlValue::Int(row.try_get(idx)?),
        name if name.ends_with("UNSIGNED") => {
            let v: u64 = row.try_get(idx)?;
            i64::try_from(v)
                .map(SqlValue::Int)
                .unwrap_or_else(|_| SqlValue::Text(v.to_string()))
        }
        "FLOAT" => SqlValue::Float(row.try_get::<f32, _>(idx)? as f64),
        "DOUBLE" => SqlValue::Float(row.try_get(idx)?),
        "DECIMAL" => SqlValue::Decimal(row.try_get(idx)?),
        "DATETIME" | "TIMESTAMP" => SqlValue::Timestamp(row.try_get(idx)?),
        "DATE" => SqlValue::Date(row.try_get(idx)?),
        _ => match row.try_get::<String, _>(idx) {
            Ok(text) => SqlValue::Text(text),
            Err(_) => {
                let bytes: Vec<u8> = row.try_get(idx)?;
                SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_error() -> sqlx::Error {
        sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"))
    }

    #[test]
    fn test_lost_connection_errors_require_reconnect() {
        for error in [io_error(), sqlx::Error::Protocol("bad packet".to_string()), sqlx::Error::PoolClosed] {
            let classified = classify(error, "COMMIT");
            assert!(classified.requires_reconnect(), "{classified}");
        }
    }

    #[test]
    fn test_statement_errors_are_skipped() {
        let classified = classify(sqlx::Error::RowNotFound, "SELECT * FROM option_trades");
        assert!(matches!(classified, StoreError::Statement { .. }));
        assert!(!classified.requires_reconnect());

        let classified = classify(sqlx::Error::ColumnNotFound("volume".to_string()), "SELECT volume");
        assert!(classified.to_string().contains("SELECT volume"));
    }

    #[test]
    fn test_rejection_while_connecting_is_a_connection_failure() {
        let rejected = StoreError::statement("connect", "Access denied for user 'option_user'");
        let mapped = connect_failure(rejected);
        assert!(matches!(mapped, StoreError::Connection { .. }));
        assert!(mapped.to_string().contains("Access denied"));

        assert!(matches!(
            connect_failure(StoreError::timeout("connect", Duration::from_secs(10))),
            StoreError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_raw_statement_failure_breaks_session() {
        let mut broken = false;
        let result = bounded("COMMIT", "COMMIT", Duration::from_secs(1), async { Err::<(), _>(io_error()) }).await;
        assert!(track_broken(&mut broken, result).is_err());
        assert!(broken);

        let mut broken = false;
        let result = bounded("COMMIT", "COMMIT", Duration::from_secs(1), async {
            Err::<(), _>(sqlx::Error::RowNotFound)
        })
        .await;
        assert!(track_broken(&mut broken, result).is_err());
        assert!(!broken, "statement errors leave the session usable");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_statement_times_out_and_breaks_session() {
        let mut broken = false;
        let result = bounded(
            "ROLLBACK",
            "ROLLBACK",
            Duration::from_secs(10),
            std::future::pending::<Result<(), sqlx::Error>>(),
        )
        .await;

        let err = track_broken(&mut broken, result).unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
        assert!(broken);
    }
}
