//! Error types for primary and secondary store operations

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Network or authentication failure while connecting or probing.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The store rejected a statement.
    #[error("Statement failed: {message} (SQL: {statement})")]
    Statement { statement: String, message: String },

    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },

    #[error("No open connection")]
    NotConnected,

    #[error("Secondary store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Secondary store format error: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub fn connection(message: impl Into<String>) -> Self {
        StoreError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn statement(statement: &str, message: impl Into<String>) -> Self {
        StoreError::Statement {
            statement: compact_sql(statement),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        StoreError::Timeout {
            operation: operation.into(),
            limit,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Collapses multi-line SQL into a single line for log output.
pub fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
