//! Store backend abstraction
//!
//! [`ConnectionHandle`](super::ConnectionHandle) talks to the primary store
//! only through these two traits, so the MySQL driver can be swapped for an
//! in-process fake in tests.

use async_trait::async_trait;
use crate::{
    config::DatabaseConfig,
    errors::StoreResult,
    types::{Row, SqlValue},
};

/// Opens physical connections to a store.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &DatabaseConfig) -> StoreResult<Box<dyn StoreSession>>;
}

/// One open physical connection. Not safe for concurrent use; callers
/// serialize access.
#[async_trait]
pub trait StoreSession: Send {
    /// False once the underlying socket is known to be gone.
    fn is_open(&self) -> bool;

    async fn ping(&mut self) -> StoreResult<()>;

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Row>>;

    /// Returns the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<u64>;

    async fn begin(&mut self) -> StoreResult<()>;

    async fn commit(&mut self) -> StoreResult<()>;

    async fn rollback(&mut self) -> StoreResult<()>;

    async fn close(self: Box<Self>) -> StoreResult<()>;
}
