//! Trade Sink - resilient persistence for streamed option trades
//!
//! Writes every trade to a MySQL primary store and an append-only CSV
//! file. A background health monitor keeps the primary connection alive
//! and tells readers when to fall back to the CSV copy.

pub mod config;
pub mod types;
pub mod errors;
pub mod db;
pub mod monitor;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use config::Config;
pub use db::ConnectionHandle;
pub use errors::{StoreError, StoreResult};
pub use monitor::HealthMonitor;
pub use storage::{PersistenceRouter, StatisticsAggregator};
pub use types::*;
