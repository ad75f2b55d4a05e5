//! Health monitoring types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the primary-store handle points and whether it is connected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub connected: bool,
    pub last_ping: Option<DateTime<Utc>>,
}

/// Point-in-time copy of the monitor's counters.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub check_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Percentage of checks that passed; 0 before the first check.
    pub success_rate: f64,
    pub last_check_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_failure_reason: Option<String>,
    pub monitoring_active: bool,
    pub connection: ConnectionInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct UptimeInfo {
    pub uptime_seconds: u64,
    pub uptime_hours: f64,
    pub status: String,
    pub check_interval_secs: u64,
}
