//! Display and printing utilities

use tracing::{info, warn};
use crate::{
    storage::RouterStats,
    types::{Activity, HealthStatus, TradeStatistics, UptimeInfo},
};

pub fn print_health_status(status: &HealthStatus, uptime: &UptimeInfo) {
    let verdict = if status.is_healthy { "✅ HEALTHY" } else { "❌ UNHEALTHY" };

    info!("\n🩺 Primary Store Health: {}", verdict);
    info!(
        "   Target: {}@{}:{}/{} ({})",
        status.connection.user,
        status.connection.host,
        status.connection.port,
        status.connection.database,
        if status.connection.connected { "connected" } else { "disconnected" }
    );
    info!(
        "   Checks: {} total, {} ok, {} failed ({:.1}% success)",
        status.check_count, status.success_count, status.failure_count, status.success_rate
    );
    info!(
        "   Monitoring: {} (uptime {:.2}h, every {}s)",
        if status.monitoring_active { "active" } else { "inactive" },
        uptime.uptime_hours,
        uptime.check_interval_secs
    );
    if let Some(last_ping) = status.connection.last_ping {
        info!("   Last verified alive: {}", last_ping.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let (Some(at), Some(reason)) = (status.last_failure_time, &status.last_failure_reason) {
        warn!("   Last failure at {}: {}", at.format("%Y-%m-%d %H:%M:%S UTC"), reason);
    }
}

pub fn print_trade_statistics(stats: &TradeStatistics) {
    if stats.activity == Activity::NoActivity {
        info!("\n📊 Trade Statistics: no recent activity (source: {:?})", stats.source);
        return;
    }

    info!("\n📊 Trade Statistics (source: {:?})", stats.source);
    info!("   Trades: {}", stats.total_trades);
    info!("   Stocks: {} | Options: {}", stats.unique_stocks, stats.unique_options);
    info!("   Volume: {} | Turnover: {:.2}", stats.total_volume, stats.total_turnover);
    if let Some(avg) = stats.avg_trade_size {
        info!("   Avg trade size: {:.1}", avg);
    }
    if let Some(latest) = stats.latest_trade_time {
        info!("   Latest trade: {}", latest.format("%Y-%m-%d %H:%M:%S"));
    }
}

pub fn print_router_stats(stats: &RouterStats) {
    info!("\n💾 Persistence ({} saves)", stats.saves);
    info!("   Primary: {} stored, {} failed", stats.primary_stored, stats.primary_failures);
    info!("   CSV: {} stored, {} failed", stats.secondary_stored, stats.secondary_failures);
}
