//! Background health monitoring of the primary store

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::{
    config::MonitorConfig,
    db::{ConnectionHandle, repository},
    types::{HealthStatus, UptimeInfo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Unstarted,
    Running,
    Stopped,
}

/// Rolling health-check counters. Counters only grow until [`reset`](Self::reset).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthCounters {
    pub is_healthy: bool,
    pub check_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_check_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_failure_reason: Option<String>,
}

impl HealthCounters {
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.check_count += 1;
        self.success_count += 1;
        self.is_healthy = true;
        self.last_check_time = Some(at);
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>, reason: impl Into<String>) {
        self.check_count += 1;
        self.failure_count += 1;
        self.is_healthy = false;
        self.last_check_time = Some(at);
        self.last_failure_time = Some(at);
        self.last_failure_reason = Some(reason.into());
    }

    /// Percentage of passed checks, 0 before the first check.
    pub fn success_rate(&self) -> f64 {
        if self.check_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.check_count as f64 * 100.0
    }

    /// Zeroes the counters and failure history. The current health verdict
    /// and last check time survive.
    pub fn reset(&mut self) {
        self.check_count = 0;
        self.success_count = 0;
        self.failure_count = 0;
        self.last_failure_time = None;
        self.last_failure_reason = None;
    }
}

/// State shared between the monitor and its background task.
struct MonitorCore {
    handle: ConnectionHandle,
    counters: RwLock<HealthCounters>,
}

impl MonitorCore {
    async fn check(&self) -> bool {
        // Counters are locked only after the round trip.
        let outcome = repository::health_check(&self.handle).await;
        let now = Utc::now();
        let mut counters = self.counters.write().await;
        match outcome {
            Ok(()) => {
                counters.record_success(now);
                debug!(checks = counters.check_count, "Primary store health check passed");
                true
            }
            Err(e) => {
                counters.record_failure(now, e.to_string());
                warn!(
                    error = %e,
                    failures = counters.failure_count,
                    "⚠️ Primary store health check failed"
                );
                false
            }
        }
    }
}

struct Lifecycle {
    state: MonitorState,
    task: Option<JoinHandle<()>>,
    /// Loop that outlived its stop timeout; still finishing a check.
    lingering: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    started_at: Option<Instant>,
}

pub struct HealthMonitor {
    core: Arc<MonitorCore>,
    config: MonitorConfig,
    lifecycle: Mutex<Lifecycle>,
}

impl HealthMonitor {
    pub fn new(handle: ConnectionHandle, config: MonitorConfig) -> Self {
        Self {
            core: Arc::new(MonitorCore {
                handle,
                counters: RwLock::new(HealthCounters::default()),
            }),
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: MonitorState::Unstarted,
                task: None,
                lingering: None,
                cancel: None,
                started_at: None,
            }),
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.core.handle
    }

    pub async fn state(&self) -> MonitorState {
        self.lifecycle.lock().await.state
    }

    /// Spawns the monitoring loop. A no-op while already running.
    ///
    /// If an earlier `stop` timed out, this first waits for that loop to
    /// finish its check so two loops never overlap.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state == MonitorState::Running {
            warn!("Health monitoring is already running");
            return;
        }

        if let Some(previous) = lifecycle.lingering.take() {
            debug!("Waiting for the previous monitoring loop to exit");
            if let Err(e) = previous.await {
                error!(error = %e, "Previous health monitoring task ended abnormally");
            }
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(monitoring_loop(
            Arc::clone(&self.core),
            token.clone(),
            self.config.check_interval,
        ));

        lifecycle.state = MonitorState::Running;
        lifecycle.task = Some(task);
        lifecycle.cancel = Some(token);
        lifecycle.started_at = Some(Instant::now());
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            "🩺 Health monitoring started"
        );
    }

    /// Signals the loop and waits up to the stop timeout for it to exit.
    /// A loop still mid-check after the timeout finishes that check and
    /// exits on its own; the next `start` waits for it.
    pub async fn stop(&self) {
        let (task, token) = {
            let mut lifecycle = self.lifecycle.lock().await;
            if lifecycle.state != MonitorState::Running {
                debug!("Health monitoring is not running");
                return;
            }
            lifecycle.state = MonitorState::Stopped;
            (lifecycle.task.take(), lifecycle.cancel.take())
        };

        if let Some(token) = token {
            token.cancel();
        }
        let Some(mut task) = task else {
            return;
        };

        match tokio::time::timeout(self.config.stop_timeout, &mut task).await {
            Ok(Ok(())) => info!("Health monitoring stopped"),
            Ok(Err(e)) => error!(error = %e, "Health monitoring task ended abnormally"),
            Err(_) => {
                warn!(
                    timeout_secs = self.config.stop_timeout.as_secs(),
                    "Health monitoring did not stop in time, leaving it to finish its current check"
                );
                self.lifecycle.lock().await.lingering = Some(task);
            }
        }
    }

    /// Runs one check and records its outcome.
    pub async fn check_health(&self) -> bool {
        self.core.check().await
    }

    pub async fn get_health_status(&self) -> HealthStatus {
        let counters = self.core.counters.read().await.clone();
        let monitoring_active = self.monitoring_active().await;
        let connection = self.core.handle.connection_info();

        HealthStatus {
            is_healthy: counters.is_healthy,
            check_count: counters.check_count,
            success_count: counters.success_count,
            failure_count: counters.failure_count,
            success_rate: counters.success_rate(),
            last_check_time: counters.last_check_time,
            last_failure_time: counters.last_failure_time,
            last_failure_reason: counters.last_failure_reason,
            monitoring_active,
            connection,
        }
    }

    /// Rebuilds the connection outside the loop, then checks it right away.
    pub async fn force_reconnect(&self) -> bool {
        info!("🔄 Forcing primary store reconnect");
        self.core.handle.disconnect().await;
        let connected = self.core.handle.connect().await;
        if connected {
            info!("✅ Forced reconnect succeeded");
        } else {
            error!("❌ Forced reconnect failed");
        }
        self.check_health().await;
        connected
    }

    /// Healthy verdict of the most recent check. False before any check.
    pub async fn is_database_available(&self) -> bool {
        self.core.counters.read().await.is_healthy
    }

    pub async fn uptime_info(&self) -> UptimeInfo {
        let started_at = self.lifecycle.lock().await.started_at;
        let is_healthy = self.is_database_available().await;
        let check_interval_secs = self.config.check_interval.as_secs();

        let Some(started_at) = started_at else {
            return UptimeInfo {
                uptime_seconds: 0,
                uptime_hours: 0.0,
                status: "Not started".to_string(),
                check_interval_secs,
            };
        };

        let elapsed = started_at.elapsed();
        UptimeInfo {
            uptime_seconds: elapsed.as_secs(),
            uptime_hours: (elapsed.as_secs_f64() / 3600.0 * 100.0).round() / 100.0,
            status: if is_healthy { "Healthy" } else { "Unhealthy" }.to_string(),
            check_interval_secs,
        }
    }

    pub async fn reset_statistics(&self) {
        self.core.counters.write().await.reset();
        info!("Health check statistics reset");
    }

    /// Stops monitoring and closes the connection. Every exit path of the
    /// owning process calls this once.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.core.handle.disconnect().await;
        info!("Health monitor shut down");
    }

    pub async fn monitoring_active(&self) -> bool {
        let lifecycle = self.lifecycle.lock().await;
        lifecycle.state == MonitorState::Running
            && lifecycle.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

async fn monitoring_loop(core: Arc<MonitorCore>, token: CancellationToken, interval: std::time::Duration) {
    while !token.is_cancelled() {
        let healthy = core.check().await;
        if token.is_cancelled() {
            break;
        }
        if !healthy {
            info!("Primary store unhealthy, attempting reconnect");
            if core.handle.connect().await {
                info!("✅ Primary store reconnected");
            } else {
                error!("❌ Primary store reconnect failed");
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("Health monitoring loop exited");
}
