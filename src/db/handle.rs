//! Self-healing handle over a single primary-store connection
//!
//! Store operations take the handle lock for their duration, so every
//! statement, liveness check and reconnect is serialized through one
//! physical connection. Status readers (`is_open`, `connection_info`) read a
//! snapshot republished whenever that lock is released and never queue
//! behind I/O. Failures never escape as errors: they are logged and surfaced
//! as `false` / `None`.

use chrono::{DateTime, Utc};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use crate::{
    config::DatabaseConfig,
    db::{
        backend::{StoreConnector, StoreSession},
        mysql::MySqlConnector,
        retry::{RetryConfig, retry_with_backoff},
    },
    errors::{StoreError, StoreResult, compact_sql},
    types::{ConnectionInfo, Row, SqlValue},
};

#[derive(Default)]
struct HandleState {
    session: Option<Box<dyn StoreSession>>,
    /// Monotonic time the connection was last known to be alive.
    last_verified: Option<Instant>,
    /// Wall-clock twin of `last_verified`, for status reporting.
    last_verified_at: Option<DateTime<Utc>>,
}

impl HandleState {
    fn is_open(&self) -> bool {
        self.session.as_ref().is_some_and(|session| session.is_open())
    }

    fn mark_verified(&mut self) {
        self.last_verified = Some(Instant::now());
        self.last_verified_at = Some(Utc::now());
    }

    fn note_failure(&mut self, error: &StoreError) {
        if error.requires_reconnect() {
            // Force a ping before the next statement.
            self.last_verified = None;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LinkState {
    connected: bool,
    last_ping: Option<DateTime<Utc>>,
}

/// Held lock on the handle state. Republishes the link snapshot on release.
struct StateGuard<'a> {
    state: MutexGuard<'a, HandleState>,
    link: &'a watch::Sender<LinkState>,
}

impl Deref for StateGuard<'_> {
    type Target = HandleState;

    fn deref(&self) -> &HandleState {
        &self.state
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut HandleState {
        &mut self.state
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.link.send_replace(LinkState {
            connected: self.state.is_open(),
            last_ping: self.state.last_verified_at,
        });
    }
}

pub struct ConnectionHandle {
    config: DatabaseConfig,
    connector: Arc<dyn StoreConnector>,
    state: Mutex<HandleState>,
    link: watch::Sender<LinkState>,
}

impl ConnectionHandle {
    pub fn new(config: DatabaseConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            config,
            connector,
            state: Mutex::new(HandleState::default()),
            link: watch::Sender::new(LinkState::default()),
        }
    }

    /// Handle backed by the sqlx MySQL driver.
    pub fn mysql(config: DatabaseConfig) -> Self {
        Self::new(config, Arc::new(MySqlConnector))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    async fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            state: self.state.lock().await,
            link: &self.link,
        }
    }

    /// Opens a connection unless one is already open. Returns whether the
    /// handle is connected afterwards.
    pub async fn connect(&self) -> bool {
        let mut state = self.lock().await;
        match self.connect_locked(&mut state).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    host = %self.config.host,
                    port = self.config.port,
                    error = %e,
                    "❌ Failed to connect to primary store"
                );
                false
            }
        }
    }

    /// Closes the connection if one is open.
    pub async fn disconnect(&self) {
        let mut state = self.lock().await;
        state.last_verified = None;
        if let Some(session) = state.session.take() {
            match session.close().await {
                Ok(()) => info!("Primary store connection closed"),
                Err(e) => warn!(error = %e, "Error while closing primary store connection"),
            }
        }
    }

    /// Connection state as of the last completed operation.
    pub fn is_open(&self) -> bool {
        self.link.borrow().connected
    }

    /// Pings the connection if it has been idle longer than the ping
    /// interval, rebuilding it when the ping fails or no connection exists.
    pub async fn ensure_live(&self) -> bool {
        let mut state = self.lock().await;
        match self.ensure_live_locked(&mut state).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Primary store is not reachable");
                false
            }
        }
    }

    /// Runs a read statement. `None` means the read failed; `Some` with an
    /// empty vector means the store answered with no rows.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Option<Vec<Row>> {
        match self.try_query(sql, params).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                error!(error = %e, sql = %compact_sql(sql), "Query failed");
                None
            }
        }
    }

    /// Runs a write statement, committing it when autocommit is off.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> bool {
        let mut state = self.lock().await;
        if let Err(e) = self.ensure_live_locked(&mut state).await {
            error!(error = %e, sql = %compact_sql(sql), "Skipping statement, primary store unavailable");
            return false;
        }
        let Some(session) = state.session.as_mut() else {
            return false;
        };

        let result = match session.execute(sql, params).await {
            Ok(_) if self.config.autocommit => Ok(()),
            Ok(_) => session.commit().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, sql = %compact_sql(sql), "Statement failed");
                if !self.config.autocommit {
                    Self::rollback_quietly(session.as_mut()).await;
                }
                state.note_failure(&e);
                false
            }
        }
    }

    /// Applies the statement once per parameter set inside one transaction:
    /// either every row lands or none does. An empty list succeeds without
    /// touching the store.
    pub async fn execute_batch(&self, sql: &str, params_list: &[Vec<SqlValue>]) -> bool {
        if params_list.is_empty() {
            return true;
        }

        let mut state = self.lock().await;
        if let Err(e) = self.ensure_live_locked(&mut state).await {
            error!(error = %e, sql = %compact_sql(sql), "Skipping batch, primary store unavailable");
            return false;
        }
        let Some(session) = state.session.as_mut() else {
            return false;
        };

        match Self::run_batch(session.as_mut(), sql, params_list).await {
            Ok(()) => {
                debug!(rows = params_list.len(), "Batch applied");
                true
            }
            Err(e) => {
                error!(error = %e, sql = %compact_sql(sql), rows = params_list.len(), "Batch failed, rolling back");
                Self::rollback_quietly(session.as_mut()).await;
                state.note_failure(&e);
                false
            }
        }
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        let link = *self.link.borrow();
        ConnectionInfo {
            host: self.config.host.clone(),
            port: self.config.port,
            database: self.config.database.clone(),
            user: self.config.user.clone(),
            connected: link.connected,
            last_ping: link.last_ping,
        }
    }

    /// Polls `connect()` until it succeeds or `max_wait` is spent. Used right
    /// after the store has been started.
    pub async fn wait_until_ready(&self, max_wait: Duration, poll_interval: Duration) -> bool {
        let handle = self;
        let outcome = retry_with_backoff(
            move || async move {
                if handle.connect().await {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("primary store is not accepting connections"))
                }
            },
            &RetryConfig::polling(max_wait, poll_interval),
            "primary store readiness",
        )
        .await;

        match outcome {
            Ok(()) => {
                info!("✅ Primary store is ready");
                true
            }
            Err(e) => {
                warn!(error = %e, "⚠️ Primary store did not become ready in time");
                false
            }
        }
    }

    /// Like `query`, but hands the failure back instead of logging it.
    pub(crate) async fn try_query(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Row>> {
        let mut state = self.lock().await;
        self.ensure_live_locked(&mut state).await?;
        let session = state.session.as_mut().ok_or(StoreError::NotConnected)?;
        let result = session.query(sql, params).await;
        if let Err(e) = &result {
            state.note_failure(e);
        }
        result
    }

    async fn connect_locked(&self, state: &mut HandleState) -> StoreResult<()> {
        if state.is_open() {
            return Ok(());
        }

        // A session that reports closed is dead weight; drop it before
        // opening its replacement.
        state.session = None;
        state.last_verified = None;

        info!(
            "🔗 Connecting to primary store {}:{}/{}",
            self.config.host, self.config.port, self.config.database
        );
        let session = self.connector.connect(&self.config).await?;
        state.session = Some(session);
        state.mark_verified();
        info!("✅ Primary store connected");
        Ok(())
    }

    async fn ensure_live_locked(&self, state: &mut HandleState) -> StoreResult<()> {
        if !state.is_open() {
            return self.connect_locked(state).await;
        }

        let stale = state
            .last_verified
            .is_none_or(|verified| verified.elapsed() > self.config.ping_interval);
        if !stale {
            return Ok(());
        }

        let session = state.session.as_mut().ok_or(StoreError::NotConnected)?;
        match session.ping().await {
            Ok(()) => {
                state.mark_verified();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Liveness ping failed, reconnecting");
                state.session = None;
                self.connect_locked(state).await
            }
        }
    }

    async fn run_batch(
        session: &mut dyn StoreSession,
        sql: &str,
        params_list: &[Vec<SqlValue>],
    ) -> StoreResult<()> {
        session.begin().await?;
        for params in params_list {
            session.execute(sql, params).await?;
        }
        session.commit().await
    }

    async fn rollback_quietly(session: &mut dyn StoreSession) {
        if !session.is_open() {
            return;
        }
        if let Err(e) = session.rollback().await {
            warn!(error = %e, "Rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    fn handle_with(backend: &MockBackend, autocommit: bool) -> ConnectionHandle {
        let config = DatabaseConfig {
            autocommit,
            ..DatabaseConfig::default()
        };
        ConnectionHandle::new(config, backend.connector())
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);

        assert!(handle.connect().await);
        assert!(handle.connect().await);
        assert!(handle.is_open());
        assert_eq!(backend.stats().connects, 1);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_handle_closed() {
        let backend = MockBackend::new();
        backend.set_fail_connect(true);
        let handle = handle_with(&backend, true);

        assert!(!handle.connect().await);
        assert!(!handle.is_open());
        assert!(!handle.connection_info().connected);
    }

    #[tokio::test]
    async fn test_open_until_disconnect() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);

        assert!(handle.connect().await);
        assert!(handle.execute("INSERT INTO t VALUES (?)", &[SqlValue::Int(1)]).await);
        assert!(handle.is_open());

        handle.disconnect().await;
        assert!(!handle.is_open());
        assert_eq!(backend.stats().closes, 1);

        // Second disconnect is a no-op.
        handle.disconnect().await;
        assert_eq!(backend.stats().closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_live_pings_once_per_interval() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);
        assert!(handle.connect().await);

        assert!(handle.ensure_live().await);
        assert!(handle.ensure_live().await);
        assert_eq!(backend.stats().pings, 0, "fresh connection needs no ping");

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(handle.ensure_live().await);
        assert_eq!(backend.stats().pings, 1);

        assert!(handle.ensure_live().await);
        assert_eq!(backend.stats().pings, 1, "ping refreshed the verified mark");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ping_rebuilds_connection() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);
        assert!(handle.connect().await);

        backend.set_fail_ping(true);
        tokio::time::advance(Duration::from_secs(301)).await;

        assert!(handle.ensure_live().await);
        let stats = backend.stats();
        assert_eq!(stats.pings, 1);
        assert_eq!(stats.connects, 2);
    }

    #[tokio::test]
    async fn test_ensure_live_connects_when_never_connected() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);

        assert!(handle.ensure_live().await);
        assert_eq!(backend.stats().connects, 1);
        assert_eq!(backend.stats().pings, 0);
    }

    #[tokio::test]
    async fn test_query_distinguishes_failure_from_empty() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);

        let rows = handle.query("SELECT * FROM option_trades", &[]).await;
        assert_eq!(rows, Some(vec![]));

        backend.set_fail_queries(true);
        assert_eq!(handle.query("SELECT * FROM option_trades", &[]).await, None);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_without_autocommit() {
        let backend = MockBackend::new();
        backend.set_fail_writes(true);
        let handle = handle_with(&backend, false);

        assert!(!handle.execute("INSERT INTO t VALUES (?)", &[SqlValue::Int(1)]).await);
        let stats = backend.stats();
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(stats.commits, 0);
    }

    #[tokio::test]
    async fn test_write_commits_without_autocommit() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, false);

        assert!(handle.execute("INSERT INTO t VALUES (?)", &[SqlValue::Int(1)]).await);
        assert_eq!(backend.stats().commits, 1);
    }

    #[tokio::test]
    async fn test_empty_batch_touches_nothing() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);

        assert!(handle.execute_batch("INSERT INTO t VALUES (?)", &[]).await);
        let stats = backend.stats();
        assert_eq!(stats.connects, 0);
        assert_eq!(stats.executes, 0);
        assert_eq!(stats.begins, 0);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let backend = MockBackend::new();
        backend.fail_writes_after(2);
        let handle = handle_with(&backend, true);

        let rows: Vec<Vec<SqlValue>> = (0..4).map(|i| vec![SqlValue::Int(i)]).collect();
        assert!(!handle.execute_batch("INSERT INTO t VALUES (?)", &rows).await);

        let stats = backend.stats();
        assert_eq!(stats.begins, 1);
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(stats.commits, 0);
        assert!(backend.committed().is_empty(), "no row may survive a failed batch");
    }

    #[tokio::test]
    async fn test_batch_commits_every_row() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);

        let rows: Vec<Vec<SqlValue>> = (0..3).map(|i| vec![SqlValue::Int(i)]).collect();
        assert!(handle.execute_batch("INSERT INTO t VALUES (?)", &rows).await);
        assert_eq!(backend.committed().len(), 3);
    }

    #[tokio::test]
    async fn test_connection_failure_forces_next_ping() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);
        assert!(handle.connect().await);

        backend.set_write_error_is_connection(true);
        backend.set_fail_writes(true);
        assert!(!handle.execute("INSERT INTO t VALUES (?)", &[]).await);

        backend.set_fail_writes(false);
        assert!(handle.execute("INSERT INTO t VALUES (?)", &[]).await);
        assert_eq!(backend.stats().pings, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_ready_polls_until_connect_succeeds() {
        let backend = MockBackend::new();
        backend.fail_connects(2);
        let handle = handle_with(&backend, true);

        assert!(
            handle
                .wait_until_ready(Duration::from_secs(60), Duration::from_secs(2))
                .await
        );
        assert!(handle.is_open());
        assert_eq!(backend.stats().connect_attempts, 3);
    }

    #[tokio::test]
    async fn test_connection_info_reports_target() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);
        assert!(handle.connection_info().last_ping.is_none());

        assert!(handle.connect().await);
        let info = handle.connection_info();
        assert_eq!(info.host, "localhost");
        assert_eq!(info.port, 3306);
        assert!(info.connected);
        assert!(info.last_ping.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reads_do_not_wait_for_slow_connect() {
        let backend = MockBackend::new();
        backend.set_connect_delay(Duration::from_secs(10));
        let handle = Arc::new(handle_with(&backend, true));

        let connecting = tokio::spawn({
            let handle = Arc::clone(&handle);
            async move { handle.connect().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(backend.stats().connect_attempts, 1, "connect should be in flight");

        let started = Instant::now();
        let info = handle.connection_info();
        assert!(!info.connected);
        assert!(!handle.is_open());
        assert_eq!(started.elapsed(), Duration::ZERO);

        assert!(connecting.await.unwrap());
        assert!(handle.is_open());
        assert!(handle.connection_info().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_ready_respects_max_wait_with_slow_connects() {
        let backend = MockBackend::new();
        backend.set_fail_connect(true);
        backend.set_connect_delay(Duration::from_secs(10));
        let handle = handle_with(&backend, true);

        let started = Instant::now();
        let ready = handle
            .wait_until_ready(Duration::from_secs(60), Duration::from_secs(2))
            .await;

        let elapsed = started.elapsed();
        assert!(!ready);
        assert!(elapsed <= Duration::from_secs(61), "waited {elapsed:?}");
    }

    #[tokio::test]
    async fn test_try_query_keeps_failure_reason() {
        let backend = MockBackend::new();
        let handle = handle_with(&backend, true);
        assert!(handle.connect().await);

        backend.set_fail_queries(true);
        let err = tokio_test::assert_err!(handle.try_query("SELECT 1", &[]).await);
        assert!(err.requires_reconnect());
        assert!(err.to_string().contains("lost connection during query"));
    }
}
