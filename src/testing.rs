//! Scriptable in-process store backend for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use crate::{
    config::DatabaseConfig,
    db::{StoreConnector, StoreSession, queries},
    errors::{StoreError, StoreResult},
    types::{Row, SqlValue},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub connect_attempts: u32,
    pub connects: u32,
    pub closes: u32,
    pub pings: u32,
    pub queries: u32,
    pub executes: u32,
    pub begins: u32,
    pub commits: u32,
    pub rollbacks: u32,
}

#[derive(Default)]
struct MockState {
    stats: MockStats,
    fail_connect: bool,
    failing_connects: u32,
    connect_delay: Option<Duration>,
    fail_ping: bool,
    fail_queries: bool,
    fail_writes: bool,
    writes_before_failure: Option<u32>,
    write_error_is_connection: bool,
    rows: Vec<Row>,
    check_script: VecDeque<Option<String>>,
    last_query: Option<(String, Vec<SqlValue>)>,
    in_transaction: bool,
    pending: Vec<(String, Vec<SqlValue>)>,
    committed: Vec<(String, Vec<SqlValue>)>,
}

/// Shared control panel; every connector and session it hands out reads
/// and records through the same state.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn StoreConnector> {
        Arc::new(MockConnector { state: self.state.clone() })
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn stats(&self) -> MockStats {
        self.lock().stats
    }

    pub fn committed(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.lock().committed.clone()
    }

    pub fn last_query(&self) -> Option<(String, Vec<SqlValue>)> {
        self.lock().last_query.clone()
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// The next `count` connect attempts fail, later ones succeed.
    pub fn fail_connects(&self, count: u32) {
        self.lock().failing_connects = count;
    }

    /// Every connect attempt takes this long before it resolves.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = Some(delay);
    }

    pub fn set_fail_ping(&self, fail: bool) {
        self.lock().fail_ping = fail;
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.lock().fail_queries = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Lets `count` more writes through, then fails every write after.
    pub fn fail_writes_after(&self, count: u32) {
        self.lock().writes_before_failure = Some(count);
    }

    pub fn set_write_error_is_connection(&self, connection: bool) {
        self.lock().write_error_is_connection = connection;
    }

    /// Rows returned by every query except the health check.
    pub fn set_rows(&self, rows: Vec<Row>) {
        self.lock().rows = rows;
    }

    /// Queues health-check outcomes: `None` succeeds, `Some(reason)` fails
    /// with that reason. Once drained, checks succeed.
    pub fn script_health_checks<'a>(&self, outcomes: impl IntoIterator<Item = Option<&'a str>>) {
        self.lock()
            .check_script
            .extend(outcomes.into_iter().map(|o| o.map(str::to_string)));
    }
}

struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl StoreConnector for MockConnector {
    async fn connect(&self, _config: &DatabaseConfig) -> StoreResult<Box<dyn StoreSession>> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.stats.connect_attempts += 1;
            state.connect_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(StoreError::connection("connection refused"));
        }
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(StoreError::connection("connection refused"));
        }
        state.stats.connects += 1;
        Ok(Box::new(MockSession {
            state: self.state.clone(),
            open: true,
        }))
    }
}

struct MockSession {
    state: Arc<Mutex<MockState>>,
    open: bool,
}

impl MockSession {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl StoreSession for MockSession {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn ping(&mut self) -> StoreResult<()> {
        let mut state = self.lock();
        state.stats.pings += 1;
        if state.fail_ping {
            return Err(StoreError::connection("ping failed"));
        }
        Ok(())
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Row>> {
        let mut state = self.lock();
        state.stats.queries += 1;
        if state.fail_queries {
            return Err(StoreError::connection("lost connection during query"));
        }
        if sql == queries::HEALTH_CHECK {
            return match state.check_script.pop_front().flatten() {
                Some(reason) => Err(StoreError::connection(reason)),
                None => Ok(vec![Row::new().with("health_check", 1i64)]),
            };
        }
        state.last_query = Some((sql.to_string(), params.to_vec()));
        Ok(state.rows.clone())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<u64> {
        let mut state = self.lock();
        state.stats.executes += 1;

        let exhausted = match state.writes_before_failure.as_mut() {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        };
        if state.fail_writes || exhausted {
            return Err(if state.write_error_is_connection {
                StoreError::connection("server has gone away")
            } else {
                StoreError::statement(sql, "duplicate entry")
            });
        }

        let entry = (sql.to_string(), params.to_vec());
        if state.in_transaction {
            state.pending.push(entry);
        } else {
            state.committed.push(entry);
        }
        Ok(1)
    }

    async fn begin(&mut self) -> StoreResult<()> {
        let mut state = self.lock();
        state.stats.begins += 1;
        state.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut state = self.lock();
        state.stats.commits += 1;
        state.in_transaction = false;
        let pending = std::mem::take(&mut state.pending);
        state.committed.extend(pending);
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        let mut state = self.lock();
        state.stats.rollbacks += 1;
        state.in_transaction = false;
        state.pending.clear();
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> StoreResult<()> {
        self.open = false;
        self.lock().stats.closes += 1;
        Ok(())
    }
}
