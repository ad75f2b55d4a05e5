//! Retry logic with exponential backoff

use std::time::Duration;
use anyhow::Result;
use tokio::time::{timeout_at, Instant};
use tracing::warn;
use crate::errors::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    /// Wall-clock cap across all attempts and sleeps, if any.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            exponential_base: 2.0,
            max_elapsed: None,
        }
    }
}

impl RetryConfig {
    /// Fixed-interval polling that gives up once `max_wait` has been spent,
    /// however long individual attempts take.
    pub fn polling(max_wait: Duration, poll_interval: Duration) -> Self {
        let poll_ms = poll_interval.as_millis().max(1) as u64;
        Self {
            max_attempts: u32::MAX,
            initial_delay_ms: poll_ms,
            max_delay_ms: poll_ms,
            exponential_base: 1.0,
            max_elapsed: Some(max_wait),
        }
    }
}

pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    config: &RetryConfig,
    context: &str,
) -> StoreResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let deadline = config.max_elapsed.map(|limit| Instant::now() + limit);
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        let outcome = match deadline {
            Some(deadline) => match timeout_at(deadline, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow::anyhow!("attempt still running when time ran out")),
            },
            None => operation().await,
        };

        let e = match outcome {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let out_of_time = deadline.is_some_and(|d| Instant::now() >= d);
        if attempt >= config.max_attempts || out_of_time {
            return Err(StoreError::Connection {
                message: format!("{} failed after {} attempts", context, attempt),
                source: Some(e),
            });
        }

        warn!(
            attempt,
            error = %e,
            retry_in_ms = delay,
            "{} attempt failed, retrying",
            context
        );

        let mut pause = Duration::from_millis(delay);
        if let Some(deadline) = deadline {
            pause = pause.min(deadline.saturating_duration_since(Instant::now()));
        }
        tokio::time::sleep(pause).await;

        delay = (delay as f64 * config.exponential_base) as u64;
        delay = delay.min(config.max_delay_ms);
        let jitter = (delay as f64 * 0.1 * (rand::random::<f64>() - 0.5)) as i64;
        delay = delay.saturating_add_signed(jitter);
    }
}
