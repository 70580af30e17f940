//! Bounded retry with fixed backoff and a per-attempt timeout.
//!
//! Every external call made by the router goes through a [`RetryPolicy`], so
//! the worst-case latency of a stage is
//! `max_attempts * attempt_timeout + (max_attempts - 1) * backoff`.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, Stage};

/// Hard upper bound on attempts per external call.
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration, attempt_timeout: Duration) -> Self {
        Self { max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS), backoff, attempt_timeout }
    }

    pub fn single_attempt(attempt_timeout: Duration) -> Self {
        Self::new(1, Duration::ZERO, attempt_timeout)
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.clamp(1, MAX_ATTEMPTS);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    /// An attempt that exceeds the timeout counts as `stage` being unavailable.
    pub async fn run<T, F, Fut>(&self, stage: Stage, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.attempt_timeout, op(attempt)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(stage.unavailable(format!(
                    "{} call timed out after {}ms",
                    stage.as_str(),
                    self.attempt_timeout.as_millis()
                ))),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    debug!(stage = stage.as_str(), attempt, error = %err, "transient failure, retrying");
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
