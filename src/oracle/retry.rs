//! Bounded retry with exponential backoff for transient oracle failures

use super::{OracleError, OracleResult};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Run `op`, retrying while it fails with a transient error and the
    /// retry budget lasts. Permanent errors are returned immediately.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> OracleResult<T>) -> OracleResult<T> {
        let mut retry = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retry < self.max_retries => {
                    let delay = self.backoff_for(retry);
                    debug!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        err,
                        retry + 1,
                        self.max_retries,
                        delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
