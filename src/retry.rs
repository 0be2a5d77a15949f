use std::{fmt::Display, thread, time::Duration};

use tracing::warn;

/// Classifies an error as a transient condition worth retrying (lock
/// contention, stale version) versus a business-rule failure that must
/// propagate on first occurrence.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Bounded retry with a fixed delay, modeled as plain control flow so the
/// policy is visible and testable rather than hidden behind interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. Every attempt re-runs the whole closure, so
    /// locks and reads start fresh. Returns the last error on exhaustion.
    pub fn run<T, E>(&self, mut op: impl FnMut() -> Result<T, E>) -> Result<T, E>
    where
        E: Transient + Display,
    {
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(attempt, max_attempts = self.max_attempts, "transient failure, retrying: {err}");
                    thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
