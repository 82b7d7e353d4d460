//! Bounded retry policy.
//!
//! One reusable value consumed by the shutdown/start waiters and the health
//! checker. All polling in this crate is bounded; nothing waits indefinitely.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Health verification default: 12 attempts, 10s apart (2-minute budget).
    pub fn health_default() -> Self {
        Self::new(12, Duration::from_secs(10))
    }

    /// Shutdown/start wait default: 30 attempts, 2s apart.
    pub fn state_wait_default() -> Self {
        Self::new(30, Duration::from_secs(2))
    }

    /// Upper bound on the total time this policy may spend sleeping.
    pub fn total_budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}
