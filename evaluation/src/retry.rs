//! Retry budget and exponential back-off arithmetic for oracle samples.
//!
//! Pure arithmetic; the async sleep lives with the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy applied to each individual oracle sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Multiplier applied per subsequent retry (2.0 = exponential).
    pub backoff_multiplier: f64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// No retries, no delays.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            backoff_multiplier: 1.0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before `attempt` (0-indexed; attempt 0 is the first call and
    /// never waits).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        let delay =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        if !delay.is_finite() {
            return self.max_backoff_ms;
        }
        (delay as u64).min(self.max_backoff_ms)
    }

    /// Whether another attempt may follow the 0-indexed `attempt` that just failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms(attempt))
    }
}

impl Default for RetryPolicy {
    /// 2 retries, 500ms initial back-off, 2x multiplier, 5s cap.
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 5_000,
        }
    }
}
