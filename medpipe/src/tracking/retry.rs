//! Exponential backoff for tracking requests

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for requests to the tracking server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 200,
            backoff_multiplier: 2.0,
            max_backoff_ms: 10000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (0-based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff_ms =
            (self.initial_backoff_ms as f32 * self.backoff_multiplier.powi(attempt as i32)) as u64;
        Duration::from_millis(backoff_ms.min(self.max_backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_duration(0).as_millis(), 200);
        assert_eq!(policy.backoff_duration(1).as_millis(), 400);
        assert_eq!(policy.backoff_duration(2).as_millis(), 800);
        assert_eq!(policy.backoff_duration(10).as_millis(), 10000);
    }

    #[test]
    fn test_none_policy() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
