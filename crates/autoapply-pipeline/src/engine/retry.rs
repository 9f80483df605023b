//! Per-step retry policy, applied uniformly by the engine.

use std::time::Duration;

use autoapply_config::EngineConfig;
use autoapply_browser::DriverError;

/// Bounded immediate re-attempts for transient rendering delays.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.step_attempts,
            backoff: Duration::from_millis(config.step_backoff_ms),
        }
    }

    /// Definitive steps observe a page state retrying cannot change.
    pub fn attempts_for(&self, definitive: bool) -> u32 {
        if definitive {
            1
        } else {
            self.max_attempts.max(1)
        }
    }

    /// Only transient misses are worth re-attempting; a crashed
    /// session or a rejected navigation will not recover by waiting.
    pub fn recoverable(&self, error: &DriverError) -> bool {
        matches!(error, DriverError::NotFound(_) | DriverError::Timeout(_))
    }
}
