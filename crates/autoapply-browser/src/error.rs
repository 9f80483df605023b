//! Pool errors.

use std::time::Duration;

use thiserror::Error;

/// Browser pool error types.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No session became available within the acquire timeout.
    #[error("browser pool exhausted (waited {0:?})")]
    Exhausted(Duration),

    /// Launching a new browser session failed.
    #[error("failed to launch browser session: {0}")]
    Launch(String),

    /// The pool is shutting down and refuses new acquisitions.
    #[error("browser pool is shutting down")]
    ShuttingDown,
}

impl PoolError {
    /// Exhaustion is transient; the task may be redelivered later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Exhausted(_))
    }
}
