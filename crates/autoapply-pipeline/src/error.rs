//! Task-level error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use autoapply_browser::PoolError;

/// Why a task failed, as persisted in its [`TaskResult`].
///
/// [`TaskResult`]: crate::result::TaskResult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No pool slot became available in time.
    PoolExhausted,
    /// The job URL could not be parsed.
    InvalidUrl,
    /// A form step's expected element is not on the page.
    StepNotFound,
    /// A form step timed out after its bounded retries.
    StepTimeout,
    /// The page navigated somewhere the handler does not recognize.
    UnexpectedRedirect,
    /// The browser session died mid-run.
    SessionCrashed,
    /// External cancellation observed at a step boundary.
    Cancelled,
    /// The Running phase exceeded its wall-clock budget.
    DeadlineExceeded,
    /// A persistence collaborator failed.
    Internal,
}

/// Structured failure cause attached to a Failed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
}

/// Errors raised while processing one application task.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("invalid job url: {0}")]
    InvalidUrl(String),

    #[error("step '{step}' target not found: {detail}")]
    StepNotFound { step: String, detail: String },

    #[error("step '{step}' timed out after {attempts} attempts")]
    StepTimeout { step: String, attempts: u32 },

    #[error("unexpected redirect to {url}")]
    UnexpectedRedirect { url: String },

    #[error("browser session crashed: {0}")]
    SessionCrashed(String),

    #[error("task cancelled")]
    Cancelled,

    #[error("run budget exceeded")]
    DeadlineExceeded,

    #[error("store operation failed: {0}")]
    Store(String),
}

impl ApplyError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ApplyError::Pool(_) => FailureKind::PoolExhausted,
            ApplyError::InvalidUrl(_) => FailureKind::InvalidUrl,
            ApplyError::StepNotFound { .. } => FailureKind::StepNotFound,
            ApplyError::StepTimeout { .. } => FailureKind::StepTimeout,
            ApplyError::UnexpectedRedirect { .. } => FailureKind::UnexpectedRedirect,
            ApplyError::SessionCrashed(_) => FailureKind::SessionCrashed,
            ApplyError::Cancelled => FailureKind::Cancelled,
            ApplyError::DeadlineExceeded => FailureKind::DeadlineExceeded,
            ApplyError::Store(_) => FailureKind::Internal,
        }
    }

    /// Whether an external redelivery of the whole task is worthwhile.
    ///
    /// Layout changes (StepNotFound, UnexpectedRedirect) and explicit
    /// cancellation will fail the same way again; transient conditions
    /// may not.
    pub fn retry_eligible(&self) -> bool {
        matches!(
            self,
            ApplyError::Pool(PoolError::Exhausted(_))
                | ApplyError::StepTimeout { .. }
                | ApplyError::SessionCrashed(_)
                | ApplyError::DeadlineExceeded
        )
    }

    pub fn cause(&self) -> FailureCause {
        FailureCause {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retry_eligibility() {
        assert!(ApplyError::Pool(PoolError::Exhausted(Duration::from_secs(1))).retry_eligible());
        assert!(ApplyError::DeadlineExceeded.retry_eligible());
        assert!(ApplyError::SessionCrashed("gone".into()).retry_eligible());
        assert!(!ApplyError::Cancelled.retry_eligible());
        assert!(!ApplyError::StepNotFound {
            step: "contact".into(),
            detail: "#email".into()
        }
        .retry_eligible());
        assert!(!ApplyError::UnexpectedRedirect {
            url: "https://login.example.com".into()
        }
        .retry_eligible());
    }

    #[test]
    fn test_cause_serializes_kind_snake_case() {
        let cause = ApplyError::StepTimeout {
            step: "submit".into(),
            attempts: 3,
        }
        .cause();
        let json = serde_json::to_string(&cause).unwrap();
        assert!(json.contains("\"step_timeout\""));
    }
}
