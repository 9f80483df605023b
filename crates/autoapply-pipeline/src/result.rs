//! Task outcome record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApplyError, FailureCause};

/// Pipeline status of one task. Completed, Failed and
/// SkippedDuplicate are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    SkippedDuplicate,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::SkippedDuplicate
        )
    }
}

/// Durable record of one task's processing. Mutated only by the
/// pipeline instance that owns the task; persisted exactly once per
/// terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub status: TaskStatus,

    #[serde(default)]
    pub evidence_urls: Vec<String>,

    #[serde(default)]
    pub failure: Option<FailureCause>,

    /// Hint for the external delivery collaborator: redelivering the
    /// task may succeed.
    #[serde(default)]
    pub retry_eligible: bool,

    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskResult {
    /// Fresh record for a task entering the pipeline.
    pub fn started(task_id: Uuid) -> Self {
        Self {
            task_id,
            status: TaskStatus::Running,
            evidence_urls: Vec::new(),
            failure: None,
            retry_eligible: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn completed(mut self) -> Self {
        self.status = TaskStatus::Completed;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn skipped_duplicate(mut self) -> Self {
        self.status = TaskStatus::SkippedDuplicate;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn failed(mut self, error: &ApplyError) -> Self {
        self.status = TaskStatus::Failed;
        self.failure = Some(error.cause());
        self.retry_eligible = error.retry_eligible();
        self.finished_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::SkippedDuplicate.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn test_failed_records_cause_and_retry_hint() {
        let result = TaskResult::started(Uuid::new_v4()).failed(&ApplyError::DeadlineExceeded);
        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.retry_eligible);
        assert_eq!(
            result.failure.as_ref().map(|c| c.kind),
            Some(FailureKind::DeadlineExceeded)
        );
        assert!(result.finished_at.is_some());
    }
}
