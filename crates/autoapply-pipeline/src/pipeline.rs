//! Per-task orchestrator.
//!
//! One `process` call takes a task through
//! `Queued → DuplicateChecking → Running → {Completed | Failed |
//! SkippedDuplicate}`. The session is resolved (released or
//! terminated) on every exit path, and the result is recorded exactly
//! once whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use autoapply_browser::{BrowserPool, DriverFactory};
use autoapply_config::PipelineConfig;

use crate::dedupe::{DuplicateGuard, Freshness};
use crate::engine::FormFillingEngine;
use crate::error::ApplyError;
use crate::fingerprint::ApplicationFingerprint;
use crate::result::TaskResult;
use crate::sites::SiteRegistry;
use crate::store::{ApplicationStore, InsertOutcome};
use crate::task::ApplicationTask;

pub struct TaskPipeline<F: DriverFactory> {
    pool: Arc<BrowserPool<F>>,
    registry: SiteRegistry,
    guard: DuplicateGuard,
    store: Arc<dyn ApplicationStore>,
    engine: FormFillingEngine,
    config: PipelineConfig,
}

impl<F: DriverFactory> TaskPipeline<F> {
    pub fn new(
        pool: Arc<BrowserPool<F>>,
        registry: SiteRegistry,
        store: Arc<dyn ApplicationStore>,
        engine: FormFillingEngine,
        config: PipelineConfig,
    ) -> Self {
        Self {
            pool,
            registry,
            guard: DuplicateGuard::new(store.clone()),
            store,
            engine,
            config,
        }
    }

    /// Process one task to a terminal result. Never panics the caller:
    /// every failure mode maps to a recorded Failed/Skipped result.
    pub async fn process(&self, task: ApplicationTask, cancel: CancellationToken) -> TaskResult {
        let mut result = TaskResult::started(task.id);
        let fingerprint = ApplicationFingerprint::new(&task.user_id, &task.job_url);

        // Cheap pre-check before any browser work. The authoritative
        // barrier is insert_if_absent after the run.
        match self.guard.check(&fingerprint).await {
            Ok(Freshness::Duplicate) => {
                info!(task_id = %task.id, %fingerprint, "Skipping duplicate application");
                result = result.skipped_duplicate();
                self.record(&result).await;
                return result;
            }
            Ok(Freshness::Fresh) => {}
            Err(e) => {
                result = result.failed(&ApplyError::Store(e.to_string()));
                self.record(&result).await;
                return result;
            }
        }

        let url = match Url::parse(&task.job_url) {
            Ok(url) => url,
            Err(e) => {
                result = result.failed(&ApplyError::InvalidUrl(format!(
                    "{}: {}",
                    task.job_url, e
                )));
                self.record(&result).await;
                return result;
            }
        };

        let session = match self.pool.acquire().await {
            Ok(session) => session,
            Err(e) => {
                // PoolExhausted is surfaced as retryable so the
                // delivery collaborator can redeliver with backoff.
                result = result.failed(&ApplyError::Pool(e));
                self.record(&result).await;
                return result;
            }
        };

        let handler = self.registry.resolve(&url);
        info!(
            task_id = %task.id,
            site = handler.name(),
            session_id = %session.session_id(),
            "Running application"
        );

        let budget = Duration::from_secs(self.config.run_budget_secs);
        let mut evidence_urls = Vec::new();
        let run = tokio::time::timeout(
            budget,
            self.engine.run(
                session.driver(),
                handler.as_ref(),
                &task,
                &url,
                self.config.submit,
                &cancel,
                &mut evidence_urls,
            ),
        )
        .await;

        result.evidence_urls = evidence_urls;
        result = match run {
            Ok(Ok(())) => {
                // The session finished cleanly; give it back before the
                // (possibly slow) persistence write.
                session.release(true).await;
                match self.store.insert_if_absent(&fingerprint, &result).await {
                    Ok(InsertOutcome::Inserted) => result.completed(),
                    Ok(InsertOutcome::AlreadyExists) => {
                        // Lost the race to a concurrent same-fingerprint
                        // task. The browser work was redundant; record
                        // the downgrade, attempt nothing compensating.
                        warn!(task_id = %task.id, %fingerprint, "Lost duplicate race after submission");
                        result.skipped_duplicate()
                    }
                    Err(e) => result.failed(&ApplyError::Store(e.to_string())),
                }
            }
            Ok(Err(e)) => {
                // An aborted run leaves the page in an untrusted state.
                session.release(false).await;
                result.failed(&e)
            }
            Err(_) => {
                warn!(task_id = %task.id, budget_secs = self.config.run_budget_secs, "Run budget exceeded");
                session.release(false).await;
                result.failed(&ApplyError::DeadlineExceeded)
            }
        };

        self.record(&result).await;
        result
    }

    async fn record(&self, result: &TaskResult) {
        if let Err(e) = self.store.record_result(result).await {
            warn!(task_id = %result.task_id, "Failed to record task result: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
