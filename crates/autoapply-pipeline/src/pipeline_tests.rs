use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use autoapply_browser::{BrowserPool, Driver, DriverError, DriverFactory, PoolError};
use autoapply_config::{EngineConfig, PipelineConfig, PoolConfig};

use super::*;
use crate::error::FailureKind;
use crate::evidence::EvidenceCapture;
use crate::result::TaskStatus;
use crate::sites::test_support::sample_task;
use crate::sites::SiteRegistry;
use crate::store::{MemoryApplicationStore, MemoryObjectStore};
use crate::task::ApplicationTask;

/// Shared behavior knobs for every fake driver a factory launches.
#[derive(Default)]
struct Behavior {
    /// Selectors whose waits always time out.
    slow: HashSet<String>,
    /// Navigation delay, for budget tests.
    goto_delay: Duration,
    created: AtomicUsize,
    closed: AtomicUsize,
    active_runs: AtomicUsize,
    max_active_runs: AtomicUsize,
}

struct FakeDriver {
    behavior: Arc<Behavior>,
}

#[async_trait]
impl Driver for FakeDriver {
    async fn goto(&self, _url: &str) -> Result<(), DriverError> {
        let active = self.behavior.active_runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.behavior
            .max_active_runs
            .fetch_max(active, Ordering::SeqCst);
        if !self.behavior.goto_delay.is_zero() {
            tokio::time::sleep(self.behavior.goto_delay).await;
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok("https://jobs.example.com/openings/1".to_string())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<(), DriverError> {
        if self.behavior.slow.contains(selector) {
            return Err(DriverError::Timeout(selector.to_string()));
        }
        Ok(())
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(!self.behavior.slow.contains(selector))
    }

    async fn fill(&self, _selector: &str, _value: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        if selector.contains("submit") {
            self.behavior.active_runs.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn attach_file(&self, _selector: &str, _path: &Path) -> Result<(), DriverError> {
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Ok(vec![0u8; 8])
    }

    async fn probe(&self) -> bool {
        true
    }

    async fn close(&self) {
        self.behavior.closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeFactory {
    behavior: Arc<Behavior>,
}

#[async_trait]
impl DriverFactory for FakeFactory {
    type Driver = FakeDriver;

    async fn launch(&self) -> Result<FakeDriver, PoolError> {
        self.behavior.created.fetch_add(1, Ordering::SeqCst);
        Ok(FakeDriver {
            behavior: self.behavior.clone(),
        })
    }
}

struct Fixture {
    pool: Arc<BrowserPool<FakeFactory>>,
    pipeline: TaskPipeline<FakeFactory>,
    store: Arc<MemoryApplicationStore>,
    behavior: Arc<Behavior>,
}

fn fixture(max_sessions: usize, behavior: Behavior) -> Fixture {
    let behavior = Arc::new(behavior);
    let pool_config = PoolConfig {
        max_sessions,
        acquire_timeout_secs: 1,
        max_session_age_secs: 3600,
        max_idle_secs: 3600,
        reaper_interval_secs: 60,
        shutdown_timeout_secs: 2,
    };
    let pool = BrowserPool::new(
        pool_config,
        FakeFactory {
            behavior: behavior.clone(),
        },
    );

    let engine_config = EngineConfig {
        step_timeout_secs: 1,
        step_attempts: 2,
        step_backoff_ms: 1,
        max_wizard_pages: 2,
    };
    let store = MemoryApplicationStore::new();
    let engine = FormFillingEngine::new(
        engine_config,
        EvidenceCapture::new(MemoryObjectStore::new()),
    );
    let pipeline = TaskPipeline::new(
        pool.clone(),
        SiteRegistry::new(),
        store.clone(),
        engine,
        PipelineConfig {
            run_budget_secs: 300,
            submit: true,
        },
    );

    Fixture {
        pool,
        pipeline,
        store,
        behavior,
    }
}

fn task_for(url: &str) -> ApplicationTask {
    sample_task(url)
}

#[tokio::test(start_paused = true)]
async fn test_completed_application() {
    let fx = fixture(2, Behavior::default());
    let task = task_for("https://jobs.example.com/openings/1");
    let task_id = task.id;
    let fingerprint = ApplicationFingerprint::new(&task.user_id, &task.job_url);

    let result = fx.pipeline.process(task, CancellationToken::new()).await;

    assert_eq!(result.status, TaskStatus::Completed);
    assert!(!result.evidence_urls.is_empty());
    assert!(fx.store.exists(&fingerprint).await.unwrap());
    let recorded = fx.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(recorded.status, TaskStatus::Completed);

    // Clean run gives the session back to the idle set.
    let stats = fx.pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_precheck_avoids_browser_work() {
    let fx = fixture(2, Behavior::default());
    let task = task_for("https://jobs.example.com/openings/1");
    let fingerprint = ApplicationFingerprint::new(&task.user_id, &task.job_url);
    let earlier = TaskResult::started(Uuid::new_v4());
    fx.store
        .insert_if_absent(&fingerprint, &earlier)
        .await
        .unwrap();

    let result = fx.pipeline.process(task, CancellationToken::new()).await;

    assert_eq!(result.status, TaskStatus::SkippedDuplicate);
    assert_eq!(fx.behavior.created.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_race_resolves_to_one_completion() {
    let fx = Arc::new(fixture(2, Behavior::default()));
    let url = "https://jobs.example.com/openings/7";

    let a = {
        let fx = fx.clone();
        let task = task_for(url);
        tokio::spawn(async move { fx.pipeline.process(task, CancellationToken::new()).await })
    };
    let b = {
        let fx = fx.clone();
        let task = task_for(url);
        tokio::spawn(async move { fx.pipeline.process(task, CancellationToken::new()).await })
    };

    let mut statuses = vec![a.await.unwrap().status, b.await.unwrap().status];
    statuses.sort_by_key(|s| format!("{:?}", s));
    assert_eq!(
        statuses,
        vec![TaskStatus::Completed, TaskStatus::SkippedDuplicate]
    );
}

#[tokio::test(start_paused = true)]
async fn test_step_timeout_fails_task_and_evicts_session() {
    let behavior = Behavior {
        slow: HashSet::from(["button[type='submit'], input[type='submit']".to_string()]),
        ..Behavior::default()
    };
    let fx = fixture(1, behavior);
    let task = task_for("https://jobs.example.com/openings/1");

    let result = fx.pipeline.process(task, CancellationToken::new()).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.failure.as_ref().map(|c| c.kind),
        Some(FailureKind::StepTimeout)
    );
    assert!(result.retry_eligible);

    // The session was terminated, not idled.
    assert_eq!(fx.pool.live_sessions(), 0);
    assert_eq!(fx.behavior.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_one_serializes_three_tasks() {
    let fx = Arc::new(fixture(1, Behavior::default()));
    let mut handles = Vec::new();
    for i in 0..3 {
        let fx = fx.clone();
        let task = task_for(&format!("https://jobs.example.com/openings/{}", i));
        handles.push(tokio::spawn(async move {
            fx.pipeline.process(task, CancellationToken::new()).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
    }

    assert_eq!(fx.behavior.max_active_runs.load(Ordering::SeqCst), 1);
    assert_eq!(fx.behavior.created.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_budget_overrun_aborts_and_evicts() {
    let behavior = Behavior {
        goto_delay: Duration::from_secs(100_000),
        ..Behavior::default()
    };
    let fx = fixture(1, behavior);
    let task = task_for("https://jobs.example.com/openings/1");

    let result = fx.pipeline.process(task, CancellationToken::new()).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.failure.as_ref().map(|c| c.kind),
        Some(FailureKind::DeadlineExceeded)
    );
    assert!(result.retry_eligible);
    assert_eq!(fx.pool.live_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_task_fails_and_evicts() {
    let fx = fixture(1, Behavior::default());
    let task = task_for("https://jobs.example.com/openings/1");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = fx.pipeline.process(task, cancel).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.failure.as_ref().map(|c| c.kind),
        Some(FailureKind::Cancelled)
    );
    assert!(!result.retry_eligible);
    assert_eq!(fx.pool.live_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pool_exhaustion_is_retryable() {
    let fx = fixture(1, Behavior::default());

    // Hold the only slot so the pipeline's acquire times out.
    let held = fx.pool.acquire().await.unwrap();

    let task = task_for("https://jobs.example.com/openings/1");
    let result = fx.pipeline.process(task, CancellationToken::new()).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.failure.as_ref().map(|c| c.kind),
        Some(FailureKind::PoolExhausted)
    );
    assert!(result.retry_eligible);

    held.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_fails_without_acquisition() {
    let fx = fixture(1, Behavior::default());
    let task = task_for("::not a url::");

    let result = fx.pipeline.process(task, CancellationToken::new()).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.failure.as_ref().map(|c| c.kind),
        Some(FailureKind::InvalidUrl)
    );
    assert_eq!(fx.behavior.created.load(Ordering::SeqCst), 0);
}
