use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use autoapply_config::PoolConfig;

use super::*;
use crate::driver::{Driver, DriverError};

#[derive(Default)]
struct FakeFlags {
    healthy: AtomicBool,
    closed: AtomicBool,
}

struct FakeDriver {
    flags: Arc<FakeFlags>,
}

#[async_trait]
impl Driver for FakeDriver {
    async fn goto(&self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok("about:blank".to_string())
    }

    async fn wait_for(&self, _selector: &str, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn exists(&self, _selector: &str) -> Result<bool, DriverError> {
        Ok(true)
    }

    async fn fill(&self, _selector: &str, _value: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn attach_file(&self, _selector: &str, _path: &Path) -> Result<(), DriverError> {
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Ok(vec![0u8; 4])
    }

    async fn probe(&self) -> bool {
        self.flags.healthy.load(Ordering::SeqCst) && !self.flags.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.flags.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeFactory {
    created: Mutex<Vec<Arc<FakeFlags>>>,
}

impl FakeFactory {
    fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    fn flags(&self, index: usize) -> Arc<FakeFlags> {
        self.created.lock()[index].clone()
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    type Driver = FakeDriver;

    async fn launch(&self) -> Result<FakeDriver, PoolError> {
        let flags = Arc::new(FakeFlags {
            healthy: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        });
        self.created.lock().push(flags.clone());
        Ok(FakeDriver { flags })
    }
}

fn test_config(max_sessions: usize) -> PoolConfig {
    PoolConfig {
        max_sessions,
        acquire_timeout_secs: 2,
        max_session_age_secs: 3600,
        max_idle_secs: 3600,
        reaper_interval_secs: 1,
        shutdown_timeout_secs: 2,
    }
}

fn pool_with(max_sessions: usize) -> Arc<BrowserPool<FakeFactory>> {
    BrowserPool::new(test_config(max_sessions), FakeFactory::default())
}

#[tokio::test(start_paused = true)]
async fn test_acquire_launches_lazily() {
    let pool = pool_with(2);
    assert_eq!(pool.live_sessions(), 0);

    let session = pool.acquire().await.unwrap();
    assert_eq!(pool.live_sessions(), 1);
    assert_eq!(pool.stats().in_use, 1);

    session.release(true).await;
    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn test_healthy_release_reuses_session() {
    let pool = pool_with(2);

    let first = pool.acquire().await.unwrap();
    let first_id = first.session_id();
    first.release(true).await;

    let second = pool.acquire().await.unwrap();
    assert_eq!(second.session_id(), first_id);
    assert_eq!(pool.stats().total_created, 1);
    second.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_blocks_until_release() {
    let pool = pool_with(1);

    let held = pool.acquire().await.unwrap();
    let held_id = held.session_id();

    // A second acquire must not complete while the only slot is held.
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiter.is_finished());
    assert_eq!(pool.live_sessions(), 1);

    held.release(true).await;
    let second = waiter.await.unwrap().unwrap();
    assert_eq!(second.session_id(), held_id);
    assert_eq!(pool.live_sessions(), 1);
    second.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_never_exceeded_under_load() {
    let pool = pool_with(2);
    let mut workers = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        workers.push(tokio::spawn(async move {
            let session = pool.acquire().await.unwrap();
            assert!(pool.live_sessions() <= 2);
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(pool.live_sessions() <= 2);
            session.release(true).await;
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }
    assert!(pool.live_sessions() <= 2);
    assert_eq!(pool.stats().in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_times_out_when_exhausted() {
    let pool = pool_with(1);
    let held = pool.acquire().await.unwrap();

    let result = pool.acquire().await;
    assert!(matches!(result, Err(PoolError::Exhausted(_))));
    assert!(result.unwrap_err().is_retryable());

    held.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_release_terminates_session() {
    let pool = pool_with(1);

    let session = pool.acquire().await.unwrap();
    session.release(false).await;

    let factory_flags = pool.factory.flags(0);
    assert!(factory_flags.closed.load(Ordering::SeqCst));
    assert_eq!(pool.live_sessions(), 0);

    // Next acquire gets a fresh session.
    let next = pool.acquire().await.unwrap();
    assert_eq!(pool.factory.created_count(), 2);
    next.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_guard_counts_as_unhealthy_release() {
    let pool = pool_with(1);

    let session = pool.acquire().await.unwrap();
    drop(session);

    // Drop spawns the give-back; wait for it to land.
    for _ in 0..50 {
        if pool.live_sessions() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(pool.live_sessions(), 0);
    assert!(pool.factory.flags(0).closed.load(Ordering::SeqCst));

    // The slot is free again.
    let next = pool.acquire().await.unwrap();
    next.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_acquire_skips_session_that_fails_probe() {
    let pool = pool_with(2);

    let session = pool.acquire().await.unwrap();
    session.release(true).await;

    // The idle session dies behind the pool's back.
    pool.factory.flags(0).healthy.store(false, Ordering::SeqCst);

    let next = pool.acquire().await.unwrap();
    assert_eq!(pool.factory.created_count(), 2);
    assert!(pool.factory.flags(0).closed.load(Ordering::SeqCst));
    assert_eq!(pool.live_sessions(), 1);
    next.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_evicts_aged_session() {
    let mut config = test_config(2);
    config.max_session_age_secs = 0;
    let pool = BrowserPool::new(config, FakeFactory::default());

    let session = pool.acquire().await.unwrap();
    session.release(true).await;
    assert_eq!(pool.stats().idle, 1);

    pool.sweep().await;
    assert_eq!(pool.stats().idle, 0);
    assert!(pool.factory.flags(0).closed.load(Ordering::SeqCst));

    // The next acquire observes a freshly created session.
    let next = pool.acquire().await.unwrap();
    assert_eq!(pool.factory.created_count(), 2);
    next.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_keeps_fresh_sessions() {
    let pool = pool_with(2);

    let session = pool.acquire().await.unwrap();
    let id = session.session_id();
    session.release(true).await;

    pool.sweep().await;
    assert_eq!(pool.stats().idle, 1);

    let again = pool.acquire().await.unwrap();
    assert_eq!(again.session_id(), id);
    again.release(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_terminates_idle_and_refuses_acquires() {
    let pool = pool_with(2);

    let session = pool.acquire().await.unwrap();
    session.release(true).await;

    pool.shutdown().await;
    assert_eq!(pool.live_sessions(), 0);
    assert!(pool.factory.flags(0).closed.load(Ordering::SeqCst));

    let result = pool.acquire().await;
    assert!(matches!(result, Err(PoolError::ShuttingDown)));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_use_session() {
    let pool = pool_with(1);
    let session = pool.acquire().await.unwrap();

    let shutdown = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.shutdown().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_finished());

    // A release during shutdown terminates instead of idling.
    session.release(true).await;
    shutdown.await.unwrap();
    assert_eq!(pool.live_sessions(), 0);
    assert!(pool.factory.flags(0).closed.load(Ordering::SeqCst));
}
