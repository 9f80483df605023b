//! Bounded browser session pool.
//!
//! The pool owns every live session. Acquisition prefers an idle
//! session, launches a new one while the live count is under the
//! ceiling, and otherwise blocks FIFO-fairly on a semaphore until a
//! session is released or the acquire timeout expires. Sessions
//! released unhealthy are terminated, never reused.
//!
//! Accounting invariant: every in-use or launching session holds one
//! semaphore permit, and a session enters the idle set only by being
//! released from in-use (freeing its permit). Creation requires a
//! permit and an empty idle set, so idle + in_use + launching can never
//! exceed `max_sessions`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use autoapply_config::PoolConfig;

use crate::driver::Driver;
use crate::error::PoolError;
use crate::handle::{SessionHandle, SessionState};

/// Launches new browser drivers on demand.
#[async_trait]
pub trait DriverFactory: Send + Sync + 'static {
    type Driver: Driver;

    /// Launch a fresh browser instance.
    async fn launch(&self) -> Result<Self::Driver, PoolError>;
}

struct PoolInner<D> {
    idle: VecDeque<SessionHandle<D>>,
    in_use: usize,
    launching: usize,
    total_created: u64,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub in_use: usize,
    pub launching: usize,
    pub total_created: u64,
}

/// Bounded pool of browser sessions shared across concurrent tasks.
pub struct BrowserPool<F: DriverFactory> {
    config: PoolConfig,
    factory: F,
    /// FIFO-fair gate on live-session slots.
    permits: Arc<Semaphore>,
    inner: Mutex<PoolInner<F::Driver>>,
    shutting_down: AtomicBool,
    /// Signalled on every give-back so shutdown can watch the drain.
    returned: tokio::sync::Notify,
}

impl<F: DriverFactory> BrowserPool<F> {
    /// Create a pool. No sessions are launched until first acquire.
    pub fn new(config: PoolConfig, factory: F) -> Arc<Self> {
        let max = config.max_sessions;
        Arc::new(Self {
            config,
            factory,
            permits: Arc::new(Semaphore::new(max)),
            inner: Mutex::new(PoolInner {
                idle: VecDeque::new(),
                in_use: 0,
                launching: 0,
                total_created: 0,
            }),
            shutting_down: AtomicBool::new(false),
            returned: tokio::sync::Notify::new(),
        })
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        PoolStats {
            idle: inner.idle.len(),
            in_use: inner.in_use,
            launching: inner.launching,
            total_created: inner.total_created,
        }
    }

    /// Live (non-terminated) session count, including launches in flight.
    pub fn live_sessions(&self) -> usize {
        let inner = self.inner.lock();
        inner.idle.len() + inner.in_use + inner.launching
    }

    /// Acquire an exclusive session, blocking up to the configured
    /// acquire timeout when the ceiling is reached.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession<F>, PoolError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PoolError::ShuttingDown);
        }

        let wait = Duration::from_secs(self.config.acquire_timeout_secs);
        let permit = match tokio::time::timeout(wait, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            // Semaphore closed by shutdown.
            Ok(Err(_)) => return Err(PoolError::ShuttingDown),
            Err(_) => return Err(PoolError::Exhausted(wait)),
        };

        loop {
            // Pop-or-launch is decided under the lock; a popped handle
            // is counted in-use before its health is evaluated, so the
            // reaper can never see it.
            let popped = {
                let mut inner = self.inner.lock();
                match inner.idle.pop_front() {
                    Some(handle) => {
                        inner.in_use += 1;
                        Some(handle)
                    }
                    None => {
                        inner.launching += 1;
                        None
                    }
                }
            };

            match popped {
                Some(mut handle) => {
                    if handle.driver().probe().await {
                        handle.transition(SessionState::InUse);
                        handle.mark_used();
                        debug!(session_id = %handle.id(), uses = handle.use_count(), "Session acquired");
                        return Ok(PooledSession::new(self.clone(), handle, permit));
                    }
                    warn!(session_id = %handle.id(), "Idle session failed probe, terminating");
                    handle.transition(SessionState::Unhealthy);
                    self.terminate(handle).await;
                    self.inner.lock().in_use -= 1;
                    // Retry with the permit still held.
                }
                None => {
                    let launched = self.factory.launch().await;
                    let mut inner = self.inner.lock();
                    inner.launching -= 1;
                    match launched {
                        Ok(driver) => {
                            inner.in_use += 1;
                            inner.total_created += 1;
                            drop(inner);
                            let mut handle = SessionHandle::new(driver);
                            handle.transition(SessionState::InUse);
                            handle.mark_used();
                            info!(session_id = %handle.id(), "Launched new browser session");
                            return Ok(PooledSession::new(self.clone(), handle, permit));
                        }
                        Err(e) => {
                            drop(inner);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Return a session. Healthy sessions go back to the idle set;
    /// anything else is terminated and its slot freed.
    async fn give_back(&self, mut handle: SessionHandle<F::Driver>, healthy: bool) {
        if healthy && !self.shutting_down.load(Ordering::SeqCst) {
            handle.transition(SessionState::Idle);
            debug!(session_id = %handle.id(), "Session released");
            let mut inner = self.inner.lock();
            inner.in_use -= 1;
            inner.idle.push_back(handle);
        } else {
            if handle.state() != SessionState::Unhealthy {
                handle.transition(SessionState::Unhealthy);
            }
            warn!(session_id = %handle.id(), "Session released unhealthy, terminating");
            self.terminate(handle).await;
            self.inner.lock().in_use -= 1;
        }
        self.returned.notify_waiters();
    }

    /// Destroy a session's underlying browser.
    async fn terminate(&self, mut handle: SessionHandle<F::Driver>) {
        handle.transition(SessionState::Terminated);
        handle.driver().close().await;
        debug!(session_id = %handle.id(), "Session terminated");
    }

    /// One reaper pass: evict idle sessions that aged out, idled too
    /// long, or fail their liveness probe.
    ///
    /// The whole idle set is swapped out before probing so an eviction
    /// can never race an in-flight acquire over the same handle;
    /// survivors are re-admitted only while a slot is free.
    pub async fn sweep(&self) {
        let max_age = Duration::from_secs(self.config.max_session_age_secs);
        let max_idle = Duration::from_secs(self.config.max_idle_secs);

        let candidates: Vec<SessionHandle<F::Driver>> = {
            let mut inner = self.inner.lock();
            inner.idle.drain(..).collect()
        };
        if candidates.is_empty() {
            return;
        }

        let mut survivors = Vec::new();
        for mut handle in candidates {
            let expired = handle.age() > max_age || handle.idle_for() > max_idle;
            if expired || !handle.driver().probe().await {
                info!(
                    session_id = %handle.id(),
                    age_secs = handle.age().as_secs(),
                    idle_secs = handle.idle_for().as_secs(),
                    expired,
                    "Reaping session"
                );
                handle.transition(SessionState::Unhealthy);
                self.terminate(handle).await;
            } else {
                survivors.push(handle);
            }
        }

        let overflow: Vec<SessionHandle<F::Driver>> = {
            let mut inner = self.inner.lock();
            let mut overflow = Vec::new();
            for handle in survivors {
                let live = inner.idle.len() + inner.in_use + inner.launching;
                if live < self.config.max_sessions {
                    inner.idle.push_back(handle);
                } else {
                    // Slot taken by a fresh launch while we probed.
                    overflow.push(handle);
                }
            }
            overflow
        };
        for handle in overflow {
            self.terminate(handle).await;
        }
    }

    /// Spawn the background reaper. It stops when `cancel` fires.
    pub fn spawn_reaper(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let pool = self.clone();
        let interval = Duration::from_secs(pool.config.reaper_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Reaper stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        pool.sweep().await;
                    }
                }
            }
        })
    }

    /// Drain and shut down: refuse new acquisitions, wait for in-use
    /// sessions to come back (bounded by the shutdown timeout), then
    /// terminate everything left.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.permits.close();
        info!("Browser pool shutting down");

        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.shutdown_timeout_secs);
        loop {
            let busy = {
                let inner = self.inner.lock();
                inner.in_use + inner.launching
            };
            if busy == 0 {
                break;
            }
            tokio::select! {
                _ = self.returned.notified() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(busy, "Shutdown timeout expired with sessions still in use");
                    break;
                }
            }
        }

        let idle: Vec<SessionHandle<F::Driver>> = {
            let mut inner = self.inner.lock();
            inner.idle.drain(..).collect()
        };
        for handle in idle {
            self.terminate(handle).await;
        }
        info!("Browser pool shut down");
    }
}

/// Scoped session guard. `release` must be called with the observed
/// health; dropping the guard without releasing treats the session as
/// unhealthy so a panicking task can never leak a live slot.
pub struct PooledSession<F: DriverFactory> {
    pool: Arc<BrowserPool<F>>,
    handle: Option<SessionHandle<F::Driver>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl<F: DriverFactory> std::fmt::Debug for PooledSession<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("session_id", &self.handle.as_ref().map(|h| h.id()))
            .finish_non_exhaustive()
    }
}

impl<F: DriverFactory> PooledSession<F> {
    fn new(
        pool: Arc<BrowserPool<F>>,
        handle: SessionHandle<F::Driver>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            pool,
            handle: Some(handle),
            permit: Some(permit),
        }
    }

    /// Session id, stable for the guard's lifetime.
    pub fn session_id(&self) -> Uuid {
        self.handle.as_ref().expect("session still held").id()
    }

    /// The exclusively held driver.
    pub fn driver(&self) -> &F::Driver {
        self.handle.as_ref().expect("session still held").driver()
    }

    /// Release the session back to the pool exactly once.
    pub async fn release(mut self, healthy: bool) {
        if let Some(handle) = self.handle.take() {
            self.pool.give_back(handle, healthy).await;
        }
        // Permit drops here, waking the oldest waiter.
        self.permit.take();
    }
}

impl<F: DriverFactory> Drop for PooledSession<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            warn!(session_id = %handle.id(), "Session guard dropped without release");
            let pool = self.pool.clone();
            let permit = self.permit.take();
            if let Ok(rt) = tokio::runtime::Handle::try_current() {
                rt.spawn(async move {
                    pool.give_back(handle, false).await;
                    drop(permit);
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
