//! Session handle: one pooled browser instance plus its bookkeeping.

use std::time::{Duration, Instant};

use uuid::Uuid;

/// Lifecycle state of a pooled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// In the pool, available for acquisition.
    Idle,
    /// Exclusively held by one task.
    InUse,
    /// Observed broken; will be terminated, never reused.
    Unhealthy,
    /// Underlying browser destroyed.
    Terminated,
}

/// A browser driver plus the health/usage metadata the pool tracks.
pub struct SessionHandle<D> {
    id: Uuid,
    driver: D,
    state: SessionState,
    created_at: Instant,
    last_used: Instant,
    use_count: u64,
}

impl<D> SessionHandle<D> {
    /// Wrap a freshly launched driver. New handles start Idle.
    pub fn new(driver: D) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            driver,
            state: SessionState::Idle,
            created_at: now,
            last_used: now,
            use_count: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Total age of the session.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the session was last handed out or returned.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    pub fn use_count(&self) -> u64 {
        self.use_count
    }

    /// Record a hand-out to a task.
    pub fn mark_used(&mut self) {
        self.last_used = Instant::now();
        self.use_count += 1;
    }

    /// Apply a state transition, rejecting illegal ones.
    ///
    /// Legal moves: Idle↔InUse, {Idle,InUse}→Unhealthy, any→Terminated.
    pub fn transition(&mut self, next: SessionState) -> bool {
        use SessionState::*;
        let ok = match (self.state, next) {
            (Idle, InUse) | (InUse, Idle) => true,
            (Idle, Unhealthy) | (InUse, Unhealthy) => true,
            (_, Terminated) => self.state != Terminated,
            _ => false,
        };
        if ok {
            if next == Idle {
                self.last_used = Instant::now();
            }
            self.state = next;
        }
        ok
    }
}
