//! Pooled browser sessions for AutoApply.
//!
//! A bounded pool of long-lived Chrome processes, each driven over the
//! Chrome DevTools Protocol (CDP) via WebSocket. Workers acquire a
//! session, drive one application flow, and release it back; unhealthy
//! sessions are terminated instead of being reused. A background reaper
//! evicts sessions that aged out or went stale.
//!
//! The [`Driver`] trait is the seam between the pool and the transport:
//! production uses [`ChromeDriver`] (one Chrome process per session),
//! tests substitute scripted fakes.

pub mod cdp;
mod chrome;
mod driver;
mod error;
mod handle;
mod pool;

pub use chrome::{ChromeDriver, ChromeLauncher};
pub use driver::{Driver, DriverError};
pub use error::PoolError;
pub use handle::{SessionHandle, SessionState};
pub use pool::{BrowserPool, DriverFactory, PoolStats, PooledSession};
