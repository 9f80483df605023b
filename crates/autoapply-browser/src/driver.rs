//! The driver seam between the session pool and the browser transport.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a driver, already classified for the form engine.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The expected element is not on the page.
    #[error("element not found: {0}")]
    NotFound(String),

    /// An element wait or page load ran out of time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Navigation was rejected by the browser.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The underlying browser process or its connection died.
    #[error("browser session crashed: {0}")]
    Crashed(String),
}

impl DriverError {
    /// Whether this error indicates the session itself is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Crashed(_))
    }
}

/// One live browser instance, exclusively owned by its holder.
///
/// Production drivers wrap a Chrome process and a CDP page session;
/// tests substitute scripted fakes. All operations act on the driver's
/// single page.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Navigate to a URL and wait for the document to become usable.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Wait for a selector to appear, bounded by `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Whether a selector currently matches, without waiting.
    async fn exists(&self, selector: &str) -> Result<bool, DriverError>;

    /// Replace the value of the input matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    /// Click the element matching `selector`.
    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Attach a local file to the file input matching `selector`.
    async fn attach_file(&self, selector: &str, path: &Path) -> Result<(), DriverError>;

    /// Capture a full-page PNG screenshot.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Cheap liveness probe; false means the session must be evicted.
    async fn probe(&self) -> bool;

    /// Tear down the underlying browser instance. Idempotent.
    async fn close(&self);
}
