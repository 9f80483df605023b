//! Chrome process launcher and the production [`Driver`].
//!
//! Each pooled session is its own Chrome process on its own debugging
//! port with its own profile directory, so sessions never share cookies
//! or crash each other.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use autoapply_config::BrowserConfig;

use crate::cdp::{CdpConnection, CdpError, Page};
use crate::driver::{Driver, DriverError};
use crate::error::PoolError;
use crate::pool::DriverFactory;

const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/opt/google/chrome/chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
];

fn map_cdp(e: CdpError) -> DriverError {
    match e {
        CdpError::ElementNotFound(s) => DriverError::NotFound(s),
        CdpError::Timeout(s) => DriverError::Timeout(s),
        CdpError::NavigationFailed(s) => DriverError::Navigation(s),
        other => DriverError::Crashed(other.to_string()),
    }
}

/// One Chrome process plus the CDP page session driving it.
pub struct ChromeDriver {
    conn: CdpConnection,
    page: Page,
    child: Mutex<Option<Child>>,
    profile_dir: PathBuf,
    owns_profile: bool,
    page_load_timeout: Duration,
    closed: AtomicBool,
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .navigate(url, self.page_load_timeout)
            .await
            .map_err(map_cdp)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.page.current_url().await.map_err(map_cdp)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        self.page
            .wait_for_selector(selector, timeout)
            .await
            .map(|_| ())
            .map_err(map_cdp)
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        self.page
            .query_selector(selector)
            .await
            .map(|node| node.is_some())
            .map_err(map_cdp)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.page.fill(selector, value).await.map_err(map_cdp)
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.page.click_selector(selector).await.map_err(map_cdp)
    }

    async fn attach_file(&self, selector: &str, path: &Path) -> Result<(), DriverError> {
        let node_id = self
            .page
            .query_selector(selector)
            .await
            .map_err(map_cdp)?
            .ok_or_else(|| DriverError::NotFound(selector.to_string()))?;
        let absolute = path
            .canonicalize()
            .map_err(|e| DriverError::NotFound(format!("{}: {}", path.display(), e)))?;
        self.page
            .set_file_input(node_id, &[absolute.to_string_lossy().into_owned()])
            .await
            .map_err(map_cdp)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let encoded = self.page.screenshot_base64().await.map_err(map_cdp)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::Crashed(format!("invalid screenshot payload: {}", e)))
    }

    async fn probe(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.page.evaluate("1 + 1").await.is_ok()
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.conn.close_page(self.page.target_id()).await {
            debug!("Ignoring page close failure: {}", e);
        }
        if let Some(mut child) = self.child.lock().take() {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill Chrome process: {}", e);
            }
        }
        if self.owns_profile {
            if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
                debug!(
                    "Failed to remove profile dir {}: {}",
                    self.profile_dir.display(),
                    e
                );
            }
        }
    }
}

/// Launches Chrome processes for the session pool.
pub struct ChromeLauncher {
    config: BrowserConfig,
    /// Monotonic session sequence, used for port assignment.
    next_slot: AtomicU16,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            next_slot: AtomicU16::new(0),
        }
    }

    fn chrome_executable(&self) -> Result<PathBuf, PoolError> {
        if let Some(path) = &self.config.chrome_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(PoolError::Launch(format!(
                "configured chrome path does not exist: {}",
                path.display()
            )));
        }
        CHROME_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| PoolError::Launch("no Chrome executable found".to_string()))
    }

    fn profile_dir_for(&self, slot: u16) -> (PathBuf, bool) {
        match &self.config.profile_dir {
            // A configured profile root persists login state across runs.
            Some(root) => (root.join(format!("session-{}", slot)), false),
            None => {
                let dir = std::env::temp_dir().join(format!("autoapply-{}", uuid::Uuid::new_v4()));
                (dir, true)
            }
        }
    }

    async fn wait_for_endpoint(&self, endpoint: &str) -> Result<(), PoolError> {
        let version_url = format!("{}/json/version", endpoint);
        for _ in 0..50 {
            if reqwest::get(&version_url).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Err(PoolError::Launch(format!(
            "Chrome did not open its debugging endpoint at {}",
            endpoint
        )))
    }
}

#[async_trait]
impl DriverFactory for ChromeLauncher {
    type Driver = ChromeDriver;

    async fn launch(&self) -> Result<ChromeDriver, PoolError> {
        let executable = self.chrome_executable()?;
        // Ports cycle through a window above the base so a just-killed
        // session's port has time to be released by the OS.
        let slot = self.next_slot.fetch_add(1, Ordering::SeqCst) % 512;
        let port = self.config.debug_port_base + slot;
        let (profile_dir, owns_profile) = self.profile_dir_for(slot);

        tokio::fs::create_dir_all(&profile_dir)
            .await
            .map_err(|e| PoolError::Launch(format!("profile dir: {}", e)))?;

        let mut command = Command::new(&executable);
        command
            .arg(format!("--remote-debugging-port={}", port))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg(format!(
                "--window-size={},{}",
                self.config.viewport_width, self.config.viewport_height
            ))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if self.config.headless {
            command.arg("--headless=new");
        }

        info!(port, executable = %executable.display(), "Launching Chrome");
        let child = command
            .spawn()
            .map_err(|e| PoolError::Launch(format!("spawn {}: {}", executable.display(), e)))?;

        let endpoint = format!("http://127.0.0.1:{}", port);
        self.wait_for_endpoint(&endpoint).await?;

        let conn = CdpConnection::connect(&endpoint)
            .await
            .map_err(|e| PoolError::Launch(e.to_string()))?;
        let page = conn
            .new_page()
            .await
            .map_err(|e| PoolError::Launch(e.to_string()))?;

        Ok(ChromeDriver {
            conn,
            page,
            child: Mutex::new(Some(child)),
            profile_dir,
            owns_profile,
            page_load_timeout: Duration::from_secs(self.config.page_load_timeout_secs),
            closed: AtomicBool::new(false),
        })
    }
}
