//! Configuration schema.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Browser launch settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Session pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Form-filling engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Task pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Browser launch configuration. One Chrome process is launched per
/// pooled session, each on its own debugging port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Explicit Chrome executable path (auto-detected when unset).
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// First debugging port; session N uses `debug_port_base + N`.
    #[serde(default = "default_debug_port_base")]
    pub debug_port_base: u16,

    /// Run Chrome headless.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Profile directory root for persistent login state.
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,

    /// Viewport width.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Viewport height.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Page load timeout in seconds.
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,
}

fn default_debug_port_base() -> u16 {
    9320
}

fn default_headless() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_page_load_timeout() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            debug_port_base: default_debug_port_base(),
            headless: default_headless(),
            profile_dir: None,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            page_load_timeout_secs: default_page_load_timeout(),
        }
    }
}

/// Browser session pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Ceiling on live sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// How long `acquire` blocks before failing with PoolExhausted.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle sessions older than this are evicted by the reaper.
    #[serde(default = "default_max_session_age")]
    pub max_session_age_secs: u64,

    /// Idle sessions unused for this long are evicted by the reaper.
    #[serde(default = "default_max_idle")]
    pub max_idle_secs: u64,

    /// Reaper scan interval.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,

    /// How long shutdown waits for in-use sessions to drain.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_max_sessions() -> usize {
    4
}

fn default_acquire_timeout() -> u64 {
    120
}

fn default_max_session_age() -> u64 {
    60 * 60
}

fn default_max_idle() -> u64 {
    30 * 60
}

fn default_reaper_interval() -> u64 {
    60
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            acquire_timeout_secs: default_acquire_timeout(),
            max_session_age_secs: default_max_session_age(),
            max_idle_secs: default_max_idle(),
            reaper_interval_secs: default_reaper_interval(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Form-filling engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-step element wait timeout in seconds.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Immediate re-attempts per step for transient rendering delays.
    #[serde(default = "default_step_attempts")]
    pub step_attempts: u32,

    /// Backoff between step re-attempts in milliseconds.
    #[serde(default = "default_step_backoff")]
    pub step_backoff_ms: u64,

    /// Cap on dynamically discovered wizard pages.
    #[serde(default = "default_max_wizard_pages")]
    pub max_wizard_pages: usize,
}

fn default_step_timeout() -> u64 {
    15
}

fn default_step_attempts() -> u32 {
    3
}

fn default_step_backoff() -> u64 {
    500
}

fn default_max_wizard_pages() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout(),
            step_attempts: default_step_attempts(),
            step_backoff_ms: default_step_backoff(),
            max_wizard_pages: default_max_wizard_pages(),
        }
    }
}

/// Task pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Wall-clock budget for the whole Running phase in seconds.
    #[serde(default = "default_run_budget")]
    pub run_budget_secs: u64,

    /// Whether applications are actually submitted or only prepared.
    #[serde(default = "default_submit")]
    pub submit: bool,
}

fn default_run_budget() -> u64 {
    300
}

fn default_submit() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_budget_secs: default_run_budget(),
            submit: default_submit(),
        }
    }
}
