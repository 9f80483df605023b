//! Form-filling state machine.
//!
//! Drives one acquired browser session through a handler's step
//! sequence: `Navigating → Detecting → Filling(i) → Uploading →
//! Submitting → Confirming → Done`, with `Aborted` reachable from any
//! non-terminal state. Evidence is captured at Filling entry/exit and
//! always at Confirming/Aborted, so every outcome has visual proof.

mod retry;

pub use retry::RetryPolicy;

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use autoapply_browser::{Driver, DriverError};
use autoapply_config::EngineConfig;

use crate::error::ApplyError;
use crate::evidence::EvidenceCapture;
use crate::sites::{FieldAction, FormStep, SiteHandler, StepKind, StepLimits};
use crate::task::ApplicationTask;

/// Banner dismissal shared across portals; best-effort.
const COOKIE_CONSENT_SELECTOR: &str =
    "#onetrust-accept-btn-handler, button[id*='accept'], button[aria-label*='accept' i]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Navigating,
    Detecting,
    Filling(usize),
    Uploading,
    Submitting,
    Confirming,
    Done,
    Aborted,
}

pub struct FormFillingEngine {
    config: EngineConfig,
    retry: RetryPolicy,
    evidence: EvidenceCapture,
}

impl FormFillingEngine {
    pub fn new(config: EngineConfig, evidence: EvidenceCapture) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            config,
            retry,
            evidence,
        }
    }

    pub fn limits(&self, submit: bool) -> StepLimits {
        StepLimits {
            max_wizard_pages: self.config.max_wizard_pages,
            submit,
        }
    }

    /// Run one application flow to Done or Aborted. Evidence URLs are
    /// appended to `evidence_urls` as checkpoints are reached, so the
    /// caller keeps them even when the run fails.
    pub async fn run<D: Driver>(
        &self,
        driver: &D,
        handler: &dyn SiteHandler,
        task: &ApplicationTask,
        url: &Url,
        submit: bool,
        cancel: &CancellationToken,
        evidence_urls: &mut Vec<String>,
    ) -> Result<(), ApplyError> {
        match self
            .drive(driver, handler, task, url, submit, cancel, evidence_urls)
            .await
        {
            Ok(()) => {
                debug!(task_id = %task.id, state = ?EngineState::Done, "Engine finished");
                Ok(())
            }
            Err(e) => {
                warn!(task_id = %task.id, state = ?EngineState::Aborted, error = %e, "Engine aborted");
                if let Some(url) = self.evidence.capture(driver, task.id, "aborted").await {
                    evidence_urls.push(url);
                }
                Err(e)
            }
        }
    }

    async fn drive<D: Driver>(
        &self,
        driver: &D,
        handler: &dyn SiteHandler,
        task: &ApplicationTask,
        url: &Url,
        submit: bool,
        cancel: &CancellationToken,
        evidence_urls: &mut Vec<String>,
    ) -> Result<(), ApplyError> {
        let step_timeout = Duration::from_secs(self.config.step_timeout_secs);

        let application_url = handler.application_url(url);
        debug!(task_id = %task.id, state = ?EngineState::Navigating, url = %application_url, "Navigating");
        driver
            .goto(&application_url)
            .await
            .map_err(|e| map_step_error("navigate", 1, e))?;

        debug!(task_id = %task.id, state = ?EngineState::Detecting, site = handler.name(), "Waiting for application form");
        driver
            .wait_for(handler.ready_selector(), step_timeout)
            .await
            .map_err(|e| map_step_error("detect", 1, e))?;
        self.check_redirect(driver, url).await?;

        self.dismiss_cookie_consent(driver).await;

        let mut filling_index = 0usize;
        for step in handler.steps(task, &self.limits(submit)) {
            if cancel.is_cancelled() {
                return Err(ApplyError::Cancelled);
            }

            let state = match step.kind {
                StepKind::Fill | StepKind::Review => {
                    filling_index += 1;
                    EngineState::Filling(filling_index)
                }
                StepKind::Upload => EngineState::Uploading,
                StepKind::Submit => EngineState::Submitting,
            };

            if step.kind == StepKind::Submit && !submit {
                info!(task_id = %task.id, "Submission disabled, application prepared only");
                if let Some(url) = self.evidence.capture(driver, task.id, "prepared").await {
                    evidence_urls.push(url);
                }
                return Ok(());
            }

            if step.optional && !self.step_applies(driver, &step).await? {
                debug!(task_id = %task.id, step = %step.name, "Optional step target absent, skipping");
                continue;
            }

            debug!(task_id = %task.id, state = ?state, step = %step.name, "Executing step");
            // Review steps share the Filling state, so they get the
            // same entry/exit checkpoints.
            if matches!(step.kind, StepKind::Fill | StepKind::Review) {
                if let Some(url) = self
                    .evidence
                    .capture(driver, task.id, &format!("{}-entry", step.name))
                    .await
                {
                    evidence_urls.push(url);
                }
            }

            self.execute_step(driver, &step, step_timeout).await?;

            if matches!(step.kind, StepKind::Fill | StepKind::Review) {
                if let Some(url) = self
                    .evidence
                    .capture(driver, task.id, &format!("{}-exit", step.name))
                    .await
                {
                    evidence_urls.push(url);
                }
            }
        }

        debug!(task_id = %task.id, state = ?EngineState::Confirming, "Waiting for confirmation");
        driver
            .wait_for(handler.confirmation_selector(), step_timeout)
            .await
            .map_err(|e| map_step_error("confirmation", 1, e))?;
        if let Some(url) = self.evidence.capture(driver, task.id, "confirming").await {
            evidence_urls.push(url);
        }

        Ok(())
    }

    /// Whether an optional step's first target is present at all.
    async fn step_applies<D: Driver>(
        &self,
        driver: &D,
        step: &FormStep,
    ) -> Result<bool, ApplyError> {
        let Some(action) = step.actions.first() else {
            return Ok(false);
        };
        match driver.exists(action.selector()).await {
            Ok(present) => Ok(present),
            Err(DriverError::Crashed(detail)) => Err(ApplyError::SessionCrashed(detail)),
            Err(_) => Ok(false),
        }
    }

    /// Execute every action of one step under the retry policy.
    async fn execute_step<D: Driver>(
        &self,
        driver: &D,
        step: &FormStep,
        step_timeout: Duration,
    ) -> Result<(), ApplyError> {
        let attempts = self.retry.attempts_for(step.definitive);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_step(driver, step, step_timeout).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts && self.retry.recoverable(&e) => {
                    debug!(step = %step.name, attempt, error = %e, "Step attempt failed, retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => return Err(map_step_error(&step.name, attempt, e)),
            }
        }
    }

    async fn try_step<D: Driver>(
        &self,
        driver: &D,
        step: &FormStep,
        step_timeout: Duration,
    ) -> Result<(), DriverError> {
        for action in &step.actions {
            driver.wait_for(action.selector(), step_timeout).await?;
            match action {
                FieldAction::Fill { selector, value } => {
                    driver.fill(selector, value).await?;
                }
                FieldAction::Attach { selector, path } => {
                    driver.attach_file(selector, path).await?;
                }
                FieldAction::Click { selector } => {
                    driver.click(selector).await?;
                }
            }
        }
        Ok(())
    }

    /// A post-load host change means the portal bounced us somewhere
    /// the handler does not model (login wall, expired posting).
    async fn check_redirect<D: Driver>(&self, driver: &D, expected: &Url) -> Result<(), ApplyError> {
        let current = driver
            .current_url()
            .await
            .map_err(|e| map_step_error("detect", 1, e))?;
        let Ok(current_url) = Url::parse(&current) else {
            return Ok(());
        };
        let (Some(expected_host), Some(actual_host)) = (expected.host_str(), current_url.host_str())
        else {
            return Ok(());
        };
        let same_site = crate::fingerprint::domain_matches(actual_host, expected_host)
            || crate::fingerprint::domain_matches(expected_host, actual_host);
        if same_site {
            Ok(())
        } else {
            Err(ApplyError::UnexpectedRedirect { url: current })
        }
    }

    async fn dismiss_cookie_consent<D: Driver>(&self, driver: &D) {
        match driver.exists(COOKIE_CONSENT_SELECTOR).await {
            Ok(true) => {
                if let Err(e) = driver.click(COOKIE_CONSENT_SELECTOR).await {
                    debug!("Cookie consent dismissal failed: {}", e);
                } else {
                    debug!("Dismissed cookie consent banner");
                }
            }
            _ => debug!("No cookie consent banner found"),
        }
    }
}

fn map_step_error(step: &str, attempts: u32, e: DriverError) -> ApplyError {
    match e {
        DriverError::NotFound(detail) => ApplyError::StepNotFound {
            step: step.to_string(),
            detail,
        },
        DriverError::Timeout(_) => ApplyError::StepTimeout {
            step: step.to_string(),
            attempts,
        },
        DriverError::Navigation(detail) => ApplyError::UnexpectedRedirect { url: detail },
        DriverError::Crashed(detail) => ApplyError::SessionCrashed(detail),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
