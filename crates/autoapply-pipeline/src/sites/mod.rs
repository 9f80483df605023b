//! Site handlers: per-portal application flows behind one trait.
//!
//! The registry evaluates detectors in priority order; the generic
//! handler always matches, so resolution is total.

mod generic;
mod greenhouse;
mod indeed;
mod linkedin;
mod registry;

pub use generic::GenericHandler;
pub use greenhouse::GreenhouseHandler;
pub use indeed::IndeedHandler;
pub use linkedin::LinkedInHandler;
pub use registry::SiteRegistry;

use std::path::PathBuf;

use url::Url;

use crate::task::ApplicationTask;

/// One element interaction inside a form step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldAction {
    Fill { selector: String, value: String },
    Attach { selector: String, path: PathBuf },
    Click { selector: String },
}

impl FieldAction {
    pub fn selector(&self) -> &str {
        match self {
            FieldAction::Fill { selector, .. }
            | FieldAction::Attach { selector, .. }
            | FieldAction::Click { selector } => selector,
        }
    }
}

/// What a step does, for state-machine bookkeeping and evidence labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Fill,
    Upload,
    Submit,
    Review,
}

/// One ordered unit of form work.
#[derive(Debug, Clone)]
pub struct FormStep {
    pub name: String,
    pub kind: StepKind,
    pub actions: Vec<FieldAction>,
    /// Definitive steps hit a page state that retrying cannot change;
    /// the engine fails them on the first miss.
    pub definitive: bool,
    /// Optional steps are skipped without error when their first
    /// target is absent (wizard pages that may not exist, portals
    /// without an upload field).
    pub optional: bool,
}

impl FormStep {
    pub fn new(name: impl Into<String>, kind: StepKind, actions: Vec<FieldAction>) -> Self {
        Self {
            name: name.into(),
            kind,
            actions,
            definitive: false,
            optional: false,
        }
    }

    pub fn definitive(mut self) -> Self {
        self.definitive = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Limits applied when a handler produces its step sequence.
#[derive(Debug, Clone, Copy)]
pub struct StepLimits {
    /// Cap on dynamically discovered wizard pages.
    pub max_wizard_pages: usize,
    /// When false, Submit steps are produced but skipped by the engine
    /// (prepare-only runs).
    pub submit: bool,
}

/// A finite, ordered, non-restartable step sequence. Handlers may
/// produce it lazily when the page count is not known upfront.
pub type StepSequence = Box<dyn Iterator<Item = FormStep> + Send>;

/// Site-specific application strategy.
pub trait SiteHandler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Whether this handler recognizes the posting URL.
    fn detect(&self, url: &Url) -> bool;

    /// Transform a posting URL into the direct application URL.
    fn application_url(&self, url: &Url) -> String {
        url.as_str().to_string()
    }

    /// Selector whose presence means the application page is usable.
    fn ready_selector(&self) -> &'static str;

    /// Selector whose presence confirms a submitted application.
    fn confirmation_selector(&self) -> &'static str;

    /// Produce the ordered steps for one task.
    fn steps(&self, task: &ApplicationTask, limits: &StepLimits) -> StepSequence;
}

/// Shared helper: steps filling the contact fields every portal has,
/// driven by the keyword selectors passed in.
pub(crate) fn contact_actions(
    task: &ApplicationTask,
    first_name: &str,
    last_name: &str,
    email: &str,
    phone: &str,
) -> Vec<FieldAction> {
    let profile = &task.profile;
    let mut actions = vec![
        FieldAction::Fill {
            selector: first_name.to_string(),
            value: profile.first_name().to_string(),
        },
        FieldAction::Fill {
            selector: last_name.to_string(),
            value: profile.last_name(),
        },
        FieldAction::Fill {
            selector: email.to_string(),
            value: profile.email.clone(),
        },
    ];
    if !profile.phone.is_empty() {
        actions.push(FieldAction::Fill {
            selector: phone.to_string(),
            value: profile.phone.clone(),
        });
    }
    actions
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::task::{ApplicantProfile, ApplicationTask};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    pub(crate) fn sample_task(job_url: &str) -> ApplicationTask {
        ApplicationTask {
            id: Uuid::new_v4(),
            user_id: "u-1".to_string(),
            job_url: job_url.to_string(),
            profile: ApplicantProfile {
                full_name: "Jane Doe".to_string(),
                email: "jane@example.com".to_string(),
                phone: "+1 555 0100".to_string(),
                ..ApplicantProfile::default()
            },
            answers: BTreeMap::new(),
            cover_letter: None,
        }
    }
}
