//! Application task payload.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One queued job application. Immutable once submitted; the pipeline
/// instance processing it is its sole owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationTask {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Identity the fingerprint is scoped to.
    pub user_id: String,

    /// Job posting URL as received.
    pub job_url: String,

    pub profile: ApplicantProfile,

    /// Free-form screening answers keyed by question label.
    #[serde(default)]
    pub answers: BTreeMap<String, String>,

    #[serde(default)]
    pub cover_letter: Option<String>,
}

/// Resume/contact payload used to fill forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub full_name: String,
    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub linkedin_url: Option<String>,

    #[serde(default)]
    pub website: Option<String>,

    #[serde(default)]
    pub work_authorized: bool,

    #[serde(default)]
    pub requires_sponsorship: bool,

    /// Local path to the resume file attached to upload fields.
    #[serde(default)]
    pub resume_path: Option<PathBuf>,

    #[serde(default)]
    pub skills: Vec<String>,
}

impl ApplicantProfile {
    /// First whitespace-separated token of the full name.
    pub fn first_name(&self) -> &str {
        self.full_name.split_whitespace().next().unwrap_or("")
    }

    /// Everything after the first token, joined back together.
    pub fn last_name(&self) -> String {
        let mut parts = self.full_name.split_whitespace();
        parts.next();
        parts.collect::<Vec<_>>().join(" ")
    }

    /// Skills as the comma-separated display string forms expect.
    pub fn skills_display(&self) -> String {
        self.skills.join(", ")
    }
}
