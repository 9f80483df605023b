//! Indeed apply handler.

use url::Url;

use super::{
    contact_actions, FieldAction, FormStep, SiteHandler, StepKind, StepLimits, StepSequence,
};
use crate::fingerprint::domain_matches;
use crate::task::ApplicationTask;

const CONTINUE_BUTTON: &str = ".ia-continueButton, button[data-testid='continue-button']";

pub struct IndeedHandler;

impl SiteHandler for IndeedHandler {
    fn name(&self) -> &'static str {
        "indeed"
    }

    fn detect(&self, url: &Url) -> bool {
        url.host_str()
            .map(|h| domain_matches(h, "indeed.com"))
            .unwrap_or(false)
    }

    fn application_url(&self, url: &Url) -> String {
        // The viewjob page carries serp clutter; the jk parameter alone
        // reaches the same posting.
        if let Some((_, jk)) = url.query_pairs().find(|(k, _)| k == "jk") {
            if let Some(host) = url.host_str() {
                return format!("{}://{}/viewjob?jk={}", url.scheme(), host, jk);
            }
        }
        url.as_str().to_string()
    }

    fn ready_selector(&self) -> &'static str {
        "#ia-container, .ia-BasePage, #jobsearch-ViewjobPaneWrapper"
    }

    fn confirmation_selector(&self) -> &'static str {
        ".ia-PostApply, [data-testid='post-apply-header']"
    }

    fn steps(&self, task: &ApplicationTask, limits: &StepLimits) -> StepSequence {
        let mut steps = vec![
            FormStep::new(
                "open-apply",
                StepKind::Fill,
                vec![FieldAction::Click {
                    selector: "#indeedApplyButton, .jobsearch-IndeedApplyButton-newDesign"
                        .to_string(),
                }],
            ),
            FormStep::new(
                "contact",
                StepKind::Fill,
                contact_actions(
                    task,
                    "input[id*='firstName'], input[name*='firstName']",
                    "input[id*='lastName'], input[name*='lastName']",
                    "input[id*='email'], input[type='email']",
                    "input[id*='phone'], input[type='tel']",
                ),
            )
            .optional(),
        ];

        if let Some(resume) = &task.profile.resume_path {
            steps.push(
                FormStep::new(
                    "resume",
                    StepKind::Upload,
                    vec![FieldAction::Attach {
                        selector: "input[type='file']".to_string(),
                        path: resume.clone(),
                    }],
                )
                .optional(),
            );
        }

        // Screening questions arrive as extra continue-gated pages.
        for page in 0..limits.max_wizard_pages {
            steps.push(
                FormStep::new(
                    format!("questions-page-{}", page + 1),
                    StepKind::Fill,
                    vec![FieldAction::Click {
                        selector: CONTINUE_BUTTON.to_string(),
                    }],
                )
                .optional(),
            );
        }

        steps.push(
            FormStep::new(
                "submit",
                StepKind::Submit,
                vec![FieldAction::Click {
                    selector: ".ia-SubmitButton, button[data-testid='submit-button']".to_string(),
                }],
            )
            .definitive(),
        );

        Box::new(steps.into_iter())
    }
}
