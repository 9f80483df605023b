//! Greenhouse board handler.
//!
//! Covers both the classic `boards.greenhouse.io` embedded form and the
//! newer `job-boards.greenhouse.io` layout. The classic board renders
//! the form behind an `#app` anchor, so the application URL gets one
//! appended when missing.

use url::Url;

use super::{
    contact_actions, FieldAction, FormStep, SiteHandler, StepKind, StepLimits, StepSequence,
};
use crate::fingerprint::{domain_matches, strip_tracking_params};
use crate::task::ApplicationTask;

pub struct GreenhouseHandler;

impl SiteHandler for GreenhouseHandler {
    fn name(&self) -> &'static str {
        "greenhouse"
    }

    fn detect(&self, url: &Url) -> bool {
        url.host_str()
            .map(|h| domain_matches(h, "greenhouse.io"))
            .unwrap_or(false)
    }

    fn application_url(&self, url: &Url) -> String {
        // Embed postings carry their identity in a `token` query
        // parameter, so only attribution parameters are dropped.
        let mut base = strip_tracking_params(url);
        if base.fragment() != Some("app") {
            base.set_fragment(Some("app"));
        }
        base.to_string()
    }

    fn ready_selector(&self) -> &'static str {
        "#application_form, #application-form, form[action*='greenhouse']"
    }

    fn confirmation_selector(&self) -> &'static str {
        "#application_confirmation, .application-confirmation"
    }

    fn steps(&self, task: &ApplicationTask, _limits: &StepLimits) -> StepSequence {
        let mut steps = vec![FormStep::new(
            "contact",
            StepKind::Fill,
            contact_actions(task, "#first_name", "#last_name", "#email", "#phone"),
        )];

        let mut link_actions = Vec::new();
        if let Some(linkedin) = &task.profile.linkedin_url {
            link_actions.push(FieldAction::Fill {
                selector: "input[name*='linkedin'], input[id*='linkedin']".to_string(),
                value: linkedin.clone(),
            });
        }
        if let Some(website) = &task.profile.website {
            link_actions.push(FieldAction::Fill {
                selector: "input[name*='website'], input[id*='website']".to_string(),
                value: website.clone(),
            });
        }
        if !link_actions.is_empty() {
            steps.push(FormStep::new("links", StepKind::Fill, link_actions).optional());
        }

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

        if let Some(cover_letter) = &task.cover_letter {
            steps.push(
                FormStep::new(
                    "cover-letter",
                    StepKind::Fill,
                    vec![FieldAction::Fill {
                        selector: "textarea[name*='cover'], #cover_letter_text".to_string(),
                        value: cover_letter.clone(),
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
                    selector: "#submit_app, input[type='submit'], button[type='submit']"
                        .to_string(),
                }],
            )
            .definitive(),
        );

        Box::new(steps.into_iter())
    }
}
