//! Fallback handler for unrecognized career pages. Always matches.
//!
//! Fills whatever common fields a plain application form exposes,
//! matched by attribute keywords rather than a known layout, so every
//! step except the submit click is optional.

use url::Url;

use super::{FieldAction, FormStep, SiteHandler, StepKind, StepLimits, StepSequence};
use crate::fingerprint::strip_tracking_params;
use crate::task::ApplicationTask;

pub struct GenericHandler;

impl SiteHandler for GenericHandler {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn detect(&self, _url: &Url) -> bool {
        true
    }

    fn application_url(&self, url: &Url) -> String {
        // Unknown pages may route on their query (`/apply?id=N`), so
        // only attribution parameters are dropped.
        strip_tracking_params(url).to_string()
    }

    fn ready_selector(&self) -> &'static str {
        "form"
    }

    fn confirmation_selector(&self) -> &'static str {
        ".confirmation, .thank-you, [class*='success']"
    }

    fn steps(&self, task: &ApplicationTask, _limits: &StepLimits) -> StepSequence {
        let profile = &task.profile;
        let mut steps = vec![
            FormStep::new(
                "name",
                StepKind::Fill,
                vec![FieldAction::Fill {
                    selector: "input[name*='name']:not([name*='user']), input[id*='name']"
                        .to_string(),
                    value: profile.full_name.clone(),
                }],
            )
            .optional(),
            FormStep::new(
                "contact",
                StepKind::Fill,
                vec![
                    FieldAction::Fill {
                        selector: "input[type='email'], input[name*='email']".to_string(),
                        value: profile.email.clone(),
                    },
                    FieldAction::Fill {
                        selector: "input[type='tel'], input[name*='phone']".to_string(),
                        value: profile.phone.clone(),
                    },
                ],
            )
            .optional(),
        ];

        if let Some(resume) = &profile.resume_path {
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
                        selector: "textarea[name*='cover'], textarea[id*='cover'], textarea"
                            .to_string(),
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
                    selector: "button[type='submit'], input[type='submit']".to_string(),
                }],
            )
            .definitive(),
        );

        Box::new(steps.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::test_support::sample_task;

    #[test]
    fn test_matches_anything() {
        let h = GenericHandler;
        assert!(h.detect(&Url::parse("https://jobs.smallco.example/openings/42").unwrap()));
        assert!(h.detect(&Url::parse("ftp://weird.example/x").unwrap()));
    }

    #[test]
    fn test_tracking_stripped_from_application_url() {
        let h = GenericHandler;
        let url = Url::parse("https://jobs.smallco.example/openings/42?utm_source=x").unwrap();
        assert_eq!(
            h.application_url(&url),
            "https://jobs.smallco.example/openings/42"
        );
    }

    #[test]
    fn test_routing_query_survives_application_url() {
        let h = GenericHandler;
        let url = Url::parse("https://careers.smallco.example/apply?id=42&utm_source=x").unwrap();
        assert_eq!(
            h.application_url(&url),
            "https://careers.smallco.example/apply?id=42"
        );
    }

    #[test]
    fn test_only_submit_is_mandatory() {
        let task = sample_task("https://jobs.smallco.example/openings/42");
        let limits = StepLimits {
            max_wizard_pages: 8,
            submit: true,
        };
        let steps: Vec<FormStep> = GenericHandler.steps(&task, &limits).collect();
        for step in &steps[..steps.len() - 1] {
            assert!(step.optional, "step {} should be optional", step.name);
        }
        assert!(!steps.last().unwrap().optional);
    }
}
