//! LinkedIn Easy Apply handler.
//!
//! Easy Apply is a modal wizard with a page count that is only
//! discoverable by clicking through, so the handler emits a lazy run of
//! optional wizard-page steps capped by the configured limit. Pages
//! past the real end of the wizard find no Next button and are skipped.

use url::Url;

use super::{FieldAction, FormStep, SiteHandler, StepKind, StepLimits, StepSequence};
use crate::fingerprint::domain_matches;
use crate::task::ApplicationTask;

const NEXT_BUTTON: &str =
    "button[aria-label='Continue to next step'], button[aria-label='Next']";

pub struct LinkedInHandler;

impl SiteHandler for LinkedInHandler {
    fn name(&self) -> &'static str {
        "linkedin"
    }

    fn detect(&self, url: &Url) -> bool {
        url.host_str()
            .map(|h| domain_matches(h, "linkedin.com"))
            .unwrap_or(false)
    }

    fn ready_selector(&self) -> &'static str {
        "button.jobs-apply-button, .jobs-apply-button--top-card"
    }

    fn confirmation_selector(&self) -> &'static str {
        ".artdeco-modal__content h2, .jpac-modal-header"
    }

    fn steps(&self, task: &ApplicationTask, limits: &StepLimits) -> StepSequence {
        let profile = task.profile.clone();
        let resume = profile.resume_path.clone();
        let max_pages = limits.max_wizard_pages;

        let open = std::iter::once(FormStep::new(
            "open-easy-apply",
            StepKind::Fill,
            vec![FieldAction::Click {
                selector: "button.jobs-apply-button".to_string(),
            }],
        ));

        let contact = std::iter::once(
            FormStep::new(
                "contact",
                StepKind::Fill,
                vec![
                    FieldAction::Fill {
                        selector: "input[id*='email'], input[name*='email']".to_string(),
                        value: profile.email.clone(),
                    },
                    FieldAction::Fill {
                        selector: "input[id*='phoneNumber'], input[name*='phone']".to_string(),
                        value: profile.phone.clone(),
                    },
                ],
            )
            .optional(),
        );

        let upload = resume.into_iter().map(|path| {
            FormStep::new(
                "resume",
                StepKind::Upload,
                vec![FieldAction::Attach {
                    selector: "input[type='file'][id*='upload-resume'], input[type='file']"
                        .to_string(),
                    path,
                }],
            )
            .optional()
        });

        // Lazily produced continuation pages. Each one just advances
        // the wizard; missing Next buttons end the run early.
        let wizard = (0..max_pages).map(|page| {
            FormStep::new(
                format!("wizard-page-{}", page + 1),
                StepKind::Fill,
                vec![FieldAction::Click {
                    selector: NEXT_BUTTON.to_string(),
                }],
            )
            .optional()
        });

        let review = std::iter::once(
            FormStep::new(
                "review",
                StepKind::Review,
                vec![FieldAction::Click {
                    selector: "button[aria-label='Review your application']".to_string(),
                }],
            )
            .optional(),
        );

        let submit = std::iter::once(
            FormStep::new(
                "submit",
                StepKind::Submit,
                vec![FieldAction::Click {
                    selector: "button[aria-label='Submit application']".to_string(),
                }],
            )
            .definitive(),
        );

        Box::new(
            open.chain(contact)
                .chain(upload)
                .chain(wizard)
                .chain(review)
                .chain(submit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::test_support::sample_task;

    #[test]
    fn test_detects_linkedin_hosts() {
        let h = LinkedInHandler;
        assert!(h.detect(&Url::parse("https://www.linkedin.com/jobs/view/1").unwrap()));
        assert!(!h.detect(&Url::parse("https://linkedin.example.com/jobs/1").unwrap()));
        assert!(!h.detect(&Url::parse("https://fakelinkedin.com/jobs/view/1").unwrap()));
    }

    #[test]
    fn test_wizard_pages_bounded_by_limit() {
        let task = sample_task("https://www.linkedin.com/jobs/view/1");
        let limits = StepLimits {
            max_wizard_pages: 3,
            submit: true,
        };
        let steps: Vec<FormStep> = LinkedInHandler.steps(&task, &limits).collect();

        let wizard_pages = steps
            .iter()
            .filter(|s| s.name.starts_with("wizard-page-"))
            .count();
        assert_eq!(wizard_pages, 3);
        assert!(steps.last().unwrap().definitive);
    }

    #[test]
    fn test_wizard_pages_are_optional() {
        let task = sample_task("https://www.linkedin.com/jobs/view/1");
        let limits = StepLimits {
            max_wizard_pages: 8,
            submit: true,
        };
        assert!(LinkedInHandler
            .steps(&task, &limits)
            .filter(|s| s.name.starts_with("wizard-page-"))
            .all(|s| s.optional));
    }
}
