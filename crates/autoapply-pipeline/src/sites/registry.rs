//! Ordered site detector chain.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::{GenericHandler, GreenhouseHandler, IndeedHandler, LinkedInHandler, SiteHandler};

/// Resolves a job URL to its handler. Detectors run most-specific
/// first; the generic fallback makes resolution total.
pub struct SiteRegistry {
    handlers: Vec<Arc<dyn SiteHandler>>,
    fallback: Arc<dyn SiteHandler>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self {
            handlers: vec![
                Arc::new(LinkedInHandler),
                Arc::new(IndeedHandler),
                Arc::new(GreenhouseHandler),
            ],
            fallback: Arc::new(GenericHandler),
        }
    }

    pub fn resolve(&self, url: &Url) -> Arc<dyn SiteHandler> {
        let handler = self
            .handlers
            .iter()
            .find(|h| h.detect(url))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        debug!(site = handler.name(), %url, "Resolved site handler");
        handler
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
