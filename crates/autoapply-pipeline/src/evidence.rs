//! Screenshot evidence capture at engine checkpoints. Best-effort:
//! a failed capture or upload is logged and the run continues.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use autoapply_browser::Driver;

use crate::store::ObjectStore;

pub struct EvidenceCapture {
    store: Arc<dyn ObjectStore>,
}

impl EvidenceCapture {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Screenshot the current page and upload it under a
    /// task-scoped, checkpoint-labelled name. Returns the reference
    /// URL, or None when either half fails.
    pub async fn capture<D: Driver>(
        &self,
        driver: &D,
        task_id: Uuid,
        checkpoint: &str,
    ) -> Option<String> {
        let bytes = match driver.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%task_id, checkpoint, "Screenshot failed: {}", e);
                return None;
            }
        };

        let name = format!(
            "{}/{}-{}.png",
            task_id,
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            checkpoint
        );
        match self.store.upload(&name, bytes).await {
            Ok(url) => {
                debug!(%task_id, checkpoint, url, "Captured evidence");
                Some(url)
            }
            Err(e) => {
                warn!(%task_id, checkpoint, "Evidence upload failed: {}", e);
                None
            }
        }
    }
}
