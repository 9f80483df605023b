//! Cheap duplicate pre-check.
//!
//! Runs before any browser work. Two concurrent tasks for the same
//! fingerprint may both see Fresh here; the store's atomic
//! `insert_if_absent` is the authoritative barrier.

use std::sync::Arc;

use tracing::debug;

use crate::fingerprint::ApplicationFingerprint;
use crate::store::{ApplicationStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Duplicate,
}

pub struct DuplicateGuard {
    store: Arc<dyn ApplicationStore>,
}

impl DuplicateGuard {
    pub fn new(store: Arc<dyn ApplicationStore>) -> Self {
        Self { store }
    }

    pub async fn check(
        &self,
        fingerprint: &ApplicationFingerprint,
    ) -> Result<Freshness, StoreError> {
        if self.store.exists(fingerprint).await? {
            debug!(%fingerprint, "Duplicate application detected");
            Ok(Freshness::Duplicate)
        } else {
            Ok(Freshness::Fresh)
        }
    }
}
