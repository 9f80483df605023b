//! Persistence and object-storage collaborator traits.
//!
//! The pipeline treats both as external services behind traits. The
//! in-memory implementations back the batch runner and the tests; a
//! real deployment substitutes database- and bucket-backed ones.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::fingerprint::ApplicationFingerprint;
use crate::result::TaskResult;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// Outcome of the atomic fingerprint insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Durable application records keyed by fingerprint.
///
/// `insert_if_absent` is the authoritative duplicate barrier: it must
/// be atomic so concurrent same-fingerprint tasks resolve to exactly
/// one Inserted.
#[async_trait]
pub trait ApplicationStore: Send + Sync + 'static {
    async fn insert_if_absent(
        &self,
        fingerprint: &ApplicationFingerprint,
        result: &TaskResult,
    ) -> Result<InsertOutcome, StoreError>;

    async fn record_result(&self, result: &TaskResult) -> Result<(), StoreError>;

    async fn exists(&self, fingerprint: &ApplicationFingerprint) -> Result<bool, StoreError>;

    async fn get(&self, task_id: Uuid) -> Result<Option<TaskResult>, StoreError>;
}

/// Screenshot storage: bytes in, reference URL out.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String, StoreError>;
}

/// In-memory [`ApplicationStore`].
#[derive(Default)]
pub struct MemoryApplicationStore {
    fingerprints: Mutex<HashSet<ApplicationFingerprint>>,
    results: Mutex<HashMap<Uuid, TaskResult>>,
}

impl MemoryApplicationStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn insert_if_absent(
        &self,
        fingerprint: &ApplicationFingerprint,
        _result: &TaskResult,
    ) -> Result<InsertOutcome, StoreError> {
        // A single lock makes check-and-insert atomic.
        let mut fingerprints = self.fingerprints.lock();
        if fingerprints.insert(fingerprint.clone()) {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }

    async fn record_result(&self, result: &TaskResult) -> Result<(), StoreError> {
        self.results.lock().insert(result.task_id, result.clone());
        Ok(())
    }

    async fn exists(&self, fingerprint: &ApplicationFingerprint) -> Result<bool, StoreError> {
        Ok(self.fingerprints.lock().contains(fingerprint))
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<TaskResult>, StoreError> {
        Ok(self.results.lock().get(&task_id).cloned())
    }
}

/// In-memory [`ObjectStore`] handing out `memory://` URLs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        if bytes.is_empty() {
            return Err(StoreError::Upload(format!("{}: empty payload", name)));
        }
        self.objects.lock().insert(name.to_string(), bytes);
        Ok(format!("memory://{}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_if_absent_is_first_wins() {
        let store = MemoryApplicationStore::new();
        let fp = ApplicationFingerprint::new("u-1", "https://example.com/jobs/1");
        let result = TaskResult::started(Uuid::new_v4());

        assert_eq!(
            store.insert_if_absent(&fp, &result).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_if_absent(&fp, &result).await.unwrap(),
            InsertOutcome::AlreadyExists
        );
        assert!(store.exists(&fp).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_result_is_queryable() {
        let store = MemoryApplicationStore::new();
        let result = TaskResult::started(Uuid::new_v4()).completed();
        store.record_result(&result).await.unwrap();

        let fetched = store.get(result.task_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, result.status);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_object_store_urls() {
        let store = MemoryObjectStore::new();
        let url = store.upload("t/shot.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(url, "memory://t/shot.png");
        assert_eq!(store.object_count(), 1);
        assert!(store.upload("t/empty.png", vec![]).await.is_err());
    }
}
