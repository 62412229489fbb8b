use super::{merge_into, Document, DocumentStore, Subscribers, VersionedDocument};
use crate::error::{Result, TuitionError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::{broadcast, Mutex};

/// Process-local document store
///
/// Used by tests and as a stand-in for the remote store. Writes can be made to
/// fail on demand to exercise retry paths.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: Mutex<HashMap<String, VersionedDocument>>,
    subscribers: Subscribers,
    failures_remaining: AtomicU32,
    /// Number of successful writes, for assertions
    pub write_calls: AtomicU64,
    /// Number of `get` calls, for assertions
    pub read_calls: AtomicU64,
    /// Number of `list` calls, for assertions
    pub list_calls: AtomicU64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` operations fail with a store error
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<()> {
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(TuitionError::Store("injected failure".to_string()));
        }
        Ok(())
    }

    async fn apply(&self, id: &str, patch: Document, expected: Option<u64>) -> Result<u64> {
        self.maybe_fail()?;
        let mut documents = self.documents.lock().await;
        let current_version = documents.get(id).map_or(0, |d| d.version);
        if let Some(expected) = expected {
            if expected != current_version {
                return Err(TuitionError::VersionConflict {
                    expected,
                    found: current_version,
                });
            }
        }

        let entry = documents
            .entry(id.to_string())
            .or_insert_with(|| VersionedDocument {
                version: 0,
                data: Document::new(),
            });
        merge_into(&mut entry.data, patch);
        entry.version = entry.version.saturating_add(1);
        let snapshot = entry.clone();
        drop(documents);

        self.write_calls.fetch_add(1, Ordering::Relaxed);
        self.subscribers.publish(id, &snapshot);
        Ok(snapshot.version)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<VersionedDocument>> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        self.maybe_fail()?;
        Ok(self.documents.lock().await.get(id).cloned())
    }

    async fn set_merge(&self, id: &str, patch: Document) -> Result<u64> {
        self.apply(id, patch, None).await
    }

    async fn set_merge_if_version(
        &self,
        id: &str,
        patch: Document,
        expected_version: u64,
    ) -> Result<u64> {
        self.apply(id, patch, Some(expected_version)).await
    }

    async fn list(&self) -> Result<Vec<(String, VersionedDocument)>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.maybe_fail()?;
        let documents = self.documents.lock().await;
        let sorted: BTreeMap<_, _> = documents
            .iter()
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();
        Ok(sorted.into_iter().collect())
    }

    fn subscribe(&self, id: &str) -> broadcast::Receiver<VersionedDocument> {
        self.subscribers.subscribe(id)
    }
}
