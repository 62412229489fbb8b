//! Document store abstraction
//!
//! Application records live in a schemaless document store keyed by
//! application id. The store is the only source of truth; this crate reads a
//! document, derives new state, and merges a partial patch back.
//!
//! Each document carries a store-managed `version` that increases on every
//! write. [`DocumentStore::set_merge`] is an unconditional merge, while
//! [`DocumentStore::set_merge_if_version`] only applies when the caller saw
//! the latest version.

mod file;
mod memory;

pub use file::{JsonFileStore, DEFAULT_DATA_DIR};
pub use memory::InMemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Untyped document body
pub type Document = Map<String, Value>;

/// Capacity of each per-document change channel
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// A document with the version it was read at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDocument {
    pub version: u64,
    pub data: Document,
}

/// Remote document store used for application records
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` if it does not exist
    async fn get(&self, id: &str) -> Result<Option<VersionedDocument>>;

    /// Deep-merge `patch` into the document, creating it if missing
    ///
    /// Returns the new version.
    async fn set_merge(&self, id: &str, patch: Document) -> Result<u64>;

    /// Deep-merge `patch` only if the stored version equals `expected_version`
    ///
    /// An `expected_version` of `0` means the document must not exist yet.
    /// Fails with [`crate::TuitionError::VersionConflict`] otherwise.
    async fn set_merge_if_version(
        &self,
        id: &str,
        patch: Document,
        expected_version: u64,
    ) -> Result<u64>;

    /// All documents in the store
    async fn list(&self) -> Result<Vec<(String, VersionedDocument)>>;

    /// Receive every subsequent write to `id`
    fn subscribe(&self, id: &str) -> broadcast::Receiver<VersionedDocument>;
}

/// Recursively merge `patch` into `target`
///
/// Objects merge key by key; any other value replaces what was there.
pub fn merge_into(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Per-document broadcast channels shared by the store implementations
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    channels: Mutex<HashMap<String, broadcast::Sender<VersionedDocument>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self, id: &str) -> broadcast::Receiver<VersionedDocument> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(id.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub(crate) fn publish(&self, id: &str, document: &VersionedDocument) {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(sender) = channels.get(id) else {
            return;
        };
        if sender.send(document.clone()).is_err() {
            // Every receiver for this document is gone
            channels.remove(id);
        }
    }
}
