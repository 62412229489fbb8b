use super::{merge_into, Document, DocumentStore, Subscribers, VersionedDocument};
use crate::error::{Result, TuitionError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

/// Default directory for file-backed documents
///
/// Resolves to `<data dir>/tuition/applications`, falling back to the working
/// directory when the platform has no data directory.
pub static DEFAULT_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tuition")
        .join("applications")
});

/// Document store persisting one JSON file per document
///
/// Writes from this process are serialized; other processes writing the same
/// directory are not coordinated with.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    subscribers: Subscribers,
}

impl JsonFileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(
            service = "tuition-sdk",
            component = "json_file_store",
            event = "store_opened",
            root = %root.display(),
            "Opened file-backed document store"
        );
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            subscribers: Subscribers::default(),
        })
    }

    /// Directory holding the documents
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TuitionError::Validation(format!(
                "Invalid document id '{id}': use letters, digits, '-' or '_'"
            )));
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    async fn read_path(path: &Path) -> Result<Option<VersionedDocument>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply(&self, id: &str, patch: Document, expected: Option<u64>) -> Result<u64> {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock().await;

        let mut document = Self::read_path(&path).await?.unwrap_or(VersionedDocument {
            version: 0,
            data: Document::new(),
        });
        if let Some(expected) = expected {
            if expected != document.version {
                return Err(TuitionError::VersionConflict {
                    expected,
                    found: document.version,
                });
            }
        }

        merge_into(&mut document.data, patch);
        document.version = document.version.saturating_add(1);

        // Write-then-rename so readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&document)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        self.subscribers.publish(id, &document);
        Ok(document.version)
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn get(&self, id: &str) -> Result<Option<VersionedDocument>> {
        let path = self.path_for(id)?;
        Self::read_path(&path).await
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
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if let Some(document) = Self::read_path(&path).await? {
                documents.push((id, document));
            }
        }
        documents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(documents)
    }

    fn subscribe(&self, id: &str) -> broadcast::Receiver<VersionedDocument> {
        self.subscribers.subscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn patch(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        store
            .set_merge("app-1", patch(json!({ "status": "submitted" })))
            .await
            .unwrap();
        store
            .set_merge(
                "app-1",
                patch(json!({ "payments": { "march_2025": { "paid": true } } })),
            )
            .await
            .unwrap();

        // A second handle on the same directory sees the merged document
        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        let doc = reopened.get("app-1").await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.data["status"], "submitted");
        assert_eq!(doc.data["payments"]["march_2025"]["paid"], true);
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.set_merge("", Document::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_version_conflict_on_disk() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.set_merge("app-1", Document::new()).await.unwrap();

        let err = store
            .set_merge_if_version("app-1", Document::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TuitionError::VersionConflict { found: 1, .. }));
    }

    #[tokio::test]
    async fn test_list_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.set_merge("b", Document::new()).await.unwrap();
        store.set_merge("a", Document::new()).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
