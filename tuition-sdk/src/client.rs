//! Client for reading and writing application documents

use crate::{
    application::{ApplicationRecord, ApplicationStatus},
    clock::{Clock, SystemClock},
    error::{Result, TuitionError},
    retry::{with_retry, RetryPolicy},
    store::{Document, DocumentStore, VersionedDocument},
    validation::{canonical_subject, validate_application_form, ApplicationForm},
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Tuition client over a document store
///
/// Every store call goes through the client's [`RetryPolicy`]. Cloning is
/// cheap and clones share the same store and clock.
#[derive(Clone)]
pub struct TuitionClient {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TuitionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuitionClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl TuitionClient {
    /// Create a client using the wall clock and the default retry policy
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the retry policy
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Get the time source
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Get the retry policy
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Check if an application exists
    ///
    /// # Errors
    /// Returns an error if the store cannot be reached after retries
    pub async fn application_exists(&self, application_id: &str) -> Result<bool> {
        Ok(self.get_application(application_id).await?.is_some())
    }

    /// Fetch and decode an application with the version it was read at
    ///
    /// # Errors
    /// Returns an error if the store fails after retries or the document is malformed
    pub async fn get_application(
        &self,
        application_id: &str,
    ) -> Result<Option<(u64, ApplicationRecord)>> {
        let store = &self.store;
        let document = with_retry(&self.retry, "get_application", move || async move {
            store.get(application_id).await
        })
        .await?;

        debug!(
            service = "tuition-sdk",
            component = "client",
            event = "application_read",
            application_id = application_id,
            found = document.is_some(),
            "Read application document"
        );

        document
            .map(|d| Ok((d.version, ApplicationRecord::from_document(&d.data)?)))
            .transpose()
    }

    /// Fetch an application that must exist
    ///
    /// # Errors
    /// Returns `ApplicationNotFound` if there is no such document
    pub async fn require_application(
        &self,
        application_id: &str,
    ) -> Result<(u64, ApplicationRecord)> {
        self.get_application(application_id)
            .await?
            .ok_or_else(|| TuitionError::ApplicationNotFound(application_id.to_string()))
    }

    /// Read an application, derive a patch from it, and write it back only if
    /// nobody else wrote in between
    ///
    /// A version conflict re-reads and re-derives on the next attempt. When
    /// `derive` returns `None` nothing is written and the read version is
    /// returned.
    ///
    /// # Errors
    /// Returns `ApplicationNotFound`, the error from `derive`, or the last
    /// store error once retries are exhausted
    pub async fn update_with<F>(
        &self,
        application_id: &str,
        operation: &str,
        derive: F,
    ) -> Result<u64>
    where
        F: Fn(&ApplicationRecord) -> Result<Option<Document>> + Send + Sync,
    {
        let store = &self.store;
        let derive = &derive;
        with_retry(&self.retry, operation, move || async move {
            let current = store
                .get(application_id)
                .await?
                .ok_or_else(|| TuitionError::ApplicationNotFound(application_id.to_string()))?;
            let record = ApplicationRecord::from_document(&current.data)?;
            match derive(&record)? {
                Some(patch) => {
                    store
                        .set_merge_if_version(application_id, patch, current.version)
                        .await
                }
                None => Ok(current.version),
            }
        })
        .await
    }

    /// Decode every application in the store
    ///
    /// # Errors
    /// Returns an error if listing fails after retries or a document is malformed
    pub async fn list_applications(&self) -> Result<Vec<(String, ApplicationRecord)>> {
        let store = &self.store;
        let documents = with_retry(&self.retry, "list_applications", move || async move {
            store.list().await
        })
        .await?;

        documents
            .into_iter()
            .map(|(id, d)| Ok((id, ApplicationRecord::from_document(&d.data)?)))
            .collect()
    }

    /// Subscribe to writes on an application document
    #[must_use]
    pub fn watch(&self, application_id: &str) -> broadcast::Receiver<VersionedDocument> {
        self.store.subscribe(application_id)
    }

    /// Validate and save a new application
    ///
    /// The application is created with status `submitted`. Submitting again
    /// for an existing id fails with a version conflict rather than
    /// overwriting review state.
    ///
    /// # Errors
    /// Returns a validation error for an incomplete form, or a store error
    pub async fn submit_application(
        &self,
        application_id: &str,
        form: &ApplicationForm,
    ) -> Result<ApplicationRecord> {
        validate_application_form(form)?;

        let now = self.clock.now();
        let selected_subjects: BTreeSet<String> = form
            .subjects
            .iter()
            .filter_map(|s| canonical_subject(s))
            .map(str::to_string)
            .collect();

        let record = ApplicationRecord {
            student_name: form.student_name.trim().to_string(),
            email: form.email.trim().to_string(),
            grade: form.grade.clone(),
            selected_subjects,
            consent_accepted: form.consent_accepted,
            rules_accepted: form.rules_accepted,
            pledge_accepted: form.pledge_accepted,
            status: ApplicationStatus::Submitted,
            submitted_at: Some(now),
            updated_at: Some(now),
            ..ApplicationRecord::default()
        };

        let store = &self.store;
        let document = &record.to_document()?;
        let version = with_retry(&self.retry, "submit_application", move || async move {
            store
                .set_merge_if_version(application_id, document.clone(), 0)
                .await
        })
        .await?;

        info!(
            service = "tuition-sdk",
            component = "client",
            event = "application_submitted",
            application_id = application_id,
            subject_count = record.selected_subjects.len(),
            version = version,
            "Application submitted"
        );

        Ok(record)
    }

    /// Timestamp patch applied alongside every state change
    pub(crate) fn touch(&self) -> (String, Value) {
        ("updatedAt".to_string(), json!(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::atomic::Ordering;

    fn form() -> ApplicationForm {
        ApplicationForm {
            student_name: " Sipho Dlamini ".to_string(),
            email: "sipho@example.com".to_string(),
            grade: Some("10".to_string()),
            subjects: vec!["mathematics".to_string(), "English".to_string()],
            consent_accepted: true,
            rules_accepted: true,
            pledge_accepted: true,
        }
    }

    fn client(store: &Arc<InMemoryStore>) -> TuitionClient {
        TuitionClient::new(store.clone()).with_retry_policy(RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_submit_creates_submitted_record() {
        let store = Arc::new(InMemoryStore::new());
        let client = client(&store);

        let record = client.submit_application("app-1", &form()).await.unwrap();
        assert_eq!(record.student_name, "Sipho Dlamini");
        assert_eq!(record.status, ApplicationStatus::Submitted);
        assert!(record.selected_subjects.contains("Mathematics"));

        let (version, stored) = client.require_application("app-1").await.unwrap();
        assert_eq!(version, 1);
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_form_without_writing() {
        let store = Arc::new(InMemoryStore::new());
        let client = client(&store);

        let mut incomplete = form();
        incomplete.subjects.clear();
        let err = client
            .submit_application("app-1", &incomplete)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.write_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_resubmission_does_not_overwrite() {
        let store = Arc::new(InMemoryStore::new());
        let client = client(&store);
        client.submit_application("app-1", &form()).await.unwrap();

        let err = client
            .submit_application("app-1", &form())
            .await
            .unwrap_err();
        assert!(matches!(err, TuitionError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_require_missing_application() {
        let store = Arc::new(InMemoryStore::new());
        let err = client(&store)
            .require_application("nope")
            .await
            .unwrap_err();
        assert!(matches!(err, TuitionError::ApplicationNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_are_retried() {
        let store = Arc::new(InMemoryStore::new());
        let client = TuitionClient::new(store.clone());
        client.submit_application("app-1", &form()).await.unwrap();

        store.fail_next(2);
        assert!(client.require_application("app-1").await.is_ok());
        assert_eq!(store.read_calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_update_with_skips_write_when_nothing_derived() {
        let store = Arc::new(InMemoryStore::new());
        let client = client(&store);
        client.submit_application("app-1", &form()).await.unwrap();

        let version = client
            .update_with("app-1", "noop", |_| Ok(None))
            .await
            .unwrap();
        assert_eq!(version, 1);
        assert_eq!(store.write_calls.load(Ordering::Relaxed), 1);
    }
}
