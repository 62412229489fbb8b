//! Admin application listing and review
//!
//! Listing every application reads the whole collection, so results are
//! cached per status filter in an LRU with a freshness TTL. Status changes
//! made through this client clear the cache; writes from elsewhere show up
//! once the TTL lapses.

use crate::{
    application::{ApplicationRecord, ApplicationStatus},
    client::TuitionClient,
    error::Result,
    fee_table::PaymentPlan,
    store::Document,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Cache settings for admin listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminCacheConfig {
    pub enabled: bool,
    /// How long a cached listing is served before refetching
    pub ttl: Duration,
    /// Maximum number of cached status filters
    pub capacity: usize,
}

impl Default for AdminCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600), // 1 hour
            capacity: 64,
        }
    }
}

/// One row of the admin application table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationListing {
    pub application_id: String,
    pub student_name: String,
    pub email: String,
    pub grade: Option<String>,
    pub status: ApplicationStatus,
    pub subjects: Vec<String>,
    pub payment_plan: Option<PaymentPlan>,
    /// Paid installment entries, or 1 for a paid upfront plan
    pub payments_made: usize,
    pub tuition_paid: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ApplicationListing {
    fn from_record(application_id: String, record: ApplicationRecord) -> Self {
        let payments_made = if record.tuition_paid {
            1
        } else {
            record.payments.values().filter(|p| p.paid).count()
        };
        Self {
            application_id,
            student_name: record.student_name,
            email: record.email,
            grade: record.grade,
            status: record.status,
            subjects: record.selected_subjects.into_iter().collect(),
            payment_plan: record.payment_plan,
            payments_made,
            tuition_paid: record.tuition_paid,
            submitted_at: record.submitted_at,
        }
    }
}

/// Cache key: the status filter of a listing
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct ListQuery {
    status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    listings: Vec<ApplicationListing>,
    cached_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expiry = self.cached_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        now > expiry
    }
}

/// Client for the admin review screens
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: TuitionClient,
    config: AdminCacheConfig,
    cache: Arc<Mutex<LruCache<ListQuery, CacheEntry>>>,
}

impl AdminClient {
    /// Create an admin client
    ///
    /// # Errors
    /// Returns an error if the cache capacity is zero
    pub fn new(client: TuitionClient, config: AdminCacheConfig) -> Result<Self> {
        let capacity =
            NonZeroUsize::new(config.capacity).context("Cache size must be greater than 0")?;

        debug!(
            service = "tuition-sdk",
            component = "admin",
            event = "client_created",
            cache_enabled = config.enabled,
            cache_ttl_secs = config.ttl.as_secs(),
            cache_capacity = config.capacity,
            "Created admin client"
        );

        Ok(Self {
            client,
            config,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        })
    }

    #[must_use]
    pub const fn client(&self) -> &TuitionClient {
        &self.client
    }

    /// Applications, newest submission first, optionally filtered by status
    ///
    /// # Errors
    /// Returns an error if the store cannot be listed after retries
    pub async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationListing>> {
        let query = ListQuery { status };
        if let Some(cached) = self.get_from_cache(query) {
            debug!(
                service = "tuition-sdk",
                component = "admin",
                event = "cache_hit",
                status = ?status,
                cached_count = cached.len(),
                "Returning cached application listing"
            );
            return Ok(cached);
        }

        let mut listings: Vec<ApplicationListing> = self
            .client
            .list_applications()
            .await?
            .into_iter()
            .filter(|(_, record)| status.is_none_or(|s| record.status == s))
            .map(|(id, record)| ApplicationListing::from_record(id, record))
            .collect();
        listings.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| a.application_id.cmp(&b.application_id))
        });

        info!(
            service = "tuition-sdk",
            component = "admin",
            event = "applications_listed",
            status = ?status,
            count = listings.len(),
            "Fetched application listing"
        );

        self.store_in_cache(query, listings.clone());
        Ok(listings)
    }

    /// Move an application to a new review status
    ///
    /// Setting the status it already has writes nothing.
    ///
    /// # Errors
    /// Returns `InvalidStatusTransition`, `ApplicationNotFound`, or a store error
    pub async fn set_status(&self, application_id: &str, status: ApplicationStatus) -> Result<()> {
        let touch = self.client.touch();
        let version = self
            .client
            .update_with(application_id, "set_status", |record| {
                record.status.ensure_transition(status)?;
                if record.status == status {
                    return Ok(None);
                }
                let mut patch = Document::new();
                patch.insert("status".to_string(), json!(status));
                patch.insert(touch.0.clone(), touch.1.clone());
                Ok(Some(patch))
            })
            .await?;
        self.invalidate_cache();

        info!(
            service = "tuition-sdk",
            component = "admin",
            event = "status_updated",
            application_id = application_id,
            status = %status,
            version = version,
            "Application status updated"
        );
        Ok(())
    }

    fn get_from_cache(&self, query: ListQuery) -> Option<Vec<ApplicationListing>> {
        if !self.config.enabled {
            return None;
        }
        let now = self.client.clock().now();
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(entry) = cache.get(&query) {
                if !entry.is_expired(now, self.config.ttl) {
                    return Some(entry.listings.clone());
                }
                cache.pop(&query);
            }
        }
        None
    }

    fn store_in_cache(&self, query: ListQuery, listings: Vec<ApplicationListing>) {
        if !self.config.enabled {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                query,
                CacheEntry {
                    listings,
                    cached_at: self.client.clock().now(),
                },
            );
        }
    }

    /// Drop every cached listing
    pub fn invalidate_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }

        debug!(
            service = "tuition-sdk",
            component = "admin",
            event = "cache_cleared",
            "Admin listing cache has been cleared"
        );
    }

    /// Get cache statistics
    #[must_use]
    pub fn cache_stats(&self) -> HashMap<String, u64> {
        let mut stats = HashMap::new();

        if let Ok(cache) = self.cache.lock() {
            stats.insert(
                "cache_size".to_string(),
                u64::try_from(cache.len()).unwrap_or(u64::MAX),
            );
            stats.insert(
                "cache_capacity".to_string(),
                u64::try_from(cache.cap().get()).unwrap_or(u64::MAX),
            );
        }

        stats
    }
}
