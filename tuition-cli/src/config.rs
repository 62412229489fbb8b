//! Configuration management for the Tuition CLI
//!
//! Every tunable value comes from an environment variable with a sensible
//! default.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tuition_sdk::{utils::format_rands_with, AdminCacheConfig, RetryPolicy};

/// Centralized configuration for the Tuition CLI
#[derive(Debug, Clone)]
pub struct TuitionCliConfig {
    /// Directory holding one JSON document per application
    pub data_dir: PathBuf,

    /// Default output format for CLI commands
    pub default_output_format: String,

    /// Minor units per rand for display
    pub currency_divisor: u64,

    /// Store attempts per operation, including the first
    pub retry_attempts: u32,

    /// Delay after the first failed store attempt
    pub retry_base_delay_ms: u64,

    /// How long admin listings are served from cache
    pub admin_cache_ttl_secs: u64,
}

impl TuitionCliConfig {
    /// Create a new configuration instance with values from environment variables
    /// or sensible defaults if not set
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_dir: tuition_sdk::data_dir(),

            default_output_format: env::var("TUITION_DEFAULT_OUTPUT_FORMAT")
                .unwrap_or_else(|_| "human".to_string()),

            currency_divisor: env::var("TUITION_CURRENCY_DIVISOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|d| *d > 0)
                .unwrap_or(100),

            retry_attempts: env::var("TUITION_RETRY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),

            retry_base_delay_ms: env::var("TUITION_RETRY_BASE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(250),

            admin_cache_ttl_secs: env::var("TUITION_ADMIN_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600), // 1 hour
        }
    }

    /// Retry policy for store operations
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    /// Cache settings for admin listings
    #[must_use]
    pub fn admin_cache_config(&self) -> AdminCacheConfig {
        AdminCacheConfig {
            ttl: Duration::from_secs(self.admin_cache_ttl_secs),
            ..AdminCacheConfig::default()
        }
    }

    /// Format cents for display, e.g. `R 2,300.00`
    #[must_use]
    pub fn format_amount(&self, minor_units: u64) -> String {
        format_rands_with(minor_units, self.currency_divisor)
    }
}

impl Default for TuitionCliConfig {
    fn default() -> Self {
        Self::new()
    }
}
