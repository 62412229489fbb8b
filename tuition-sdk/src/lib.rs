//! Tuition SDK - fee table, installment planning and payment reconciliation
//!
//! This crate implements the payment side of a school application flow:
//!
//! - Looking up tuition fees by subject count and payment plan
//! - Building installment schedules with month labels and per-month amounts
//! - Recording payments on the application document and deciding when a plan
//!   is fully paid
//! - Application submission, admin review, dashboards and a gateway-agnostic
//!   checkout flow on top of those
//!
//! All amounts are integer cents (ZAR minor units).
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tuition_sdk::{InMemoryStore, PaymentPlan, Reconciler, TuitionClient};
//!
//! # async fn run() -> tuition_sdk::Result<()> {
//! let client = TuitionClient::new(Arc::new(InMemoryStore::new()));
//! let reconciler = Reconciler::new(client);
//!
//! let selection = reconciler.select_plan("app-1", PaymentPlan::SixMonths, None).await?;
//! let first = &selection.schedule.installments[0];
//! reconciler
//!     .record_payment(
//!         "app-1",
//!         PaymentPlan::SixMonths,
//!         Some(first.month_label.as_str()),
//!         first.amount_minor_units,
//!         "TUI-app-1-march_2025-0",
//!     )
//!     .await?;
//!
//! let done = reconciler.is_plan_complete("app-1", PaymentPlan::SixMonths).await?;
//! # let _ = done;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod admin;
pub mod application;
pub mod checkout;
pub mod client;
pub mod clock;
pub mod dashboard;
pub mod error;
pub mod fee_table;
pub mod inflight;
pub mod reconciliation;
pub mod retry;
pub mod schedule;
pub mod store;
pub mod utils;
pub mod validation;

// Re-export commonly used items
pub use admin::{AdminCacheConfig, AdminClient, ApplicationListing};
pub use application::{ApplicationRecord, ApplicationStatus, PaymentEntry};
pub use checkout::{
    payment_reference, AcceptingVerifier, ChargeRequest, ChargeStatus, CheckoutOutcome,
    CheckoutSession, Currency, GatewayKind, GatewayResponse, PaymentGateway, PaymentVerifier,
};
pub use client::TuitionClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use dashboard::{ApplicationSummary, DashboardClient, PlanOption, ScheduleLine};
pub use error::{Result, TuitionError};
pub use fee_table::{fee_for, PaymentPlan, FEE_SCHEDULE};
pub use inflight::{InFlightGuard, InFlightToken};
pub use reconciliation::{is_month_paid, payment_state, PaymentState, PlanSelection, Reconciler};
pub use retry::{with_retry, RetryPolicy};
pub use schedule::{build_schedule, month_key, Installment, InstallmentSchedule};
pub use store::{Document, DocumentStore, InMemoryStore, JsonFileStore, VersionedDocument};
pub use validation::{validate_application_form, ApplicationForm, OFFERED_SUBJECTS};

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "TUITION_DATA_DIR";

/// Data directory for the file-backed store, checking the environment first
#[must_use]
pub fn data_dir() -> std::path::PathBuf {
    std::env::var_os(DATA_DIR_ENV).map_or_else(|| store::DEFAULT_DATA_DIR.clone(), Into::into)
}
