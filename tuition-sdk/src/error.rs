//! Error types for the Tuition SDK
//!
//! Errors fall into four groups that callers handle differently:
//!
//! - **Validation** (`Validation`, `NoSubjectsSelected`, `InvalidStatusTransition`):
//!   surfaced to the user immediately, never retried.
//! - **Remote I/O** (`Store`, `Io`, `Json`, `VersionConflict`): retried by
//!   [`crate::retry::with_retry`] and surfaced once attempts are exhausted.
//! - **Gateway** (`PaymentCancelled`, `PaymentDeclined`, `VerificationFailed`):
//!   reported back from the payment flow, the user may re-attempt manually.
//! - **Precondition** (`MissingMonthLabel`, `PaymentInFlight`, `StaleRequest`):
//!   caller bugs or concurrent use of a checkout session.
//!
//! # Example
//!
//! ```rust
//! use tuition_sdk::{error::TuitionError, fee_table::PaymentPlan, reconciliation::Reconciler};
//!
//! async fn record(reconciler: &Reconciler) {
//!     match reconciler
//!         .record_payment("app-1", PaymentPlan::SixMonths, None, 38_334, "ref")
//!         .await
//!     {
//!         Ok(()) => println!("recorded"),
//!         Err(TuitionError::MissingMonthLabel) => {
//!             println!("installment payments need a month label");
//!         }
//!         Err(other_error) => println!("Other error: {other_error}"),
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type for Tuition SDK operations
pub type Result<T> = std::result::Result<T, TuitionError>;

/// Error types that can occur when using the Tuition SDK
#[derive(Error, Debug)]
pub enum TuitionError {
    /// Error from serde JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error from a file-backed store or cache
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("Tuition SDK error: {0}")]
    Generic(String),

    /// Invalid form input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Application submitted without any subjects
    #[error("At least one subject must be selected")]
    NoSubjectsSelected,

    /// Admin tried to move an application to a status it cannot reach
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Installment payment recorded without a month label
    #[error("Installment payments require a month label")]
    MissingMonthLabel,

    /// Application document not found
    #[error("Application not found: {0}")]
    ApplicationNotFound(String),

    /// Conditional write lost a race with another writer
    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    /// Document store failure
    #[error("Store error: {0}")]
    Store(String),

    /// User closed the gateway modal
    #[error("Payment was cancelled")]
    PaymentCancelled,

    /// Gateway declined the charge
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// Gateway reference could not be verified
    #[error("Payment verification failed for reference: {0}")]
    VerificationFailed(String),

    /// A payment is already being processed by this session
    #[error("A payment is already in progress")]
    PaymentInFlight,

    /// A callback arrived for a request that is no longer current
    #[error("Stale payment request: token {0} is not the active request")]
    StaleRequest(u64),
}

impl From<String> for TuitionError {
    fn from(msg: String) -> Self {
        Self::Generic(msg)
    }
}

impl From<&str> for TuitionError {
    fn from(msg: &str) -> Self {
        Self::Generic(msg.to_string())
    }
}

impl From<anyhow::Error> for TuitionError {
    fn from(error: anyhow::Error) -> Self {
        Self::Generic(error.to_string())
    }
}

impl TuitionError {
    /// Whether this error came from user input rather than the environment
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NoSubjectsSelected | Self::InvalidStatusTransition { .. }
        )
    }

    /// Whether this error was reported by the payment gateway flow
    #[must_use]
    pub const fn is_gateway(&self) -> bool {
        matches!(
            self,
            Self::PaymentCancelled | Self::PaymentDeclined(_) | Self::VerificationFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(TuitionError::NoSubjectsSelected.is_validation());
        assert!(TuitionError::Validation("email".to_string()).is_validation());
        assert!(!TuitionError::Store("offline".to_string()).is_validation());

        assert!(TuitionError::PaymentCancelled.is_gateway());
        assert!(TuitionError::PaymentDeclined("insufficient funds".to_string()).is_gateway());
        assert!(!TuitionError::MissingMonthLabel.is_gateway());
    }

    #[test]
    fn test_error_messages() {
        let err = TuitionError::VersionConflict {
            expected: 3,
            found: 4,
        };
        assert_eq!(err.to_string(), "Version conflict: expected 3, found 4");

        let err: TuitionError = "boom".into();
        assert_eq!(err.to_string(), "Tuition SDK error: boom");
    }
}
