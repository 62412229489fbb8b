//! Single in-flight payment guard
//!
//! A checkout session allows one payment at a time. Each accepted request
//! gets a fresh [`InFlightToken`]; only the holder of the current token can
//! release the guard, so a late callback from an abandoned request cannot
//! unlock a newer one.

use crate::error::{Result, TuitionError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Proof of owning the guard for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InFlightToken(u64);

impl InFlightToken {
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Allows at most one payment request at a time
#[derive(Debug)]
pub struct InFlightGuard {
    current: Mutex<Option<u64>>,
    next_id: AtomicU64,
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlightGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn with_current<T>(&self, f: impl FnOnce(&mut Option<u64>) -> T) -> T {
        match self.current.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Claim the guard for a new request
    ///
    /// # Errors
    /// Returns `PaymentInFlight` while another request holds the guard
    pub fn acquire(&self) -> Result<InFlightToken> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.with_current(|current| {
            if let Some(active) = *current {
                debug!(
                    service = "tuition-sdk",
                    component = "inflight",
                    event = "acquire_rejected",
                    active_token = active,
                    "Payment already in progress"
                );
                return Err(TuitionError::PaymentInFlight);
            }
            *current = Some(id);
            Ok(InFlightToken(id))
        })
    }

    /// Check that `token` still owns the guard
    ///
    /// # Errors
    /// Returns `StaleRequest` if the guard was reset or re-acquired since
    pub fn ensure_current(&self, token: InFlightToken) -> Result<()> {
        self.with_current(|current| {
            if *current == Some(token.0) {
                Ok(())
            } else {
                Err(TuitionError::StaleRequest(token.0))
            }
        })
    }

    /// Release the guard held by `token`
    ///
    /// # Errors
    /// Returns `StaleRequest` and leaves the guard untouched if `token` is
    /// not the current holder
    pub fn release(&self, token: InFlightToken) -> Result<()> {
        self.with_current(|current| {
            if *current == Some(token.0) {
                *current = None;
                Ok(())
            } else {
                warn!(
                    service = "tuition-sdk",
                    component = "inflight",
                    event = "stale_release",
                    token = token.0,
                    active_token = ?*current,
                    "Ignoring release from a stale request"
                );
                Err(TuitionError::StaleRequest(token.0))
            }
        })
    }

    /// Drop whatever request holds the guard; its token becomes stale
    pub fn reset(&self) {
        self.with_current(|current| *current = None);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.with_current(|current| current.is_some())
    }
}
