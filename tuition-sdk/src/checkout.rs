//! Checkout flow: charge, verify, record
//!
//! A [`CheckoutSession`] drives one payment at a time through a
//! [`PaymentGateway`], checks the returned reference with a
//! [`PaymentVerifier`], and hands the result to the [`Reconciler`].
//! Cancelling in the gateway writes nothing. A gateway result that arrives
//! after the session was abandoned is discarded.

use crate::{
    error::{Result, TuitionError},
    fee_table::{fee_for, PaymentPlan},
    inflight::{InFlightGuard, InFlightToken},
    reconciliation::{is_month_paid, schedule_for, Reconciler},
    schedule::month_key,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Currency charged by the gateways
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "ZAR")]
    Zar,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zar => f.write_str("ZAR"),
        }
    }
}

/// Supported payment providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Paystack,
    PayFast,
}

impl GatewayKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paystack => "paystack",
            Self::PayFast => "payfast",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Charge sent to a payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    pub amount_minor_units: u64,
    pub currency: Currency,
    pub reference: String,
    pub email: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Success,
    Declined,
}

/// What the gateway reported for a completed charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub status: ChargeStatus,
    pub reference: String,
    pub message: Option<String>,
}

/// A hosted payment provider
///
/// `charge` resolves once the user finishes in the provider's UI. Closing
/// the UI without paying is reported as `Err(TuitionError::PaymentCancelled)`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    async fn charge(&self, request: ChargeRequest) -> Result<GatewayResponse>;
}

/// Confirms a gateway reference before it is recorded
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, reference: &str) -> Result<bool>;
}

/// Accepts every non-empty reference without contacting the provider
///
/// Stand-in until server-side verification exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptingVerifier;

#[async_trait]
impl PaymentVerifier for AcceptingVerifier {
    async fn verify(&self, reference: &str) -> Result<bool> {
        Ok(!reference.trim().is_empty())
    }
}

/// Build a payment reference: `TUI-<applicationId>-<monthKey|upfront>-<unix millis>`
#[must_use]
pub fn payment_reference(
    application_id: &str,
    month_key: Option<&str>,
    at: DateTime<Utc>,
) -> String {
    format!(
        "TUI-{application_id}-{}-{}",
        month_key.unwrap_or("upfront"),
        at.timestamp_millis()
    )
}

/// Result of [`CheckoutSession::pay`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Paid {
        reference: String,
        amount_minor_units: u64,
        month_label: Option<String>,
        plan_complete: bool,
    },
    /// User closed the gateway; nothing was written
    Cancelled,
    /// The requested month, or the whole plan, is already paid
    AlreadyPaid,
}

/// What a single checkout will charge for
struct ChargeTarget {
    plan: PaymentPlan,
    month_label: Option<String>,
    amount_minor_units: u64,
    email: String,
}

/// Payment flow for one user session
pub struct CheckoutSession {
    reconciler: Reconciler,
    gateway: Arc<dyn PaymentGateway>,
    verifier: Arc<dyn PaymentVerifier>,
    guard: Arc<InFlightGuard>,
}

impl fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("gateway", &self.gateway.kind())
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl CheckoutSession {
    #[must_use]
    pub fn new(
        reconciler: Reconciler,
        gateway: Arc<dyn PaymentGateway>,
        verifier: Arc<dyn PaymentVerifier>,
    ) -> Self {
        Self {
            reconciler,
            gateway,
            verifier,
            guard: Arc::new(InFlightGuard::new()),
        }
    }

    /// Share an existing guard, e.g. one guard per browser tab
    #[must_use]
    pub fn with_guard(mut self, guard: Arc<InFlightGuard>) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub const fn guard(&self) -> &Arc<InFlightGuard> {
        &self.guard
    }

    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Abandon the current payment; a late gateway result will be discarded
    pub fn abandon(&self) {
        if self.guard.is_active() {
            warn!(
                service = "tuition-sdk",
                component = "checkout",
                event = "checkout_abandoned",
                gateway = %self.gateway.kind(),
                "Abandoning in-flight payment"
            );
        }
        self.guard.reset();
    }

    /// Pay for the application's selected plan
    ///
    /// For installment plans `month_label` picks the month; without one the
    /// earliest unpaid month of the schedule is charged.
    ///
    /// # Errors
    /// Returns `PaymentInFlight` if a payment is already running,
    /// `PaymentDeclined` or `VerificationFailed` from the gateway flow,
    /// `StaleRequest` if the session was abandoned mid-payment, or a
    /// validation or store error
    pub async fn pay(
        &self,
        application_id: &str,
        month_label: Option<&str>,
    ) -> Result<CheckoutOutcome> {
        let token = self.guard.acquire()?;
        let result = self.run(token, application_id, month_label).await;
        if !matches!(result, Err(TuitionError::StaleRequest(_))) {
            // Stale means someone else already moved the guard on
            let _ = self.guard.release(token);
        }
        result
    }

    async fn resolve_target(
        &self,
        application_id: &str,
        month_label: Option<&str>,
    ) -> Result<Option<ChargeTarget>> {
        let client = self.reconciler.client();
        let (_, record) = client.require_application(application_id).await?;
        let Some(plan) = record.payment_plan else {
            return Err(TuitionError::Validation(
                "Select a payment plan before paying".to_string(),
            ));
        };

        if !plan.is_installment() {
            if record.tuition_paid {
                return Ok(None);
            }
            return Ok(Some(ChargeTarget {
                plan,
                month_label: None,
                amount_minor_units: fee_for(record.subject_count(), plan),
                email: record.email,
            }));
        }

        let schedule = schedule_for(&record, plan, client.clock().today())?;
        let installment = match month_label {
            Some(label) => schedule.find(label).ok_or_else(|| {
                TuitionError::Validation(format!(
                    "'{}' is not part of the {plan} schedule",
                    label.trim()
                ))
            })?,
            None => match schedule
                .installments
                .iter()
                .find(|i| !is_month_paid(&record, &i.month_label))
            {
                Some(next) => next,
                None => return Ok(None),
            },
        };
        if is_month_paid(&record, &installment.month_label) {
            return Ok(None);
        }

        Ok(Some(ChargeTarget {
            plan,
            month_label: Some(installment.month_label.clone()),
            amount_minor_units: installment.amount_minor_units,
            email: record.email,
        }))
    }

    async fn run(
        &self,
        token: InFlightToken,
        application_id: &str,
        month_label: Option<&str>,
    ) -> Result<CheckoutOutcome> {
        let Some(target) = self.resolve_target(application_id, month_label).await? else {
            info!(
                service = "tuition-sdk",
                component = "checkout",
                event = "already_paid",
                application_id = application_id,
                "Nothing left to pay"
            );
            return Ok(CheckoutOutcome::AlreadyPaid);
        };

        let key = target.month_label.as_deref().map(month_key);
        let reference = payment_reference(
            application_id,
            key.as_deref(),
            self.reconciler.client().clock().now(),
        );
        let gateway = self.gateway.kind();

        let mut metadata = BTreeMap::new();
        metadata.insert("applicationId".to_string(), application_id.to_string());
        metadata.insert("paymentPlan".to_string(), target.plan.to_string());
        metadata.insert("gateway".to_string(), gateway.to_string());
        if let Some(label) = &target.month_label {
            metadata.insert("month".to_string(), label.clone());
        }

        let request = ChargeRequest {
            amount_minor_units: target.amount_minor_units,
            currency: Currency::Zar,
            reference: reference.clone(),
            email: target.email.clone(),
            metadata,
        };

        info!(
            service = "tuition-sdk",
            component = "checkout",
            event = "charge_started",
            application_id = application_id,
            gateway = %gateway,
            reference = %reference,
            amount_minor_units = target.amount_minor_units,
            token = token.id(),
            "Opening payment gateway"
        );

        let response = match self.gateway.charge(request).await {
            Ok(response) => response,
            Err(TuitionError::PaymentCancelled) => {
                warn!(
                    service = "tuition-sdk",
                    component = "checkout",
                    event = "payment_cancelled",
                    application_id = application_id,
                    gateway = %gateway,
                    reference = %reference,
                    "Payment cancelled by user"
                );
                return Ok(CheckoutOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };
        self.guard.ensure_current(token)?;

        if response.status == ChargeStatus::Declined {
            warn!(
                service = "tuition-sdk",
                component = "checkout",
                event = "payment_declined",
                application_id = application_id,
                gateway = %gateway,
                reference = %response.reference,
                "Gateway declined the charge"
            );
            return Err(TuitionError::PaymentDeclined(
                response.message.unwrap_or(response.reference),
            ));
        }

        if !self.verifier.verify(&response.reference).await? {
            error!(
                service = "tuition-sdk",
                component = "checkout",
                event = "verification_failed",
                application_id = application_id,
                gateway = %gateway,
                reference = %response.reference,
                "Payment reference could not be verified"
            );
            return Err(TuitionError::VerificationFailed(response.reference));
        }
        self.guard.ensure_current(token)?;

        self.reconciler
            .record_payment(
                application_id,
                target.plan,
                target.month_label.as_deref(),
                target.amount_minor_units,
                &response.reference,
            )
            .await?;
        let plan_complete = self
            .reconciler
            .is_plan_complete(application_id, target.plan)
            .await?;

        info!(
            service = "tuition-sdk",
            component = "checkout",
            event = "payment_completed",
            application_id = application_id,
            gateway = %gateway,
            reference = %response.reference,
            plan_complete = plan_complete,
            "Payment recorded"
        );

        Ok(CheckoutOutcome::Paid {
            reference: response.reference,
            amount_minor_units: target.amount_minor_units,
            month_label: target.month_label,
            plan_complete,
        })
    }
}
