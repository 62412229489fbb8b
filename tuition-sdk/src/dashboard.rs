//! Parent and student dashboard
//!
//! Turns an application document into what the dashboard shows: the plan,
//! each installment with its paid flag, totals paid and outstanding, and the
//! next month due. Summaries can also be followed live as the document
//! changes.

use crate::{
    application::{ApplicationRecord, ApplicationStatus},
    error::Result,
    fee_table::{fee_for, PaymentPlan},
    reconciliation::{payment_state, schedule_for, PaymentState, Reconciler},
    schedule::{build_schedule, installment_amount},
    store::VersionedDocument,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Label used for the single upfront line
pub const UPFRONT_LABEL: &str = "Upfront";

/// One row of the payment schedule as shown to the family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleLine {
    pub month_label: String,
    pub amount_minor_units: u64,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub reference: Option<String>,
}

/// Dashboard view of one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub application_id: String,
    pub student_name: String,
    pub status: ApplicationStatus,
    pub subject_count: usize,
    pub plan: Option<PaymentPlan>,
    pub state: PaymentState,
    pub lines: Vec<ScheduleLine>,
    pub paid_minor_units: u64,
    pub outstanding_minor_units: u64,
    pub next_due: Option<ScheduleLine>,
}

impl ApplicationSummary {
    /// Sum of every line, including the rounding excess on installments
    #[must_use]
    pub fn total_minor_units(&self) -> u64 {
        self.paid_minor_units
            .saturating_add(self.outstanding_minor_units)
    }
}

/// One plan as offered on the plan selection screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOption {
    pub plan: PaymentPlan,
    pub total_fee_minor_units: u64,
    pub installment_count: u32,
    pub installment_minor_units: u64,
}

/// Plans and prices for a subject count
#[must_use]
pub fn plan_options(subject_count: i64) -> Vec<PlanOption> {
    PaymentPlan::ALL
        .iter()
        .map(|&plan| {
            let total = fee_for(subject_count, plan);
            PlanOption {
                plan,
                total_fee_minor_units: total,
                installment_count: plan.installment_count(),
                installment_minor_units: installment_amount(total, plan.installment_count()),
            }
        })
        .collect()
}

/// Build the dashboard summary for a record
///
/// Without a selected plan the summary has no lines and nothing outstanding.
pub fn summarize(
    application_id: &str,
    record: &ApplicationRecord,
    today: NaiveDate,
) -> Result<ApplicationSummary> {
    let lines = match record.payment_plan {
        None => Vec::new(),
        Some(PaymentPlan::Upfront) => {
            let amount = fee_for(record.subject_count(), PaymentPlan::Upfront);
            vec![ScheduleLine {
                month_label: UPFRONT_LABEL.to_string(),
                amount_minor_units: amount,
                paid: record.tuition_paid,
                paid_at: record
                    .tuition_paid
                    .then_some(record.payment_start_date)
                    .flatten(),
                reference: None,
            }]
        }
        Some(plan) => schedule_for(record, plan, today)?
            .installments
            .into_iter()
            .map(|installment| {
                let entry = record
                    .payment_for(&installment.month_label)
                    .filter(|p| p.paid);
                ScheduleLine {
                    paid: entry.is_some(),
                    paid_at: entry.map(|p| p.paid_at),
                    reference: entry.map(|p| p.reference.clone()),
                    month_label: installment.month_label,
                    amount_minor_units: installment.amount_minor_units,
                }
            })
            .collect(),
    };

    let (paid, outstanding) = lines.iter().fold((0u64, 0u64), |(paid, owed), line| {
        if line.paid {
            (paid.saturating_add(line.amount_minor_units), owed)
        } else {
            (paid, owed.saturating_add(line.amount_minor_units))
        }
    });
    let next_due = lines.iter().find(|line| !line.paid).cloned();

    Ok(ApplicationSummary {
        application_id: application_id.to_string(),
        student_name: record.student_name.clone(),
        status: record.status,
        subject_count: record.selected_subjects.len(),
        plan: record.payment_plan,
        state: payment_state(record, today)?,
        lines,
        paid_minor_units: paid,
        outstanding_minor_units: outstanding,
        next_due,
    })
}

/// Dashboard operations for one family
#[derive(Debug, Clone)]
pub struct DashboardClient {
    reconciler: Reconciler,
}

impl DashboardClient {
    #[must_use]
    pub const fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Current summary for an application
    ///
    /// # Errors
    /// Returns `ApplicationNotFound` or a store error
    pub async fn summary(&self, application_id: &str) -> Result<ApplicationSummary> {
        let client = self.reconciler.client();
        let (_, record) = client.require_application(application_id).await?;
        summarize(application_id, &record, client.clock().today())
    }

    /// Plans available to this application, priced by its subject count
    ///
    /// # Errors
    /// Returns `ApplicationNotFound` or a store error
    pub async fn plan_options(&self, application_id: &str) -> Result<Vec<PlanOption>> {
        let (_, record) = self
            .reconciler
            .client()
            .require_application(application_id)
            .await?;
        Ok(plan_options(record.subject_count()))
    }

    /// Preview the schedule a plan would produce if selected today
    ///
    /// # Errors
    /// Returns `ApplicationNotFound` or a store error
    pub async fn preview_schedule(
        &self,
        application_id: &str,
        plan: PaymentPlan,
    ) -> Result<Vec<ScheduleLine>> {
        let client = self.reconciler.client();
        let (_, record) = client.require_application(application_id).await?;
        let schedule = build_schedule(record.subject_count(), plan, client.clock().today())?;
        Ok(schedule
            .installments
            .into_iter()
            .map(|i| ScheduleLine {
                month_label: i.month_label,
                amount_minor_units: i.amount_minor_units,
                paid: false,
                paid_at: None,
                reference: None,
            })
            .collect())
    }

    /// Follow an application's summary as its document changes
    #[must_use]
    pub fn watch(&self, application_id: &str) -> SummaryWatcher {
        SummaryWatcher {
            application_id: application_id.to_string(),
            receiver: self.reconciler.client().watch(application_id),
            reconciler: self.reconciler.clone(),
        }
    }
}

/// Live summaries for one application
#[derive(Debug)]
pub struct SummaryWatcher {
    application_id: String,
    receiver: broadcast::Receiver<VersionedDocument>,
    reconciler: Reconciler,
}

impl SummaryWatcher {
    /// Wait for the next write and summarize it
    ///
    /// Returns `None` once the store is dropped. If the watcher fell behind,
    /// skipped updates are ignored and the next one is returned.
    pub async fn next(&mut self) -> Option<Result<ApplicationSummary>> {
        loop {
            match self.receiver.recv().await {
                Ok(document) => {
                    debug!(
                        service = "tuition-sdk",
                        component = "dashboard",
                        event = "summary_update",
                        application_id = %self.application_id,
                        version = document.version,
                        "Application document changed"
                    );
                    let today = self.reconciler.client().clock().today();
                    return Some(
                        ApplicationRecord::from_document(&document.data)
                            .and_then(|record| summarize(&self.application_id, &record, today)),
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        service = "tuition-sdk",
                        component = "dashboard",
                        event = "summary_lagged",
                        application_id = %self.application_id,
                        skipped = skipped,
                        "Dashboard watcher fell behind"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
