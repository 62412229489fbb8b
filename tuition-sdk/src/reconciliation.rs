//! Payment reconciliation
//!
//! Marks installments or the upfront lump sum as paid on the application
//! document and decides whether a plan is fully paid.
//!
//! Completion is always re-derived from the persisted start date: the month
//! labels of the current schedule are regenerated and every one of them must
//! have a `paid` entry. Entries written under an earlier plan or start date
//! stay in the document but never match the new labels.
//!
//! When an application has no persisted start date, "today" is used instead,
//! so the expected labels move with the calendar until a plan is selected.

use crate::{
    application::ApplicationRecord,
    client::TuitionClient,
    error::{Result, TuitionError},
    fee_table::PaymentPlan,
    schedule::{build_schedule, month_key, InstallmentSchedule},
    store::Document,
    utils::minor_to_major,
    validation::validate_payment_amount,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Where an application is in its payment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum PaymentState {
    NoPlanSelected,
    PlanSelected { plan: PaymentPlan },
    PartiallyPaid { plan: PaymentPlan, paid: u32, total: u32 },
    FullyPaid { plan: PaymentPlan },
}

/// Result of choosing a payment plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSelection {
    pub schedule: InstallmentSchedule,
    /// Paid entries left over from an earlier plan or start date
    pub orphaned_payments: Vec<String>,
}

/// Date the schedule starts from: the persisted start date, else `today`
#[must_use]
pub fn schedule_start(record: &ApplicationRecord, today: NaiveDate) -> NaiveDate {
    record
        .payment_start_date
        .map_or(today, |start| start.date_naive())
}

/// Current installment schedule for a record and plan
pub fn schedule_for(
    record: &ApplicationRecord,
    plan: PaymentPlan,
    today: NaiveDate,
) -> Result<InstallmentSchedule> {
    build_schedule(record.subject_count(), plan, schedule_start(record, today))
}

/// Whether the month with this label has a paid entry
///
/// Labels are normalized before lookup, so `"march 2025 "` finds the entry
/// written for `"March 2025"`. Missing entries are simply unpaid.
#[must_use]
pub fn is_month_paid(record: &ApplicationRecord, month_label: &str) -> bool {
    record.payment_for(month_label).is_some_and(|p| p.paid)
}

/// Whether every installment of `plan` is paid on an already-fetched record
pub fn is_plan_satisfied(
    record: &ApplicationRecord,
    plan: PaymentPlan,
    today: NaiveDate,
) -> Result<bool> {
    if !plan.is_installment() {
        return Ok(record.tuition_paid);
    }
    if record.payments.is_empty() {
        return Ok(false);
    }
    let schedule = schedule_for(record, plan, today)?;
    Ok(schedule
        .installments
        .iter()
        .all(|i| is_month_paid(record, &i.month_label)))
}

/// Lifecycle state of a record's currently selected plan
pub fn payment_state(record: &ApplicationRecord, today: NaiveDate) -> Result<PaymentState> {
    let Some(plan) = record.payment_plan else {
        return Ok(PaymentState::NoPlanSelected);
    };

    if !plan.is_installment() {
        return Ok(if record.tuition_paid {
            PaymentState::FullyPaid { plan }
        } else {
            PaymentState::PlanSelected { plan }
        });
    }

    let schedule = schedule_for(record, plan, today)?;
    let total = plan.installment_count();
    let paid = schedule
        .installments
        .iter()
        .filter(|i| is_month_paid(record, &i.month_label))
        .count();
    let paid = u32::try_from(paid).unwrap_or(total);

    Ok(match paid {
        0 => PaymentState::PlanSelected { plan },
        n if n >= total => PaymentState::FullyPaid { plan },
        n => PaymentState::PartiallyPaid {
            plan,
            paid: n,
            total,
        },
    })
}

/// Paid entries whose keys are not part of `schedule`
#[must_use]
pub fn orphaned_payments(record: &ApplicationRecord, schedule: &InstallmentSchedule) -> Vec<String> {
    let keys = schedule.month_keys();
    record
        .payments
        .iter()
        .filter(|(key, entry)| entry.paid && !keys.contains(key))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Records payments and answers completion questions for applications
#[derive(Debug, Clone)]
pub struct Reconciler {
    client: TuitionClient,
}

impl Reconciler {
    #[must_use]
    pub const fn new(client: TuitionClient) -> Self {
        Self { client }
    }

    /// Get the underlying client
    #[must_use]
    pub const fn client(&self) -> &TuitionClient {
        &self.client
    }

    fn now(&self) -> DateTime<Utc> {
        self.client.clock().now()
    }

    /// Choose (or re-choose) a payment plan
    ///
    /// Persists the plan and its start date (`today` when not given) so the
    /// schedule's month labels stay fixed from here on. Re-selecting
    /// overwrites both; any paid entries from the previous schedule are left
    /// in place and reported as orphaned.
    ///
    /// # Errors
    /// Returns `ApplicationNotFound` or a store error
    pub async fn select_plan(
        &self,
        application_id: &str,
        plan: PaymentPlan,
        start_date: Option<NaiveDate>,
    ) -> Result<PlanSelection> {
        let now = self.now();
        let start = start_date.unwrap_or_else(|| now.date_naive());
        let start_at = start
            .and_hms_opt(0, 0, 0)
            .map_or(now, |midnight| midnight.and_utc());

        let (_, before) = self.client.require_application(application_id).await?;
        let schedule = build_schedule(before.subject_count(), plan, start)?;

        let touch = self.client.touch();
        let version = self
            .client
            .update_with(application_id, "select_plan", |_| {
                let mut patch = Document::new();
                patch.insert("paymentPlan".to_string(), json!(plan));
                patch.insert("paymentStartDate".to_string(), json!(start_at));
                patch.insert(touch.0.clone(), touch.1.clone());
                Ok(Some(patch))
            })
            .await?;

        let (_, after) = self.client.require_application(application_id).await?;
        let orphaned = orphaned_payments(&after, &schedule);
        if !orphaned.is_empty() {
            warn!(
                service = "tuition-sdk",
                component = "reconciliation",
                event = "payments_orphaned",
                application_id = application_id,
                plan = %plan,
                orphaned = ?orphaned,
                "Plan change leaves paid months outside the new schedule"
            );
        }

        info!(
            service = "tuition-sdk",
            component = "reconciliation",
            event = "plan_selected",
            application_id = application_id,
            plan = %plan,
            start_date = %start,
            installments = schedule.installments.len(),
            version = version,
            "Payment plan selected"
        );

        Ok(PlanSelection {
            schedule,
            orphaned_payments: orphaned,
        })
    }

    /// Record a successful payment
    ///
    /// For the upfront plan this sets `paymentPlan`, `tuitionAmount` (in
    /// rands), `tuitionPaid` and `paymentStartDate`, and needs no month label.
    /// For installment plans it writes `payments.<monthKey>`. The month is not
    /// checked against the active schedule; recording the same month twice
    /// overwrites the same entry.
    ///
    /// # Errors
    /// Returns `MissingMonthLabel` for an installment plan without a month,
    /// `ApplicationNotFound`, or a store error once retries are exhausted
    pub async fn record_payment(
        &self,
        application_id: &str,
        plan: PaymentPlan,
        month_label: Option<&str>,
        amount_minor_units: u64,
        reference: &str,
    ) -> Result<()> {
        validate_payment_amount(amount_minor_units)?;
        let now = self.now();
        let touch = self.client.touch();

        if !plan.is_installment() {
            let mut patch = Document::new();
            patch.insert("paymentPlan".to_string(), json!(plan));
            patch.insert(
                "tuitionAmount".to_string(),
                json!(minor_to_major(amount_minor_units)),
            );
            patch.insert("tuitionPaid".to_string(), Value::Bool(true));
            patch.insert("paymentStartDate".to_string(), json!(now));
            patch.insert(touch.0, touch.1);

            let version = self
                .client
                .update_with(application_id, "record_upfront", |_| Ok(Some(patch.clone())))
                .await?;
            info!(
                service = "tuition-sdk",
                component = "reconciliation",
                event = "upfront_payment_recorded",
                application_id = application_id,
                amount_minor_units = amount_minor_units,
                reference = reference,
                version = version,
                "Upfront tuition payment recorded"
            );
            return Ok(());
        }

        let Some(label) = month_label.filter(|l| !l.trim().is_empty()) else {
            error!(
                service = "tuition-sdk",
                component = "reconciliation",
                event = "missing_month_label",
                application_id = application_id,
                plan = %plan,
                "Installment payment recorded without a month label"
            );
            return Err(TuitionError::MissingMonthLabel);
        };
        let key = month_key(label);
        let today = now.date_naive();

        let version = self
            .client
            .update_with(application_id, "record_installment", |record| {
                let in_schedule = schedule_for(record, plan, today)?
                    .month_keys()
                    .contains(&key);
                if !in_schedule {
                    warn!(
                        service = "tuition-sdk",
                        component = "reconciliation",
                        event = "month_outside_schedule",
                        application_id = application_id,
                        month_key = %key,
                        "Recording a month that is not in the current schedule"
                    );
                }

                let mut payments = Document::new();
                payments.insert(
                    key.clone(),
                    json!({
                        "amountMinorUnits": amount_minor_units,
                        "paid": true,
                        "paidAt": now,
                        "reference": reference,
                    }),
                );
                let mut patch = Document::new();
                patch.insert("payments".to_string(), Value::Object(payments));
                patch.insert(touch.0.clone(), touch.1.clone());
                Ok(Some(patch))
            })
            .await?;

        info!(
            service = "tuition-sdk",
            component = "reconciliation",
            event = "installment_recorded",
            application_id = application_id,
            plan = %plan,
            month_key = %key,
            amount_minor_units = amount_minor_units,
            reference = reference,
            version = version,
            "Installment payment recorded"
        );
        Ok(())
    }

    /// Whether every installment of `plan` has been paid
    ///
    /// # Errors
    /// Returns `ApplicationNotFound` or a store error
    pub async fn is_plan_complete(&self, application_id: &str, plan: PaymentPlan) -> Result<bool> {
        let (_, record) = self.client.require_application(application_id).await?;
        is_plan_satisfied(&record, plan, self.now().date_naive())
    }

    /// Schedule for the application's selected plan, `None` if no plan is chosen
    ///
    /// # Errors
    /// Returns `ApplicationNotFound` or a store error
    pub async fn current_schedule(
        &self,
        application_id: &str,
    ) -> Result<Option<InstallmentSchedule>> {
        let (_, record) = self.client.require_application(application_id).await?;
        record
            .payment_plan
            .map(|plan| schedule_for(&record, plan, self.now().date_naive()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::PaymentEntry,
        clock::{Clock, FixedClock},
        retry::RetryPolicy,
        store::{DocumentStore, InMemoryStore},
    };
    use chrono::TimeZone;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn paid(amount: u64) -> PaymentEntry {
        PaymentEntry {
            amount_minor_units: amount,
            paid: true,
            paid_at: Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap(),
            reference: "TUI-test".to_string(),
        }
    }

    fn record_with_subjects(count: usize) -> ApplicationRecord {
        let subjects = ["Mathematics", "English", "History", "Geography", "Accounting"];
        ApplicationRecord {
            selected_subjects: subjects
                .iter()
                .take(count)
                .map(|s| (*s).to_string())
                .collect(),
            ..ApplicationRecord::default()
        }
    }

    async fn setup(subjects: usize) -> (Arc<InMemoryStore>, Arc<FixedClock>, Reconciler) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
        ));
        let client = TuitionClient::new(store.clone())
            .with_clock(clock.clone())
            .with_retry_policy(RetryPolicy::none());
        store
            .set_merge("app-1", record_with_subjects(subjects).to_document().unwrap())
            .await
            .unwrap();
        (store, clock, Reconciler::new(client))
    }

    #[test]
    fn test_is_month_paid_is_pure_and_normalizing() {
        let mut record = ApplicationRecord::default();
        assert!(!is_month_paid(&record, "March 2025"));

        record.payments.insert("march_2025".to_string(), paid(38_334));
        assert!(is_month_paid(&record, "March 2025"));
        assert!(is_month_paid(&record, "march 2025 "));
        assert!(!is_month_paid(&record, "April 2025"));

        let mut unpaid = paid(38_334);
        unpaid.paid = false;
        record.payments.insert("april_2025".to_string(), unpaid);
        assert!(!is_month_paid(&record, "April 2025"));
    }

    #[test]
    fn test_plan_not_satisfied_without_payments() {
        let record = record_with_subjects(2);
        for plan in PaymentPlan::ALL {
            assert!(!is_plan_satisfied(&record, plan, date(2025, 3, 1)).unwrap());
        }
    }

    #[test]
    fn test_payment_state_progression() {
        let mut record = record_with_subjects(2);
        let today = date(2025, 3, 1);
        assert_eq!(
            payment_state(&record, today).unwrap(),
            PaymentState::NoPlanSelected
        );

        record.payment_plan = Some(PaymentPlan::SixMonths);
        record.payment_start_date = Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(
            payment_state(&record, today).unwrap(),
            PaymentState::PlanSelected {
                plan: PaymentPlan::SixMonths
            }
        );

        record.payments.insert("march_2025".to_string(), paid(38_334));
        record.payments.insert("april_2025".to_string(), paid(38_334));
        assert_eq!(
            payment_state(&record, today).unwrap(),
            PaymentState::PartiallyPaid {
                plan: PaymentPlan::SixMonths,
                paid: 2,
                total: 6
            }
        );

        for month in ["may_2025", "june_2025", "july_2025", "august_2025"] {
            record.payments.insert(month.to_string(), paid(38_334));
        }
        assert_eq!(
            payment_state(&record, today).unwrap(),
            PaymentState::FullyPaid {
                plan: PaymentPlan::SixMonths
            }
        );
    }

    #[test]
    fn test_schedule_start_falls_back_to_today() {
        let record = ApplicationRecord::default();
        assert_eq!(schedule_start(&record, date(2025, 6, 3)), date(2025, 6, 3));
    }

    #[tokio::test]
    async fn test_upfront_payment_sets_top_level_fields() {
        let (store, clock, reconciler) = setup(1).await;

        reconciler
            .record_payment("app-1", PaymentPlan::Upfront, None, 110_000, "TUI-1")
            .await
            .unwrap();

        let doc = store.get("app-1").await.unwrap().unwrap();
        assert_eq!(doc.data["paymentPlan"], "upfront");
        assert_eq!(doc.data["tuitionPaid"], true);
        assert_eq!(doc.data["tuitionAmount"], 1100.0);
        assert_eq!(doc.data["paymentStartDate"], json!(clock.now()));
        assert!(doc.data.get("payments").map_or(true, |p| p
            .as_object()
            .is_some_and(serde_json::Map::is_empty)));
        assert!(reconciler
            .is_plan_complete("app-1", PaymentPlan::Upfront)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_installment_without_month_is_an_error() {
        let (store, _, reconciler) = setup(2).await;
        let writes_before = store.write_calls.load(std::sync::atomic::Ordering::Relaxed);

        let err = reconciler
            .record_payment("app-1", PaymentPlan::SixMonths, None, 38_334, "TUI-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TuitionError::MissingMonthLabel));

        let err = reconciler
            .record_payment("app-1", PaymentPlan::SixMonths, Some("  "), 38_334, "TUI-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TuitionError::MissingMonthLabel));
        assert_eq!(
            store.write_calls.load(std::sync::atomic::Ordering::Relaxed),
            writes_before
        );
    }

    #[tokio::test]
    async fn test_recorded_month_reads_back_under_label_variants() {
        let (_, _, reconciler) = setup(2).await;
        reconciler
            .select_plan("app-1", PaymentPlan::SixMonths, Some(date(2025, 3, 1)))
            .await
            .unwrap();
        reconciler
            .record_payment(
                "app-1",
                PaymentPlan::SixMonths,
                Some("March 2025"),
                38_334,
                "TUI-1",
            )
            .await
            .unwrap();

        let (_, record) = reconciler.client().require_application("app-1").await.unwrap();
        assert!(is_month_paid(&record, "march 2025 "));
        assert!(is_month_paid(&record, "MARCH 2025"));
        let entry = &record.payments["march_2025"];
        assert_eq!(entry.amount_minor_units, 38_334);
        assert_eq!(entry.reference, "TUI-1");
    }

    #[tokio::test]
    async fn test_recording_twice_overwrites_one_entry() {
        let (_, _, reconciler) = setup(2).await;
        for _ in 0..2 {
            reconciler
                .record_payment(
                    "app-1",
                    PaymentPlan::SixMonths,
                    Some("March 2025"),
                    38_334,
                    "TUI-1",
                )
                .await
                .unwrap();
        }
        let (_, record) = reconciler.client().require_application("app-1").await.unwrap();
        assert_eq!(record.payments.len(), 1);
    }

    #[tokio::test]
    async fn test_months_outside_schedule_are_still_recorded() {
        let (_, _, reconciler) = setup(2).await;
        reconciler
            .select_plan("app-1", PaymentPlan::SixMonths, Some(date(2025, 3, 1)))
            .await
            .unwrap();
        reconciler
            .record_payment(
                "app-1",
                PaymentPlan::SixMonths,
                Some("December 2031"),
                38_334,
                "TUI-1",
            )
            .await
            .unwrap();

        let (_, record) = reconciler.client().require_application("app-1").await.unwrap();
        assert!(is_month_paid(&record, "December 2031"));
        assert!(!reconciler
            .is_plan_complete("app-1", PaymentPlan::SixMonths)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_plan_complete_only_when_every_month_paid() {
        let (_, _, reconciler) = setup(2).await;
        let selection = reconciler
            .select_plan("app-1", PaymentPlan::SixMonths, Some(date(2025, 3, 1)))
            .await
            .unwrap();

        let labels: Vec<String> = selection
            .schedule
            .installments
            .iter()
            .map(|i| i.month_label.clone())
            .collect();
        for (n, label) in labels.iter().enumerate() {
            assert!(!reconciler
                .is_plan_complete("app-1", PaymentPlan::SixMonths)
                .await
                .unwrap());
            reconciler
                .record_payment(
                    "app-1",
                    PaymentPlan::SixMonths,
                    Some(label),
                    38_334,
                    &format!("TUI-{n}"),
                )
                .await
                .unwrap();
        }
        assert!(reconciler
            .is_plan_complete("app-1", PaymentPlan::SixMonths)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_switching_plan_orphans_previous_payments() {
        let (_, _, reconciler) = setup(2).await;
        reconciler
            .select_plan("app-1", PaymentPlan::SixMonths, Some(date(2025, 3, 1)))
            .await
            .unwrap();
        for label in ["March 2025", "April 2025"] {
            reconciler
                .record_payment("app-1", PaymentPlan::SixMonths, Some(label), 38_334, "TUI")
                .await
                .unwrap();
        }

        let selection = reconciler
            .select_plan("app-1", PaymentPlan::TenMonths, Some(date(2026, 1, 1)))
            .await
            .unwrap();
        assert_eq!(
            selection.orphaned_payments,
            vec!["april_2025".to_string(), "march_2025".to_string()]
        );
        assert!(!reconciler
            .is_plan_complete("app-1", PaymentPlan::TenMonths)
            .await
            .unwrap());

        // Old entries stay in storage
        let (_, record) = reconciler.client().require_application("app-1").await.unwrap();
        assert!(is_month_paid(&record, "March 2025"));
        assert_eq!(record.payment_plan, Some(PaymentPlan::TenMonths));
    }

    #[tokio::test]
    async fn test_select_plan_defaults_start_to_today() {
        let (_, clock, reconciler) = setup(3).await;
        let selection = reconciler
            .select_plan("app-1", PaymentPlan::TenMonths, None)
            .await
            .unwrap();
        assert_eq!(selection.schedule.start_date, clock.today());
        assert_eq!(selection.schedule.installments[0].month_label, "March 2025");

        // Later calls keep using the persisted start date
        clock.set(Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap());
        let schedule = reconciler.current_schedule("app-1").await.unwrap().unwrap();
        assert_eq!(schedule.installments[0].month_label, "March 2025");
    }

    #[tokio::test]
    async fn test_unpersisted_start_date_drifts_with_clock() {
        let (store, clock, reconciler) = setup(2).await;
        store
            .set_merge(
                "app-1",
                json!({ "paymentPlan": "sixMonths" }).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();

        let march = reconciler.current_schedule("app-1").await.unwrap().unwrap();
        clock.set(Utc.with_ymd_and_hms(2025, 4, 10, 12, 0, 0).unwrap());
        let april = reconciler.current_schedule("app-1").await.unwrap().unwrap();

        assert_eq!(march.installments[0].month_label, "March 2025");
        assert_eq!(april.installments[0].month_label, "April 2025");
    }

    #[tokio::test]
    async fn test_missing_application() {
        let (_, _, reconciler) = setup(1).await;
        let err = reconciler
            .is_plan_complete("nope", PaymentPlan::Upfront)
            .await
            .unwrap_err();
        assert!(matches!(err, TuitionError::ApplicationNotFound(_)));
    }

    #[tokio::test]
    async fn test_upfront_payment_for_unknown_application_writes_nothing() {
        let (store, _, reconciler) = setup(1).await;
        let err = reconciler
            .record_payment("typo-id", PaymentPlan::Upfront, None, 110_000, "TUI-typo")
            .await
            .unwrap_err();

        assert!(matches!(err, TuitionError::ApplicationNotFound(_)));
        assert!(store.get("typo-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_date_only_start_date_is_readable() {
        let (store, _, reconciler) = setup(2).await;
        let mut patch = Document::new();
        patch.insert("paymentPlan".to_string(), json!("sixMonths"));
        patch.insert("paymentStartDate".to_string(), json!("2025-03-01"));
        store.set_merge("app-1", patch).await.unwrap();

        assert!(!reconciler
            .is_plan_complete("app-1", PaymentPlan::SixMonths)
            .await
            .unwrap());
        let schedule = reconciler.current_schedule("app-1").await.unwrap().unwrap();
        assert_eq!(schedule.installments[0].month_label, "March 2025");
    }
}
