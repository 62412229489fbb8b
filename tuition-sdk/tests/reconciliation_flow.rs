//! End-to-end payment flows against the in-memory and file-backed stores
//!
//! Covers:
//! - Fee clamping and the ceiling-rounding bound for every plan
//! - Upfront and six-month flows from submission to completion
//! - Month label normalization when reading payments back
//! - Plan switching after a partial payment
//! - Concurrent installment recording under compare-and-swap

use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tuition_sdk::{
    build_schedule, fee_for, is_month_paid, ApplicationForm, Clock, DocumentStore, FixedClock,
    InMemoryStore, JsonFileStore, PaymentPlan, PaymentState, Reconciler, RetryPolicy,
    TuitionClient, TuitionError,
};

struct Fixture {
    store: Arc<InMemoryStore>,
    clock: Arc<FixedClock>,
    reconciler: Reconciler,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
        ));
        let client = TuitionClient::new(store.clone())
            .with_clock(clock.clone())
            .with_retry_policy(RetryPolicy::none());
        Self {
            store,
            clock,
            reconciler: Reconciler::new(client),
        }
    }

    async fn submit(&self, id: &str, subjects: &[&str]) {
        let form = ApplicationForm {
            student_name: "Naledi Khumalo".to_string(),
            email: "family@example.co.za".to_string(),
            grade: Some("12".to_string()),
            subjects: subjects.iter().map(|s| (*s).to_string()).collect(),
            consent_accepted: true,
            rules_accepted: true,
            pledge_accepted: true,
        };
        self.reconciler
            .client()
            .submit_application(id, &form)
            .await
            .unwrap();
    }
}

fn march_first() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, 3, 1)
}

#[test]
fn test_fee_lookup_clamps_subject_count() {
    let expected = [
        (0, [110_000, 120_000, 130_000]),
        (1, [110_000, 120_000, 130_000]),
        (2, [210_000, 230_000, 250_000]),
        (3, [300_000, 330_000, 360_000]),
        (4, [380_000, 420_000, 460_000]),
        (5, [380_000, 420_000, 460_000]),
        (100, [380_000, 420_000, 460_000]),
    ];
    for (count, fees) in expected {
        for (plan, fee) in PaymentPlan::ALL.into_iter().zip(fees) {
            assert_eq!(fee_for(count, plan), fee, "{count} subjects, {plan}");
        }
    }
}

#[test]
fn test_schedules_never_undercollect() {
    let start = march_first().unwrap();
    for count in 1..=4 {
        for plan in PaymentPlan::ALL {
            let schedule = build_schedule(count, plan, start).unwrap();
            let fee = fee_for(count, plan);
            assert!(schedule.total_minor_units() >= fee);
            assert!(schedule.overcollection_minor_units() < u64::from(plan.installment_count()));
            assert_eq!(schedule, build_schedule(count, plan, start).unwrap());
        }
    }
}

#[tokio::test]
async fn test_upfront_single_subject_flow() {
    let f = Fixture::new();
    f.submit("app-1", &["Mathematics"]).await;
    assert_eq!(fee_for(1, PaymentPlan::Upfront), 110_000);

    f.reconciler
        .record_payment("app-1", PaymentPlan::Upfront, None, 110_000, "TUI-app-1-upfront-1")
        .await
        .unwrap();

    let (_, record) = f.reconciler.client().require_application("app-1").await.unwrap();
    assert!(record.tuition_paid);
    assert_eq!(record.payment_plan, Some(PaymentPlan::Upfront));
    assert_eq!(record.tuition_amount, Some(1100.0));
    assert_eq!(record.payment_start_date, Some(f.clock.now()));
    assert!(record.payments.is_empty());
    assert!(f
        .reconciler
        .is_plan_complete("app-1", PaymentPlan::Upfront)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_six_month_flow_overcollects_four_cents() {
    let f = Fixture::new();
    f.submit("app-2", &["Mathematics", "English"]).await;

    let selection = f
        .reconciler
        .select_plan("app-2", PaymentPlan::SixMonths, march_first())
        .await
        .unwrap();
    let schedule = selection.schedule;
    assert_eq!(schedule.total_fee_minor_units, 230_000);
    assert_eq!(schedule.installments.len(), 6);
    assert!(schedule
        .installments
        .iter()
        .all(|i| i.amount_minor_units == 38_334));
    assert_eq!(schedule.total_minor_units(), 230_004);
    assert_eq!(schedule.overcollection_minor_units(), 4);

    assert!(!f
        .reconciler
        .is_plan_complete("app-2", PaymentPlan::SixMonths)
        .await
        .unwrap());

    for installment in &schedule.installments {
        f.reconciler
            .record_payment(
                "app-2",
                PaymentPlan::SixMonths,
                Some(&installment.month_label),
                installment.amount_minor_units,
                "TUI-app-2",
            )
            .await
            .unwrap();
    }

    assert!(f
        .reconciler
        .is_plan_complete("app-2", PaymentPlan::SixMonths)
        .await
        .unwrap());
    let (_, record) = f.reconciler.client().require_application("app-2").await.unwrap();
    let paid: u64 = record.payments.values().map(|p| p.amount_minor_units).sum();
    assert_eq!(paid, 230_004);
    assert_eq!(
        tuition_sdk::payment_state(&record, f.clock.today()).unwrap(),
        PaymentState::FullyPaid {
            plan: PaymentPlan::SixMonths
        }
    );
}

#[tokio::test]
async fn test_month_label_variants_read_back_as_paid() {
    let f = Fixture::new();
    f.submit("app-3", &["History", "Geography"]).await;
    f.reconciler
        .select_plan("app-3", PaymentPlan::SixMonths, march_first())
        .await
        .unwrap();

    f.reconciler
        .record_payment(
            "app-3",
            PaymentPlan::SixMonths,
            Some("March 2025"),
            38_334,
            "TUI-app-3-march_2025-1",
        )
        .await
        .unwrap();

    let (_, record) = f.reconciler.client().require_application("app-3").await.unwrap();
    assert!(is_month_paid(&record, "march 2025 "));
    assert!(is_month_paid(&record, "  MARCH   2025"));
    assert!(!is_month_paid(&record, "April 2025"));
}

#[tokio::test]
async fn test_plan_switch_does_not_complete_new_plan() {
    let f = Fixture::new();
    f.submit("app-4", &["Accounting"]).await;
    let six = f
        .reconciler
        .select_plan("app-4", PaymentPlan::SixMonths, march_first())
        .await
        .unwrap();
    for installment in six.schedule.installments.iter().take(3) {
        f.reconciler
            .record_payment(
                "app-4",
                PaymentPlan::SixMonths,
                Some(&installment.month_label),
                installment.amount_minor_units,
                "TUI-app-4",
            )
            .await
            .unwrap();
    }

    f.clock
        .set(Utc.with_ymd_and_hms(2025, 9, 2, 9, 0, 0).unwrap());
    let ten = f
        .reconciler
        .select_plan("app-4", PaymentPlan::TenMonths, None)
        .await
        .unwrap();

    assert_eq!(ten.orphaned_payments.len(), 3);
    assert_eq!(ten.schedule.installments[0].month_label, "September 2025");
    assert!(!f
        .reconciler
        .is_plan_complete("app-4", PaymentPlan::TenMonths)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_plan_incomplete_without_payments_map() {
    let f = Fixture::new();
    f.store
        .set_merge(
            "app-5",
            serde_json::json!({ "selectedSubjects": ["History"], "paymentPlan": "tenMonths" })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .await
        .unwrap();

    for plan in PaymentPlan::ALL {
        assert!(!f.reconciler.is_plan_complete("app-5", plan).await.unwrap());
    }
}

#[tokio::test]
async fn test_concurrent_installments_are_not_lost() {
    let store = Arc::new(InMemoryStore::new());
    let client = TuitionClient::new(store.clone()).with_retry_policy(RetryPolicy {
        max_attempts: 10,
        base_delay: std::time::Duration::from_millis(1),
    });
    let reconciler = Reconciler::new(client);
    store
        .set_merge(
            "app-6",
            serde_json::json!({ "selectedSubjects": ["History", "English"] })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .await
        .unwrap();
    let selection = reconciler
        .select_plan("app-6", PaymentPlan::SixMonths, march_first())
        .await
        .unwrap();

    let tasks: Vec<_> = selection
        .schedule
        .installments
        .iter()
        .map(|installment| {
            let reconciler = reconciler.clone();
            let label = installment.month_label.clone();
            tokio::spawn(async move {
                reconciler
                    .record_payment("app-6", PaymentPlan::SixMonths, Some(&label), 38_334, "TUI")
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let (_, record) = reconciler.client().require_application("app-6").await.unwrap();
    assert_eq!(record.payments.len(), 6);
    assert!(reconciler
        .is_plan_complete("app-6", PaymentPlan::SixMonths)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_installment_without_month_is_rejected() {
    let f = Fixture::new();
    f.submit("app-7", &["English"]).await;
    let err = f
        .reconciler
        .record_payment("app-7", PaymentPlan::TenMonths, None, 13_000, "TUI")
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::MissingMonthLabel));
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());
    let reconciler = Reconciler::new(
        TuitionClient::new(store.clone()).with_retry_policy(RetryPolicy::none()),
    );
    store
        .set_merge(
            "app-8",
            serde_json::json!({ "selectedSubjects": ["History"] })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .await
        .unwrap();
    reconciler
        .select_plan("app-8", PaymentPlan::SixMonths, march_first())
        .await
        .unwrap();
    reconciler
        .record_payment(
            "app-8",
            PaymentPlan::SixMonths,
            Some("March 2025"),
            20_000,
            "TUI",
        )
        .await
        .unwrap();

    // A fresh store over the same directory sees the payment
    let reopened = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());
    let client = TuitionClient::new(reopened);
    let (version, record) = client.require_application("app-8").await.unwrap();
    assert_eq!(version, 3);
    assert!(is_month_paid(&record, "March 2025"));
    assert!(dir.path().join("app-8.json").exists());
}
