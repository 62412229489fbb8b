//! Installment planning
//!
//! Derives the monthly amounts and calendar month labels for a payment plan.
//!
//! # Rounding policy
//!
//! Every installment is `ceil(total_fee / installment_count)`. The final
//! installment is not reduced to absorb the remainder, so the sum of a
//! schedule can exceed the plan's fee by up to `installment_count - 1`
//! cents. Two subjects on the six month plan bill `6 × 38_334 = 230_004`
//! cents against a fee of `230_000`.

use crate::{
    error::{Result, TuitionError},
    fee_table::{fee_for, PaymentPlan},
};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single scheduled payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    /// Calendar month this installment covers, e.g. "March 2025"
    pub month_label: String,
    /// Amount due in cents
    pub amount_minor_units: u64,
}

impl Installment {
    /// Storage key for this installment's payment entry
    #[must_use]
    pub fn month_key(&self) -> String {
        month_key(&self.month_label)
    }
}

/// Ordered installments for one plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentSchedule {
    pub plan: PaymentPlan,
    pub start_date: NaiveDate,
    /// Fee from the fee table before splitting
    pub total_fee_minor_units: u64,
    pub installments: Vec<Installment>,
}

impl InstallmentSchedule {
    /// Sum of all installment amounts
    #[must_use]
    pub fn total_minor_units(&self) -> u64 {
        self.installments
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.amount_minor_units))
    }

    /// How much the schedule collects above the nominal fee
    #[must_use]
    pub fn overcollection_minor_units(&self) -> u64 {
        self.total_minor_units()
            .saturating_sub(self.total_fee_minor_units)
    }

    /// Month labels in schedule order
    #[must_use]
    pub fn month_labels(&self) -> Vec<&str> {
        self.installments
            .iter()
            .map(|i| i.month_label.as_str())
            .collect()
    }

    /// Normalized storage keys in schedule order
    #[must_use]
    pub fn month_keys(&self) -> Vec<String> {
        self.installments.iter().map(Installment::month_key).collect()
    }

    /// Installment for a month label, matched on the normalized key
    #[must_use]
    pub fn find(&self, month_label: &str) -> Option<&Installment> {
        let key = month_key(month_label);
        self.installments.iter().find(|i| i.month_key() == key)
    }
}

/// Normalize a month label into its storage key
///
/// Surrounding whitespace is dropped, the label is lowercased, and runs of
/// inner whitespace become a single underscore.
///
/// # Example
/// ```
/// # use tuition_sdk::schedule::month_key;
/// assert_eq!(month_key("March 2025"), "march_2025");
/// assert_eq!(month_key("march 2025 "), "march_2025");
/// ```
#[must_use]
pub fn month_key(month_label: &str) -> String {
    month_label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Amount of each installment, rounded up to the next cent
///
/// # Example
/// ```
/// # use tuition_sdk::schedule::installment_amount;
/// assert_eq!(installment_amount(230_000, 6), 38_334);
/// assert_eq!(installment_amount(110_000, 1), 110_000);
/// ```
#[must_use]
pub const fn installment_amount(total_fee_minor_units: u64, installment_count: u32) -> u64 {
    if installment_count == 0 {
        return total_fee_minor_units;
    }
    total_fee_minor_units.div_ceil(installment_count as u64)
}

/// Label for the calendar month containing `date`, e.g. "March 2025"
#[must_use]
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

/// Consecutive month labels starting at the month of `start_date`
///
/// The day of month is ignored, so every date within a month yields the same
/// labels.
pub fn month_labels(plan: PaymentPlan, start_date: NaiveDate) -> Result<Vec<String>> {
    let first_of_month = NaiveDate::from_ymd_opt(start_date.year(), start_date.month(), 1)
        .ok_or_else(|| TuitionError::Validation(format!("Invalid start date: {start_date}")))?;

    (0..plan.installment_count())
        .map(|offset| {
            first_of_month
                .checked_add_months(Months::new(offset))
                .map(month_label)
                .ok_or_else(|| {
                    TuitionError::Validation(format!(
                        "Schedule starting {start_date} runs past the supported calendar range"
                    ))
                })
        })
        .collect()
}

/// Build the installment schedule for a subject count, plan and start date
///
/// # Example
/// ```
/// # use tuition_sdk::{fee_table::PaymentPlan, schedule::build_schedule};
/// # use chrono::NaiveDate;
/// let start = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
/// let schedule = build_schedule(2, PaymentPlan::SixMonths, start).unwrap();
/// assert_eq!(schedule.installments.len(), 6);
/// assert_eq!(schedule.installments[0].month_label, "March 2025");
/// assert_eq!(schedule.total_minor_units(), 230_004);
/// ```
pub fn build_schedule(
    subject_count: i64,
    plan: PaymentPlan,
    start_date: NaiveDate,
) -> Result<InstallmentSchedule> {
    let total_fee = fee_for(subject_count, plan);
    let amount = installment_amount(total_fee, plan.installment_count());

    let installments = month_labels(plan, start_date)?
        .into_iter()
        .map(|month_label| Installment {
            month_label,
            amount_minor_units: amount,
        })
        .collect();

    Ok(InstallmentSchedule {
        plan,
        start_date,
        total_fee_minor_units: total_fee,
        installments,
    })
}
