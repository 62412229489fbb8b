//! Tuition fee table
//!
//! Fees are keyed by the number of selected subjects and the payment plan.
//! All amounts are integer cents (ZAR minor units); conversion to rands only
//! happens at presentation time, see [`crate::utils::minor_to_major`].

use crate::error::TuitionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest subject count with its own row in the fee table
pub const MIN_SUBJECTS: u32 = 1;

/// Largest subject count with its own row in the fee table
pub const MAX_SUBJECTS: u32 = 4;

/// How the family pays the yearly tuition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentPlan {
    /// Single lump sum
    Upfront,
    /// Six monthly installments
    SixMonths,
    /// Ten monthly installments
    TenMonths,
}

impl PaymentPlan {
    /// All plans in display order
    pub const ALL: [Self; 3] = [Self::Upfront, Self::SixMonths, Self::TenMonths];

    /// Number of payments the plan is split into
    #[must_use]
    pub const fn installment_count(self) -> u32 {
        match self {
            Self::Upfront => 1,
            Self::SixMonths => 6,
            Self::TenMonths => 10,
        }
    }

    /// Whether payments are tracked per calendar month
    #[must_use]
    pub const fn is_installment(self) -> bool {
        !matches!(self, Self::Upfront)
    }

    /// Storage name, matches the serialized form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upfront => "upfront",
            Self::SixMonths => "sixMonths",
            Self::TenMonths => "tenMonths",
        }
    }
}

impl fmt::Display for PaymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentPlan {
    type Err = TuitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "upfront" => Ok(Self::Upfront),
            "sixmonths" | "6months" => Ok(Self::SixMonths),
            "tenmonths" | "10months" => Ok(Self::TenMonths),
            _ => Err(TuitionError::Validation(format!(
                "Unknown payment plan '{s}', expected upfront, sixMonths or tenMonths"
            ))),
        }
    }
}

/// One row of the fee table, amounts in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRow {
    pub upfront: u64,
    pub six_months: u64,
    pub ten_months: u64,
}

impl FeeRow {
    /// Amount for the given plan
    #[must_use]
    pub const fn amount(&self, plan: PaymentPlan) -> u64 {
        match plan {
            PaymentPlan::Upfront => self.upfront,
            PaymentPlan::SixMonths => self.six_months,
            PaymentPlan::TenMonths => self.ten_months,
        }
    }
}

/// Fee rows for 1..=4 subjects
pub const FEE_SCHEDULE: [FeeRow; 4] = [
    FeeRow {
        upfront: 110_000,
        six_months: 120_000,
        ten_months: 130_000,
    },
    FeeRow {
        upfront: 210_000,
        six_months: 230_000,
        ten_months: 250_000,
    },
    FeeRow {
        upfront: 300_000,
        six_months: 330_000,
        ten_months: 360_000,
    },
    FeeRow {
        upfront: 380_000,
        six_months: 420_000,
        ten_months: 460_000,
    },
];

/// Clamp a subject count into the range covered by the fee table
///
/// Counts of zero or less bill as one subject; more than four bill as four.
///
/// # Example
/// ```
/// # use tuition_sdk::fee_table::clamp_subject_count;
/// assert_eq!(clamp_subject_count(0), 1);
/// assert_eq!(clamp_subject_count(3), 3);
/// assert_eq!(clamp_subject_count(100), 4);
/// ```
#[must_use]
pub fn clamp_subject_count(subject_count: i64) -> u32 {
    let clamped = subject_count.clamp(i64::from(MIN_SUBJECTS), i64::from(MAX_SUBJECTS));
    u32::try_from(clamped).unwrap_or(MAX_SUBJECTS)
}

/// Fee row for a subject count after clamping
#[must_use]
pub fn fee_row(subject_count: i64) -> FeeRow {
    let index = clamp_subject_count(subject_count).saturating_sub(MIN_SUBJECTS);
    FEE_SCHEDULE[usize::try_from(index).unwrap_or(0)]
}

/// Total tuition for a subject count and plan, in cents
///
/// Out-of-range subject counts are clamped silently rather than rejected.
///
/// # Example
/// ```
/// # use tuition_sdk::fee_table::{fee_for, PaymentPlan};
/// assert_eq!(fee_for(1, PaymentPlan::Upfront), 110_000);
/// assert_eq!(fee_for(2, PaymentPlan::SixMonths), 230_000);
/// assert_eq!(fee_for(9, PaymentPlan::TenMonths), fee_for(4, PaymentPlan::TenMonths));
/// ```
#[must_use]
pub fn fee_for(subject_count: i64, plan: PaymentPlan) -> u64 {
    fee_row(subject_count).amount(plan)
}
