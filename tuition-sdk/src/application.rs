//! Application record types
//!
//! Mirrors the JSON document kept in the store for each application. Field
//! names are camelCase on the wire; every field has a default so partially
//! written documents still deserialize.

use crate::{
    error::{Result, TuitionError},
    fee_table::PaymentPlan,
    schedule::month_key,
    store::Document,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Review status of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    #[default]
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [Self; 4] = [
        Self::Submitted,
        Self::UnderReview,
        Self::Approved,
        Self::Rejected,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderReview => "under-review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether an admin may move an application from `self` to `next`
    ///
    /// Only the applicant submits, so nothing moves back to `Submitted`.
    /// Setting the current status again is allowed and has no effect.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match next {
            Self::Submitted => matches!(self, Self::Submitted),
            Self::UnderReview | Self::Approved | Self::Rejected => true,
        }
    }

    /// Check a transition, returning a validation error when it is not allowed
    pub fn ensure_transition(self, next: Self) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TuitionError::InvalidStatusTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = TuitionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "submitted" => Ok(Self::Submitted),
            "under-review" | "underreview" => Ok(Self::UnderReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(TuitionError::Validation(format!(
                "Unknown application status '{s}'"
            ))),
        }
    }
}

/// A recorded installment payment, keyed by month key in [`ApplicationRecord::payments`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEntry {
    pub amount_minor_units: u64,
    pub paid: bool,
    pub paid_at: DateTime<Utc>,
    pub reference: String,
}

/// Application document as stored
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationRecord {
    pub student_name: String,
    pub email: String,
    pub grade: Option<String>,
    pub selected_subjects: BTreeSet<String>,
    pub consent_accepted: bool,
    pub rules_accepted: bool,
    pub pledge_accepted: bool,
    pub status: ApplicationStatus,
    pub payment_plan: Option<PaymentPlan>,
    /// First month of the installment schedule
    #[serde(default, deserialize_with = "deserialize_start_date")]
    pub payment_start_date: Option<DateTime<Utc>>,
    pub payments: BTreeMap<String, PaymentEntry>,
    /// Upfront amount in rands, for display only
    pub tuition_amount: Option<f64>,
    pub tuition_paid: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Accept either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date
///
/// A bare date is taken as midnight UTC.
fn deserialize_start_date<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(timestamp.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| Some(date.and_time(NaiveTime::MIN).and_utc()))
        .map_err(|_| de::Error::custom(format!("invalid paymentStartDate '{raw}'")))
}

impl ApplicationRecord {
    /// Decode a stored document
    pub fn from_document(document: &Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(document.clone()))?)
    }

    /// Encode for a full write
    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(TuitionError::Generic(format!(
                "Application record serialized to non-object: {other}"
            ))),
        }
    }

    /// Number of subjects the family is billed for, before clamping
    #[must_use]
    pub fn subject_count(&self) -> i64 {
        i64::try_from(self.selected_subjects.len()).unwrap_or(i64::MAX)
    }

    /// Payment entry for a month label, matched on its normalized key
    #[must_use]
    pub fn payment_for(&self, month_label: &str) -> Option<&PaymentEntry> {
        self.payments.get(&month_key(month_label))
    }
}
