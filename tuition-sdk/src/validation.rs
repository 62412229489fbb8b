//! Validation utilities for application submission and payments

use crate::error::{Result, TuitionError};
use serde::{Deserialize, Serialize};

/// Subjects offered by the school
pub const OFFERED_SUBJECTS: [&str; 8] = [
    "Mathematics",
    "Mathematical Literacy",
    "Physical Sciences",
    "Life Sciences",
    "Accounting",
    "English",
    "Geography",
    "History",
];

/// Everything the applicant fills in across the application steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationForm {
    pub student_name: String,
    pub email: String,
    pub grade: Option<String>,
    pub subjects: Vec<String>,
    pub consent_accepted: bool,
    pub rules_accepted: bool,
    pub pledge_accepted: bool,
}

/// Validate an email address well enough to catch typos
///
/// # Errors
/// Returns an error if the address has no `@` or no dot in its domain
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@')
    });
    if !valid {
        return Err(TuitionError::Validation(format!(
            "Invalid email address: '{email}'"
        )));
    }
    Ok(())
}

/// Validate the subject selection
///
/// # Errors
/// Returns an error if nothing is selected or a subject is not offered
pub fn validate_subjects(subjects: &[String]) -> Result<()> {
    if subjects.iter().all(|s| s.trim().is_empty()) {
        return Err(TuitionError::NoSubjectsSelected);
    }

    if let Some(unknown) = subjects
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .find(|s| !OFFERED_SUBJECTS.iter().any(|o| o.eq_ignore_ascii_case(s)))
    {
        return Err(TuitionError::Validation(format!(
            "Subject '{unknown}' is not offered"
        )));
    }
    Ok(())
}

/// Validate a complete application form before submission
///
/// Checks run in step order: details, subjects, consent, rules, pledge.
///
/// # Errors
/// Returns the first failing check
pub fn validate_application_form(form: &ApplicationForm) -> Result<()> {
    if form.student_name.trim().is_empty() {
        return Err(TuitionError::Validation(
            "Student name is required".to_string(),
        ));
    }
    validate_email(&form.email)?;
    validate_subjects(&form.subjects)?;

    if !form.consent_accepted {
        return Err(TuitionError::Validation(
            "Parent or guardian consent must be accepted".to_string(),
        ));
    }
    if !form.rules_accepted {
        return Err(TuitionError::Validation(
            "School rules must be accepted".to_string(),
        ));
    }
    if !form.pledge_accepted {
        return Err(TuitionError::Validation(
            "The learner pledge must be accepted".to_string(),
        ));
    }
    Ok(())
}

/// Canonical spelling of a subject from the offered list
#[must_use]
pub fn canonical_subject(subject: &str) -> Option<&'static str> {
    let subject = subject.trim();
    OFFERED_SUBJECTS
        .iter()
        .copied()
        .find(|o| o.eq_ignore_ascii_case(subject))
}

/// Validate a payment amount
///
/// # Errors
/// Returns an error if the amount is zero
pub fn validate_payment_amount(amount_minor_units: u64) -> Result<()> {
    if amount_minor_units == 0 {
        return Err(TuitionError::Validation(
            "Payment amount must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
