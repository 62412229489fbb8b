//! Output formatting utilities for the Tuition CLI

use crate::config::TuitionCliConfig;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt::Write;
use tuition_sdk::{
    ApplicationListing, ApplicationSummary, InstallmentSchedule, PaymentPlan, PlanOption,
};

/// How command results are printed
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// Parse output format from string
    ///
    /// # Errors
    /// Returns an error for anything other than `human` or `json`
    pub fn parse(format_str: &str) -> Result<Self> {
        match format_str.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(anyhow!("Invalid output format: {format_str}")),
        }
    }
}

/// Serialize a command result for JSON output
///
/// # Errors
///
/// Returns an error if JSON serialization fails
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| anyhow!("Failed to serialize JSON: {e}"))
}

/// Wrap a command result in the `{success, data | error}` envelope
#[must_use]
pub fn envelope(result: &Result<String>) -> serde_json::Value {
    match result {
        Ok(output) => serde_json::json!({
            "success": true,
            "data": serde_json::from_str::<serde_json::Value>(output)
                .unwrap_or_else(|_| serde_json::Value::String(output.clone())),
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "error": e.to_string(),
        }),
    }
}

/// Format the plans and prices for a subject count
#[must_use]
pub fn format_fee_options_human(
    subject_count: i64,
    options: &[PlanOption],
    config: &TuitionCliConfig,
) -> String {
    let mut output = format!("Tuition fees for {subject_count} subject(s)\n\n");

    let _ = writeln!(
        &mut output,
        "{:<12} {:>16} {:>14} {:>16}",
        "Plan", "Total", "Installments", "Per installment"
    );
    output.push_str(&"-".repeat(61));
    output.push('\n');

    for option in options {
        let _ = writeln!(
            &mut output,
            "{:<12} {:>16} {:>14} {:>16}",
            option.plan.as_str(),
            config.format_amount(option.total_fee_minor_units),
            option.installment_count,
            config.format_amount(option.installment_minor_units)
        );
    }
    output.truncate(output.trim_end().len());
    output
}

/// Format an installment schedule
#[must_use]
pub fn format_schedule_human(schedule: &InstallmentSchedule, config: &TuitionCliConfig) -> String {
    let mut output = format!(
        "{} plan starting {}\n\n",
        schedule.plan,
        schedule.start_date.format("%Y-%m-%d")
    );

    let _ = writeln!(&mut output, "{:<4} {:<16} {:>14}", "#", "Month", "Amount");
    output.push_str(&"-".repeat(36));
    output.push('\n');

    for (n, installment) in schedule.installments.iter().enumerate() {
        let _ = writeln!(
            &mut output,
            "{:<4} {:<16} {:>14}",
            n.saturating_add(1),
            installment.month_label,
            config.format_amount(installment.amount_minor_units)
        );
    }

    let _ = write!(
        &mut output,
        "\nFee: {}  Billed: {}",
        config.format_amount(schedule.total_fee_minor_units),
        config.format_amount(schedule.total_minor_units())
    );
    let over = schedule.overcollection_minor_units();
    if over > 0 {
        let _ = write!(&mut output, "  (rounding excess {})", config.format_amount(over));
    }
    output
}

/// Format the dashboard summary of one application
#[must_use]
pub fn format_summary_human(summary: &ApplicationSummary, config: &TuitionCliConfig) -> String {
    let mut output = format!(
        "Application: {}\nStudent:     {}\nStatus:      {}\nSubjects:    {}\n",
        summary.application_id, summary.student_name, summary.status, summary.subject_count
    );

    let Some(plan) = summary.plan else {
        output.push_str("Plan:        not selected");
        return output;
    };
    let _ = writeln!(&mut output, "Plan:        {}\n", plan_label(plan));

    let _ = writeln!(
        &mut output,
        "{:<16} {:>14} {:<6} {}",
        "Month", "Amount", "Paid", "Reference"
    );
    output.push_str(&"-".repeat(60));
    output.push('\n');
    for line in &summary.lines {
        let _ = writeln!(
            &mut output,
            "{:<16} {:>14} {:<6} {}",
            line.month_label,
            config.format_amount(line.amount_minor_units),
            if line.paid { "Yes" } else { "No" },
            line.reference.as_deref().unwrap_or("-")
        );
    }

    let _ = write!(
        &mut output,
        "\nPaid: {}  Outstanding: {}",
        config.format_amount(summary.paid_minor_units),
        config.format_amount(summary.outstanding_minor_units)
    );
    if let Some(next) = &summary.next_due {
        let _ = write!(
            &mut output,
            "\nNext due: {} ({})",
            next.month_label,
            config.format_amount(next.amount_minor_units)
        );
    }
    output
}

/// Format the admin application table
#[must_use]
pub fn format_listings_human(listings: &[ApplicationListing]) -> String {
    if listings.is_empty() {
        return "No applications found".to_string();
    }

    let mut output = String::new();
    let _ = writeln!(
        &mut output,
        "{:<20} {:<24} {:<14} {:<10} {:<8} {:<20}",
        "Application", "Student", "Status", "Plan", "Paid", "Submitted"
    );
    output.push_str(&"-".repeat(100));
    output.push('\n');

    for listing in listings {
        let paid = if listing.tuition_paid {
            "full".to_string()
        } else {
            listing.payments_made.to_string()
        };
        let _ = writeln!(
            &mut output,
            "{:<20} {:<24} {:<14} {:<10} {:<8} {:<20}",
            listing.application_id,
            listing.student_name,
            listing.status.as_str(),
            listing.payment_plan.map_or("-", PaymentPlan::as_str),
            paid,
            listing
                .submitted_at
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
        );
    }

    let _ = write!(&mut output, "\nTotal applications: {}", listings.len());
    output
}

/// Human name for a plan
#[must_use]
pub const fn plan_label(plan: PaymentPlan) -> &'static str {
    match plan {
        PaymentPlan::Upfront => "Upfront (single payment)",
        PaymentPlan::SixMonths => "6 monthly installments",
        PaymentPlan::TenMonths => "10 monthly installments",
    }
}
