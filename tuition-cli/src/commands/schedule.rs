//! Schedule preview command implementation

use crate::config::TuitionCliConfig;
use crate::utils::formatting::{format_schedule_human, to_json, OutputFormat};
use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;
use tuition_sdk::{build_schedule, Clock, PaymentPlan, SystemClock};

/// Execute the schedule command
///
/// # Errors
/// Returns error if the schedule cannot be built or serialized
pub fn execute(
    subject_count: i64,
    plan: PaymentPlan,
    start_date: Option<NaiveDate>,
    output_format: OutputFormat,
    config: &TuitionCliConfig,
) -> Result<String> {
    let start = start_date.unwrap_or_else(|| SystemClock.today());
    info!(
        "Building {} schedule for {} subject(s) from {}",
        plan, subject_count, start
    );

    let schedule = build_schedule(subject_count, plan, start)?;

    match output_format {
        OutputFormat::Human => Ok(format_schedule_human(&schedule, config)),
        OutputFormat::Json => to_json(&schedule),
    }
}
