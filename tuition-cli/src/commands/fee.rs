//! Fee lookup command implementation

use crate::config::TuitionCliConfig;
use crate::utils::formatting::{format_fee_options_human, to_json, OutputFormat};
use anyhow::Result;
use tracing::info;
use tuition_sdk::{dashboard::plan_options, PaymentPlan};

/// Execute the fee command
///
/// Shows every plan for the subject count, or only `plan` when given.
///
/// # Errors
/// Returns error if JSON serialization fails
pub fn execute(
    subject_count: i64,
    plan: Option<PaymentPlan>,
    output_format: OutputFormat,
    config: &TuitionCliConfig,
) -> Result<String> {
    info!("Looking up tuition fees for {} subject(s)", subject_count);

    let options: Vec<_> = plan_options(subject_count)
        .into_iter()
        .filter(|option| plan.is_none_or(|p| option.plan == p))
        .collect();

    match output_format {
        OutputFormat::Human => Ok(format_fee_options_human(subject_count, &options, config)),
        OutputFormat::Json => to_json(&options),
    }
}
