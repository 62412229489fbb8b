//! Select payment plan command implementation

use crate::config::TuitionCliConfig;
use crate::utils::formatting::{format_schedule_human, to_json, OutputFormat};
use anyhow::Result;
use chrono::NaiveDate;
use std::fmt::Write;
use tracing::info;
use tuition_sdk::{PaymentPlan, Reconciler, TuitionClient};

/// Execute the select-plan command
///
/// # Errors
/// Returns error if the application does not exist or the write fails
pub async fn execute(
    client: &TuitionClient,
    application_id: &str,
    plan: PaymentPlan,
    start_date: Option<NaiveDate>,
    output_format: OutputFormat,
    config: &TuitionCliConfig,
) -> Result<String> {
    info!("Selecting {} plan for application {}", plan, application_id);

    let reconciler = Reconciler::new(client.clone());
    let selection = reconciler
        .select_plan(application_id, plan, start_date)
        .await?;

    match output_format {
        OutputFormat::Human => {
            let mut output = format!("Plan selected for {application_id}\n\n");
            output.push_str(&format_schedule_human(&selection.schedule, config));
            if !selection.orphaned_payments.is_empty() {
                let _ = write!(
                    &mut output,
                    "\n\nWarning: {} earlier payment(s) are outside the new schedule: {}",
                    selection.orphaned_payments.len(),
                    selection.orphaned_payments.join(", ")
                );
            }
            Ok(output)
        }
        OutputFormat::Json => to_json(&serde_json::json!({
            "applicationId": application_id,
            "schedule": selection.schedule,
            "orphanedPayments": selection.orphaned_payments,
        })),
    }
}
