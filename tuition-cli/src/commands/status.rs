//! Application status command implementation

use crate::config::TuitionCliConfig;
use crate::utils::formatting::{format_summary_human, to_json, OutputFormat};
use anyhow::Result;
use tracing::info;
use tuition_sdk::{DashboardClient, Reconciler, TuitionClient};

/// Execute the status command
///
/// # Errors
/// Returns error if the application does not exist or cannot be read
pub async fn execute(
    client: &TuitionClient,
    application_id: &str,
    output_format: OutputFormat,
    config: &TuitionCliConfig,
) -> Result<String> {
    info!("Fetching payment status for application {}", application_id);

    let dashboard = DashboardClient::new(Reconciler::new(client.clone()));
    let summary = dashboard.summary(application_id).await?;

    match output_format {
        OutputFormat::Human => Ok(format_summary_human(&summary, config)),
        OutputFormat::Json => to_json(&summary),
    }
}
