//! Admin status update command implementation

use crate::config::TuitionCliConfig;
use crate::utils::formatting::{to_json, OutputFormat};
use anyhow::Result;
use tracing::info;
use tuition_sdk::{AdminClient, ApplicationStatus, TuitionClient};

/// Execute the set-status command
///
/// # Errors
/// Returns error if the transition is not allowed or the write fails
pub async fn execute(
    client: &TuitionClient,
    application_id: &str,
    status: ApplicationStatus,
    output_format: OutputFormat,
    config: &TuitionCliConfig,
) -> Result<String> {
    info!("Setting application {} to {}", application_id, status);

    let admin = AdminClient::new(client.clone(), config.admin_cache_config())?;
    admin.set_status(application_id, status).await?;

    match output_format {
        OutputFormat::Human => Ok(format!(
            "Application status updated\n\
            Application ID: {application_id}\n\
            Status: {status}"
        )),
        OutputFormat::Json => to_json(&serde_json::json!({
            "applicationId": application_id,
            "status": status,
        })),
    }
}
