//! Admin application listing command implementation

use crate::config::TuitionCliConfig;
use crate::utils::formatting::{format_listings_human, to_json, OutputFormat};
use anyhow::Result;
use tracing::info;
use tuition_sdk::{AdminClient, ApplicationStatus, TuitionClient};

/// Execute the list command
///
/// # Errors
/// Returns error if the store cannot be listed
pub async fn execute(
    client: &TuitionClient,
    status: Option<ApplicationStatus>,
    output_format: OutputFormat,
    config: &TuitionCliConfig,
) -> Result<String> {
    info!(
        "Listing applications{}",
        status.map_or_else(String::new, |s| format!(" with status {s}"))
    );

    let admin = AdminClient::new(client.clone(), config.admin_cache_config())?;
    let listings = admin.list_applications(status).await?;

    match output_format {
        OutputFormat::Human => Ok(format_listings_human(&listings)),
        OutputFormat::Json => to_json(&listings),
    }
}
