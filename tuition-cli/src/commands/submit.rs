//! Submit application command implementation

use crate::utils::formatting::{to_json, OutputFormat};
use anyhow::Result;
use tracing::info;
use tuition_sdk::{ApplicationForm, TuitionClient};

/// Request parameters for submitting an application
pub struct SubmitRequest<'a> {
    pub application_id: &'a str,
    pub student_name: &'a str,
    pub email: &'a str,
    pub grade: Option<&'a str>,
    pub subjects: &'a [String],
    pub consent_accepted: bool,
    pub rules_accepted: bool,
    pub pledge_accepted: bool,
}

/// Execute the submit command
///
/// # Errors
/// Returns error if the form is incomplete or the application already exists
pub async fn execute(
    client: &TuitionClient,
    request: &SubmitRequest<'_>,
    output_format: OutputFormat,
) -> Result<String> {
    info!("Submitting application {}", request.application_id);

    let form = ApplicationForm {
        student_name: request.student_name.to_string(),
        email: request.email.to_string(),
        grade: request.grade.map(str::to_string),
        subjects: request.subjects.to_vec(),
        consent_accepted: request.consent_accepted,
        rules_accepted: request.rules_accepted,
        pledge_accepted: request.pledge_accepted,
    };
    let record = client
        .submit_application(request.application_id, &form)
        .await?;

    match output_format {
        OutputFormat::Human => Ok(format!(
            "Application submitted\n\
            Application ID: {}\n\
            Student: {}\n\
            Subjects: {}\n\
            Status: {}",
            request.application_id,
            record.student_name,
            record
                .selected_subjects
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            record.status
        )),
        OutputFormat::Json => to_json(&serde_json::json!({
            "applicationId": request.application_id,
            "application": record,
        })),
    }
}
