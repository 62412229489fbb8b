//! Record payment command implementation
//!
//! Records a payment that was taken outside the checkout flow, e.g. an EFT
//! confirmed by the school office.

use crate::config::TuitionCliConfig;
use crate::utils::formatting::{to_json, OutputFormat};
use anyhow::{anyhow, Result};
use tracing::info;
use tuition_sdk::{
    checkout::payment_reference, fee_for, month_key, reconciliation::schedule_for, PaymentPlan,
    Reconciler, TuitionClient,
};

/// Request parameters for recording a payment
pub struct RecordPaymentRequest<'a> {
    pub application_id: &'a str,
    /// Defaults to the application's selected plan
    pub plan: Option<PaymentPlan>,
    pub month_label: Option<&'a str>,
    /// Defaults to the scheduled amount in cents
    pub amount_minor_units: Option<u64>,
    /// Defaults to a generated `TUI-...` reference
    pub reference: Option<&'a str>,
}

/// Execute the record-payment command
///
/// # Errors
/// Returns error if no plan is known, an installment month is missing, or the write fails
pub async fn execute(
    client: &TuitionClient,
    request: &RecordPaymentRequest<'_>,
    output_format: OutputFormat,
    config: &TuitionCliConfig,
) -> Result<String> {
    let application_id = request.application_id;
    info!("Recording payment for application {}", application_id);

    let (_, record) = client.require_application(application_id).await?;
    let plan = request.plan.or(record.payment_plan).ok_or_else(|| {
        anyhow!("Application {application_id} has no payment plan; pass --plan or run select-plan")
    })?;

    let amount = match (request.amount_minor_units, plan.is_installment()) {
        (Some(amount), _) => amount,
        (None, false) => fee_for(record.subject_count(), plan),
        (None, true) => {
            let label = request
                .month_label
                .ok_or_else(|| anyhow!("Installment payments need --month"))?;
            schedule_for(&record, plan, client.clock().today())?
                .find(label)
                .map(|i| i.amount_minor_units)
                .ok_or_else(|| {
                    anyhow!("'{label}' is not in the {plan} schedule; pass --amount to record it anyway")
                })?
        }
    };

    let generated;
    let reference = if let Some(reference) = request.reference {
        reference
    } else {
        let key = request
            .month_label
            .filter(|_| plan.is_installment())
            .map(month_key);
        generated = payment_reference(application_id, key.as_deref(), client.clock().now());
        &generated
    };

    let reconciler = Reconciler::new(client.clone());
    reconciler
        .record_payment(application_id, plan, request.month_label, amount, reference)
        .await?;
    let plan_complete = reconciler.is_plan_complete(application_id, plan).await?;

    match output_format {
        OutputFormat::Human => Ok(format!(
            "Payment recorded\n\
            Application ID: {}\n\
            Plan: {}\n\
            Month: {}\n\
            Amount: {}\n\
            Reference: {}\n\
            Plan complete: {}",
            application_id,
            plan,
            request.month_label.map_or("-", str::trim),
            config.format_amount(amount),
            reference,
            if plan_complete { "Yes" } else { "No" }
        )),
        OutputFormat::Json => to_json(&serde_json::json!({
            "applicationId": application_id,
            "plan": plan,
            "month": request.month_label.map(str::trim),
            "amountMinorUnits": amount,
            "reference": reference,
            "planComplete": plan_complete,
        })),
    }
}
