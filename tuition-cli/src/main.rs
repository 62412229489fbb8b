//! Tuition CLI - Command-line interface for school tuition payments
//!
//! Look up fees, preview installment schedules, and manage applications and
//! their payments in a local file-backed store.

#![forbid(unsafe_code)]

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tuition_cli::{
    commands,
    commands::{record_payment::RecordPaymentRequest, submit::SubmitRequest},
    utils::formatting::envelope,
    OutputFormat, TuitionCliConfig,
};
use tuition_sdk::{ApplicationStatus, JsonFileStore, PaymentPlan, TuitionClient};

#[derive(Parser, Debug)]
#[command(
    name = "tuition-cli",
    version,
    about = "Command-line interface for school tuition payments",
    author = "Tuition Team"
)]
struct Cli {
    /// Directory holding application documents
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show tuition fees for a number of subjects
    Fee {
        /// Number of subjects (clamped to 1-4)
        #[arg(long)]
        subjects: i64,

        /// Only show this plan (upfront, sixMonths, tenMonths)
        #[arg(long)]
        plan: Option<PaymentPlan>,
    },

    /// Preview the installment schedule for a plan
    Schedule {
        /// Number of subjects (clamped to 1-4)
        #[arg(long)]
        subjects: i64,

        /// Payment plan (upfront, sixMonths, tenMonths)
        #[arg(long)]
        plan: PaymentPlan,

        /// First month of the schedule, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,
    },

    /// Submit a new application
    Submit {
        /// Application identifier
        #[arg(long)]
        id: String,

        /// Student's full name
        #[arg(long)]
        name: String,

        /// Contact email address
        #[arg(long)]
        email: String,

        /// School grade
        #[arg(long)]
        grade: Option<String>,

        /// Subject to enrol in (repeat for several)
        #[arg(long = "subject")]
        subjects: Vec<String>,

        /// Parent or guardian consent given
        #[arg(long)]
        accept_consent: bool,

        /// School rules accepted
        #[arg(long)]
        accept_rules: bool,

        /// Learner pledge accepted
        #[arg(long)]
        accept_pledge: bool,
    },

    /// Choose the payment plan for an application
    SelectPlan {
        /// Application identifier
        #[arg(long)]
        id: String,

        /// Payment plan (upfront, sixMonths, tenMonths)
        #[arg(long)]
        plan: PaymentPlan,

        /// First month of the schedule, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,
    },

    /// Record a payment received outside the checkout flow
    RecordPayment {
        /// Application identifier
        #[arg(long)]
        id: String,

        /// Payment plan (defaults to the application's selected plan)
        #[arg(long)]
        plan: Option<PaymentPlan>,

        /// Month being paid, e.g. "March 2025" (installment plans only)
        #[arg(long)]
        month: Option<String>,

        /// Amount in cents (defaults to the scheduled amount)
        #[arg(long)]
        amount: Option<u64>,

        /// Payment reference (generated when omitted)
        #[arg(long)]
        reference: Option<String>,
    },

    /// Show the payment summary for an application
    Status {
        /// Application identifier
        #[arg(long)]
        id: String,
    },

    /// Change the review status of an application (admin)
    SetStatus {
        /// Application identifier
        #[arg(long)]
        id: String,

        /// New status (submitted, under-review, approved, rejected)
        #[arg(long)]
        status: ApplicationStatus,
    },

    /// List applications (admin)
    List {
        /// Only show applications with this status
        #[arg(long)]
        status: Option<ApplicationStatus>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = TuitionCliConfig::new();

    // Use configuration with CLI overrides
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_dir.clone());
    let default_output_format = OutputFormat::parse(&config.default_output_format)?;
    let output_format = cli.output.unwrap_or(default_output_format);

    // Execute command
    let result = execute_command(&cli, data_dir, output_format, &config).await;

    // Handle output formatting
    match output_format {
        OutputFormat::Human => match &result {
            Ok(output) => println!("{output}"),
            Err(e) => eprintln!("Error: {e}"),
        },
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&envelope(&result))?);
        }
    }
    if result.is_err() {
        std::process::exit(1);
    }

    Ok(())
}

async fn open_client(data_dir: PathBuf, config: &TuitionCliConfig) -> Result<TuitionClient> {
    let store = JsonFileStore::open(data_dir).await?;
    Ok(TuitionClient::new(Arc::new(store)).with_retry_policy(config.retry_policy()))
}

async fn execute_command(
    cli: &Cli,
    data_dir: PathBuf,
    output_format: OutputFormat,
    config: &TuitionCliConfig,
) -> Result<String> {
    match &cli.command {
        Commands::Fee { subjects, plan } => {
            commands::execute_fee(*subjects, *plan, output_format, config)
        }

        Commands::Schedule {
            subjects,
            plan,
            start,
        } => commands::execute_schedule(*subjects, *plan, *start, output_format, config),

        Commands::Submit {
            id,
            name,
            email,
            grade,
            subjects,
            accept_consent,
            accept_rules,
            accept_pledge,
        } => {
            let client = open_client(data_dir, config).await?;
            let request = SubmitRequest {
                application_id: id,
                student_name: name,
                email,
                grade: grade.as_deref(),
                subjects,
                consent_accepted: *accept_consent,
                rules_accepted: *accept_rules,
                pledge_accepted: *accept_pledge,
            };
            commands::execute_submit(&client, &request, output_format).await
        }

        Commands::SelectPlan { id, plan, start } => {
            let client = open_client(data_dir, config).await?;
            commands::execute_select_plan(&client, id, *plan, *start, output_format, config).await
        }

        Commands::RecordPayment {
            id,
            plan,
            month,
            amount,
            reference,
        } => {
            let client = open_client(data_dir, config).await?;
            let request = RecordPaymentRequest {
                application_id: id,
                plan: *plan,
                month_label: month.as_deref(),
                amount_minor_units: *amount,
                reference: reference.as_deref(),
            };
            commands::execute_record_payment(&client, &request, output_format, config).await
        }

        Commands::Status { id } => {
            let client = open_client(data_dir, config).await?;
            commands::execute_status(&client, id, output_format, config).await
        }

        Commands::SetStatus { id, status } => {
            let client = open_client(data_dir, config).await?;
            commands::execute_set_status(&client, id, *status, output_format, config).await
        }

        Commands::List { status } => {
            let client = open_client(data_dir, config).await?;
            commands::execute_list(&client, *status, output_format, config).await
        }
    }
}
