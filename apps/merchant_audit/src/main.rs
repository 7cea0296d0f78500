mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use batch_client::{
    summarize, BatchSession, HttpValidationService, ResultSummary, SessionState,
    ValidationService,
};
use clap::{Parser, Subcommand};
use shared::{
    domain::{BatchId, ValidationStatus},
    protocol::{BatchJob, MerchantRecord},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, ClientSettings, SettingsOverrides, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "merchant_audit", about = "Submit merchant batches for validation and export the results")]
struct Args {
    /// Optional settings file; missing files are ignored.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long, global = true)]
    service_url: Option<String>,
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,
    /// Directory the results CSV is written to.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Upload a CSV of merchants and wait for the batch to finish.
    ValidateCsv {
        path: PathBuf,
        /// Declared media type; guessed from the extension when omitted.
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Submit a JSON array of merchant records and wait for the batch.
    ValidateJson { path: PathBuf },
    /// Print one snapshot of an existing batch.
    Status { batch_id: String },
    /// Probe the validation service.
    Health,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = load_settings(
        &args.config,
        &SettingsOverrides {
            service_url: args.service_url.clone(),
            poll_interval_ms: args.poll_interval_ms,
            output_dir: args.output_dir.clone(),
        },
    )?;
    info!(
        service_url = %settings.service_url,
        poll_interval_ms = settings.poll_interval_ms,
        "merchant_audit: settings loaded"
    );
    let service = Arc::new(HttpValidationService::new(&settings.service_url)?);

    match args.command {
        Command::ValidateCsv { path, content_type } => {
            let mut session = BatchSession::new(service, settings.poll_interval());
            session.select_file(&path, content_type.as_deref())?;
            run_session(&mut session, &settings).await
        }
        Command::ValidateJson { path } => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let records: Vec<MerchantRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of merchants", path.display()))?;
            let mut session = BatchSession::new(service, settings.poll_interval());
            session.select_records(records)?;
            run_session(&mut session, &settings).await
        }
        Command::Status { batch_id } => {
            let job = service.batch_status(&BatchId::new(batch_id)).await?;
            println!("{}", progress_line(&job));
            if let Some(summary) = summarize(&job) {
                print_summary(&summary);
            }
            Ok(())
        }
        Command::Health => {
            let health = service.health().await?;
            println!(
                "{}: {} (google maps api: {})",
                settings.service_url,
                health.status,
                health.google_maps_api.as_deref().unwrap_or("unknown")
            );
            if health.status != "healthy" {
                bail!("validation service reports status {}", health.status);
            }
            Ok(())
        }
    }
}

/// Drives one session to completion, resetting it if the user hits Ctrl-C.
async fn run_session(session: &mut BatchSession, settings: &ClientSettings) -> Result<()> {
    let interrupted = tokio::select! {
        outcome = drive(session) => {
            outcome?;
            false
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            true
        }
    };
    if interrupted {
        warn!(state = session.state().label(), "merchant_audit: interrupted");
        session.reset();
        bail!("interrupted before the batch finished");
    }

    let state = session.state();
    if let Some(err) = state.error() {
        return Err(err.into());
    }
    let Some(summary) = session.summary() else {
        bail!("batch did not finish (session is {})", state.label());
    };
    print_summary(&summary);

    let export = session.export()?;
    let path = export.save_to(&settings.output_dir)?;
    println!("Results saved to {}", path.display());
    Ok(())
}

async fn drive(session: &mut BatchSession) -> Result<()> {
    let state = session.submit().await?;
    report_state(state);
    if let Some(err) = state.error() {
        return Err(err.into());
    }
    while let Some(state) = session.next_update().await {
        report_state(state);
    }
    Ok(())
}

fn report_state(state: &SessionState) {
    if let Some(job) = state.job() {
        println!("{}", progress_line(job));
    }
}

fn progress_line(job: &BatchJob) -> String {
    format!(
        "Batch {}: {} ({}/{} merchants, {}%)",
        job.batch_id.short(),
        job.status,
        job.processed_merchants,
        job.total_merchants,
        job.progress_percent()
    )
}

fn summary_lines(summary: &ResultSummary) -> Vec<String> {
    let mut lines = vec![format!("Validated {} merchants", summary.total())];
    lines.extend(
        ValidationStatus::ALL
            .into_iter()
            .map(|status| format!("  {:<11}{}", status.as_str(), summary.count(status))),
    );
    lines
}

fn print_summary(summary: &ResultSummary) {
    for line in summary_lines(summary) {
        println!("{line}");
    }
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
