//! Execute a single job.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use jobrunner_core::jobs::{
    BackoffStrategy, ExecutionOutcome, JobExecutor, JobId, OutcomeStatus, TracingJobLogger,
};
use tokio_util::sync::CancellationToken;

use super::App;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Job ID
    pub job_id: String,

    /// Maximum number of attempts, overrides the configured value
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Fixed delay between attempts in seconds, overrides the configured backoff
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,
}

pub async fn execute(args: RunArgs, app: &App) -> Result<ExitCode> {
    let mut config = app.config.executor.clone();
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(secs) = args.retry_delay_secs {
        config.backoff = BackoffStrategy::fixed(Duration::from_secs(secs));
    }

    let store = app.job_store().await?;
    let executor = JobExecutor::new(
        Arc::new(store),
        Arc::new(app.registry()),
        Arc::new(TracingJobLogger::default()),
        config,
    );

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_signal(cancel.clone()));

    let job_id = JobId::from(args.job_id);
    let result = executor.execute_with_cancellation(&job_id, &cancel).await;
    watcher.abort();

    let outcome = result?;
    print_outcome(&outcome, app.format);

    Ok(match outcome.status {
        OutcomeStatus::Completed => ExitCode::SUCCESS,
        OutcomeStatus::Failed => ExitCode::FAILURE,
    })
}

fn print_outcome(outcome: &ExecutionOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            match outcome.status {
                OutcomeStatus::Completed => {
                    output::print_success(&format!("Job {} completed", outcome.job_id))
                }
                OutcomeStatus::Failed => {
                    output::print_error(&format!("Job {} failed", outcome.job_id))
                }
            }
            output::print_detail("Retry count", &outcome.retry_count.to_string());
            if let Some(error) = &outcome.last_error {
                output::print_detail("Last error", error);
            }
        }
        _ => output::print_item(outcome, format),
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling job");
    token.cancel();
}
