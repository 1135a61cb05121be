//! Show a stored job.

use anyhow::Result;
use clap::Args;
use jobrunner_core::jobs::{JobId, JobStore};
use jobrunner_core::RunnerError;

use super::App;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ShowArgs {
    /// Job ID
    pub job_id: String,
}

pub async fn execute(args: ShowArgs, app: &App) -> Result<()> {
    let store = app.job_store().await?;
    let job_id = JobId::from(args.job_id);
    let record = store
        .get(&job_id)
        .await?
        .ok_or_else(|| RunnerError::job_not_found(&job_id))?;

    match app.format {
        OutputFormat::Table => {
            output::print_header(&format!("Job: {}", record.id));
            output::print_detail("Handler", &record.handler_key());
            output::print_detail("Status", &output::colorize_status(record.status.as_str()));
            output::print_detail("Retry count", &record.retry_count.to_string());
            output::print_detail("Parameters", &record.parameters.to_value().to_string());
            output::print_detail("Created", &output::format_timestamp(&record.created_at));
            output::print_detail("Updated", &output::format_timestamp(&record.updated_at));
        }
        format => output::print_item(&record, format),
    }

    Ok(())
}
