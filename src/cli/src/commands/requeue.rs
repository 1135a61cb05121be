//! Requeue a job.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use jobrunner_core::jobs::{JobExecutor, JobId, TracingJobLogger};

use super::App;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RequeueArgs {
    /// Job ID
    pub job_id: String,
}

pub async fn execute(args: RequeueArgs, app: &App) -> Result<()> {
    let store = app.job_store().await?;
    let executor = JobExecutor::new(
        Arc::new(store),
        Arc::new(app.registry()),
        Arc::new(TracingJobLogger::default()),
        app.config.executor.clone(),
    );

    let job_id = JobId::from(args.job_id);
    executor.requeue(&job_id).await?;

    match app.format {
        OutputFormat::Table => output::print_success(&format!("Job {} requeued", job_id)),
        format => output::print_item(
            &serde_json::json!({ "job_id": job_id, "status": "pending", "retry_count": 0 }),
            format,
        ),
    }

    Ok(())
}
