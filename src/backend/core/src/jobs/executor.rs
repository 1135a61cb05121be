//! Job executor: runs one job through its lifecycle with bounded retry.
//!
//! ```text
//! pending ──▶ running ──┬──▶ completed
//!               ▲       │
//!               └─retry─┤
//!                       └──▶ failed
//! ```
//!
//! Every transition is persisted through the [`JobStore`] before the next step
//! runs, and reported through the [`JobLogger`].

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::events::DEFAULT_ERROR_CHANNEL;
use super::{
    BackoffStrategy, ExecutionOutcome, HandlerContext, HandlerRegistry, JobId, JobLogger,
    JobRecord, JobStatus, JobStore, JobUpdate, LogFields, RetryPolicy,
};
use crate::error::{Result, RunnerError};

/// Configuration for the job executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum number of attempts per job
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait between attempts
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Upper bound on a single attempt
    #[serde(default, with = "humantime_serde")]
    pub attempt_timeout: Option<Duration>,

    /// Channel name for failure events
    #[serde(default = "default_error_channel")]
    pub error_channel: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: BackoffStrategy::default(),
            attempt_timeout: None,
            error_channel: default_error_channel(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_error_channel() -> String {
    DEFAULT_ERROR_CHANNEL.to_string()
}

/// Runs single jobs to a terminal state.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    logger: Arc<dyn JobLogger>,
    policy: RetryPolicy,
    config: ExecutorConfig,
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        logger: Arc<dyn JobLogger>,
        config: ExecutorConfig,
    ) -> Self {
        let policy = RetryPolicy::new(config.backoff.clone());
        Self {
            store,
            registry,
            logger,
            policy,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute a job until it completes or exhausts its attempts.
    ///
    /// Only a missing job, a cancellation or a store failure is returned as an
    /// error; handler failures end up in the returned outcome.
    pub async fn execute(&self, job_id: &JobId) -> Result<ExecutionOutcome> {
        self.execute_with_cancellation(job_id, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but the wait between attempts is
    /// abandoned as soon as `cancel` fires. The record is then left `running`
    /// with the last persisted retry count.
    #[instrument(skip_all, fields(job_id = %job_id))]
    pub async fn execute_with_cancellation(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        let record = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| RunnerError::job_not_found(job_id))?;

        match record.status {
            JobStatus::Completed => {
                info!(retry_count = record.retry_count, "Job already completed, nothing to do");
                return Ok(ExecutionOutcome::completed(record.id, record.retry_count));
            }
            JobStatus::Failed => {
                warn!(retry_count = record.retry_count, "Job already failed; requeue it to run again");
                return Ok(ExecutionOutcome::failed(
                    record.id,
                    record.retry_count,
                    Some("job already failed".to_string()),
                ));
            }
            JobStatus::Pending | JobStatus::Running => {}
        }

        if let Err(e) = record.validate() {
            return self.reject(&record, e).await;
        }

        self.run_attempts(&record, cancel).await
    }

    /// Reset a job to `pending` with no attempts recorded.
    pub async fn requeue(&self, job_id: &JobId) -> Result<()> {
        self.store.update(job_id, JobUpdate::requeue()).await?;
        info!(job_id = %job_id, "Job requeued");
        Ok(())
    }

    /// Malformed job: fail immediately without consuming an attempt.
    async fn reject(&self, record: &JobRecord, error: RunnerError) -> Result<ExecutionOutcome> {
        error.log();
        self.store.update(&record.id, JobUpdate::failed()).await?;

        let fields = LogFields::new(&record.id, &record.parameters).with_error(error.message());
        self.logger.log_error(
            &self.config.error_channel,
            &format!("Job rejected: {}", error.message()),
            &fields,
        );
        counter!("jobrunner_jobs_total", "status" => "rejected").increment(1);

        Ok(ExecutionOutcome::failed(
            record.id.clone(),
            record.retry_count,
            Some(error.message().to_string()),
        ))
    }

    async fn run_attempts(
        &self,
        record: &JobRecord,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        let key = record.handler_key();
        let max_retries = self.config.max_retries;
        let mut retry_count = record.retry_count;
        let mut last_error: Option<String> = None;

        while retry_count < max_retries {
            self.store
                .update(&record.id, JobUpdate::running(retry_count))
                .await?;

            let attempt = retry_count + 1;
            debug!(attempt, max_retries, handler = %key, "Starting attempt");

            match self.attempt(record, attempt).await {
                Ok(()) => {
                    self.logger.log_info(
                        &format!("Job executed successfully: {}", key),
                        &LogFields::new(&record.id, &record.parameters).with_attempt(attempt),
                    );
                    self.store.update(&record.id, JobUpdate::completed()).await?;
                    counter!("jobrunner_attempts_total", "outcome" => "success").increment(1);
                    counter!("jobrunner_jobs_total", "status" => "completed").increment(1);

                    return Ok(ExecutionOutcome::completed(record.id.clone(), retry_count));
                }
                Err(e) => {
                    counter!("jobrunner_attempts_total", "outcome" => "failure").increment(1);
                    self.logger.log_error(
                        &self.config.error_channel,
                        &format!("Job failed: {}", key),
                        &LogFields::new(&record.id, &record.parameters)
                            .with_attempt(attempt)
                            .with_error(e.message()),
                    );

                    retry_count += 1;
                    last_error = Some(e.message().to_string());

                    if self.policy.should_retry(retry_count, max_retries) {
                        self.store
                            .update(&record.id, JobUpdate::retry_count(retry_count))
                            .await?;
                        self.logger.log_info(
                            &format!(
                                "Retrying job: {} - Attempt {}/{}",
                                key, retry_count, max_retries
                            ),
                            &LogFields::new(&record.id, &record.parameters)
                                .with_attempt(attempt),
                        );
                        self.wait_before_retry(&record.id, retry_count, cancel)
                            .await?;
                    } else {
                        self.store
                            .update(
                                &record.id,
                                JobUpdate::retry_count(retry_count).with_status(JobStatus::Failed),
                            )
                            .await?;
                    }
                }
            }
        }

        // Exhausted before any attempt was made: still needs a terminal status.
        if last_error.is_none() {
            self.store.update(&record.id, JobUpdate::failed()).await?;
        }

        // Summary on top of the per-attempt failure events.
        self.logger.log_error(
            &self.config.error_channel,
            &format!("Job failed after {} retries: {}", max_retries, key),
            &LogFields::new(&record.id, &record.parameters)
                .with_error(last_error.clone().unwrap_or_else(|| "retries exhausted".to_string())),
        );
        counter!("jobrunner_jobs_total", "status" => "failed").increment(1);

        Ok(ExecutionOutcome::failed(
            record.id.clone(),
            retry_count,
            last_error,
        ))
    }

    /// One isolated attempt: resolve, then invoke with a fresh copy of the parameters.
    async fn attempt(&self, record: &JobRecord, attempt: u32) -> Result<()> {
        let handler = self.registry.resolve(&record.target, &record.method)?;
        let ctx = HandlerContext::new(
            record.id.clone(),
            &record.target,
            &record.method,
            attempt,
            record.parameters.clone(),
        );

        match self.config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, HandlerRegistry::invoke(handler.as_ref(), ctx))
                .await
                .map_err(|_| {
                    RunnerError::handler_execution(format!("timed out after {:?}", limit))
                })?,
            None => HandlerRegistry::invoke(handler.as_ref(), ctx).await,
        }
    }

    async fn wait_before_retry(
        &self,
        job_id: &JobId,
        retry_count: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let delay = self.policy.delay_before_retry(retry_count);
        debug!(delay_ms = delay.as_millis() as u64, "Waiting before retry");

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let error = RunnerError::cancelled(job_id, retry_count);
                error.log();
                Err(error)
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
