//! Job execution with bounded retry.
//!
//! This module runs a single persisted job to a terminal state:
//!
//! - **Job Record**: the stored unit of work and its mutable execution state
//! - **Handler Registry**: maps `target@method` names to typed handlers
//! - **Retry Policy**: decides retry versus give up, and the wait in between
//! - **Executor**: drives a job through its attempts, persisting every transition
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              JobExecutor                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │  JobStore   │───▶│  Registry   │───▶│ JobHandler  │                  │
//! │  │ (get/update)│    │  (resolve)  │    │   (call)    │                  │
//! │  └─────────────┘    └─────────────┘    └─────────────┘                  │
//! │         ▲                                     │                         │
//! │         │           ┌─────────────┐           │                         │
//! │         └───────────│ RetryPolicy │◀──────────┘                         │
//! │                     └─────────────┘                                     │
//! │                            │                                            │
//! │                            ▼                                            │
//! │                     ┌─────────────┐                                     │
//! │                     │  JobLogger  │                                     │
//! │                     └─────────────┘                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jobrunner_core::jobs::{
//!     ExecutorConfig, HandlerRegistry, InMemoryJobStore, JobExecutor, JobRecord,
//!     TracingJobLogger,
//! };
//!
//! # async fn run() -> jobrunner_core::Result<()> {
//! let mut registry = HandlerRegistry::new();
//! registry.register_fn("EmailSender", "send", |ctx| async move {
//!     let to: String = ctx.params.arg(0)?;
//!     ctx.log_info(&format!("sending to {}", to));
//!     Ok::<(), anyhow::Error>(())
//! });
//!
//! let store = InMemoryJobStore::new();
//! let id = store
//!     .insert(JobRecord::new("EmailSender", "send", serde_json::json!(["a@example.com"])))
//!     .await;
//!
//! let executor = JobExecutor::new(
//!     Arc::new(store),
//!     Arc::new(registry),
//!     Arc::new(TracingJobLogger::default()),
//!     ExecutorConfig::default(),
//! );
//! let outcome = executor.execute(&id).await?;
//! assert!(outcome.is_completed());
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod events;
pub mod executor;
pub mod job;
pub mod registry;
pub mod retry;
pub mod store;

pub use builtin::{register_builtin, SYSTEM_TARGET};
pub use events::{
    EventLevel, JobLogger, LogFields, LoggedEvent, MemoryJobLogger, TracingJobLogger,
    DEFAULT_ERROR_CHANNEL,
};
pub use executor::{ExecutorConfig, JobExecutor};
pub use job::{
    ExecutionOutcome, JobId, JobParameters, JobRecord, JobStatus, JobUpdate, OutcomeStatus,
};
pub use registry::{HandlerContext, HandlerRegistry, JobHandler};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use store::{InMemoryJobStore, JobStore};
