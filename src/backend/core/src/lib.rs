#![allow(clippy::result_large_err)]
//! # Jobrunner Core
//!
//! Executes persisted background jobs one at a time, with bounded retry.
//!
//! ## Architecture
//!
//! - **Jobs**: job records, handler registry, retry policy and the executor state machine
//! - **Database**: PostgreSQL-backed job store with bundled migrations
//! - **Telemetry**: structured logging with redaction of sensitive parameters
//! - **Config**: layered file and environment configuration

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, RunnerError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig};
    pub use crate::db::{Database, PgJobStore};
    pub use crate::error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, RunnerError};
    pub use crate::jobs::{
        register_builtin, BackoffStrategy, ExecutionOutcome, ExecutorConfig, HandlerContext,
        HandlerRegistry, InMemoryJobStore, JobExecutor, JobHandler, JobId, JobLogger,
        JobParameters, JobRecord, JobStatus, JobStore, JobUpdate, LogFields, MemoryJobLogger,
        OutcomeStatus, RetryPolicy, TracingJobLogger,
    };
    pub use crate::telemetry::{init_logging, LoggingConfig};
}
