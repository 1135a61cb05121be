//! Job records and their execution state.
//!
//! This module provides the data side of the job lifecycle:
//!
//! - **JobId**: Opaque identifier assigned by whatever enqueued the job
//! - **JobStatus**: `pending | running | completed | failed`
//! - **JobParameters**: Positional or named handler arguments
//! - **JobRecord**: Immutable snapshot of one persisted job
//! - **JobUpdate**: Partial update applied atomically by a job store
//! - **ExecutionOutcome**: What `execute` reports back to its caller

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ErrorCode, Result, RunnerError};

// ═══════════════════════════════════════════════════════════════════════════════
// Job Identification
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique identifier for a job record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting to be executed
    Pending,
    /// An attempt is in progress, or the run was interrupted between attempts
    Running,
    /// The handler succeeded
    Completed,
    /// Every allowed attempt failed, or the job was malformed
    Failed,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(RunnerError::new(
                ErrorCode::SerializationError,
                format!("Unknown job status '{}'", other),
            )),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Parameters
// ═══════════════════════════════════════════════════════════════════════════════

/// Arguments passed to a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobParameters {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Default for JobParameters {
    fn default() -> Self {
        Self::Positional(Vec::new())
    }
}

impl JobParameters {
    /// Decode parameters from their stored JSON text.
    ///
    /// Missing, malformed or scalar input yields an empty positional list.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed job parameters");
                Self::default()
            }
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Positional(items),
            Value::Object(map) => Self::Named(map),
            _ => Self::default(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Positional(items) => Value::Array(items.clone()),
            Self::Named(map) => Value::Object(map.clone()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Positional(items) => items.len(),
            Self::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deserialize the positional argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> anyhow::Result<T> {
        let value = match self {
            Self::Positional(items) => items
                .get(index)
                .ok_or_else(|| anyhow::anyhow!("missing positional argument {}", index))?,
            Self::Named(_) => {
                anyhow::bail!("positional argument {} requested from named parameters", index)
            }
        };

        serde_json::from_value(value.clone())
            .map_err(|e| anyhow::anyhow!("argument {}: {}", index, e))
    }

    /// Deserialize the named argument `key`.
    pub fn named<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<T> {
        let value = match self {
            Self::Named(map) => map
                .get(key)
                .ok_or_else(|| anyhow::anyhow!("missing named argument '{}'", key))?,
            Self::Positional(_) => {
                anyhow::bail!("named argument '{}' requested from positional parameters", key)
            }
        };

        serde_json::from_value(value.clone())
            .map_err(|e| anyhow::anyhow!("argument '{}': {}", key, e))
    }
}

impl From<Vec<Value>> for JobParameters {
    fn from(items: Vec<Value>) -> Self {
        Self::Positional(items)
    }
}

impl From<Map<String, Value>> for JobParameters {
    fn from(map: Map<String, Value>) -> Self {
        Self::Named(map)
    }
}

impl From<Value> for JobParameters {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn lenient_parameters<'de, D>(deserializer: D) -> std::result::Result<JobParameters, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(JobParameters::from_value)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Record
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot of one persisted unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Registered handler target
    pub target: String,
    /// Operation on the target
    pub method: String,
    #[serde(default, deserialize_with = "lenient_parameters")]
    pub parameters: JobParameters,
    pub status: JobStatus,
    /// Attempts already made
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a pending record with a fresh id.
    pub fn new(
        target: impl Into<String>,
        method: impl Into<String>,
        parameters: impl Into<JobParameters>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            target: target.into(),
            method: method.into(),
            parameters: parameters.into(),
            status: JobStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// `Target@method`, as used in log messages.
    pub fn handler_key(&self) -> String {
        format!("{}@{}", self.target, self.method)
    }

    /// Check that the record names something to invoke.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() || self.method.trim().is_empty() {
            return Err(RunnerError::invalid_job_definition(
                "Target and method are required",
            )
            .with_context("job_id", self.id.as_str()));
        }
        Ok(())
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }
        self.updated_at = Utc::now();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Update
// ═══════════════════════════════════════════════════════════════════════════════

/// Fields to change on a stored job. `None` leaves the field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub retry_count: Option<u32>,
}

impl JobUpdate {
    /// Attempt is about to start.
    pub fn running(retry_count: u32) -> Self {
        Self {
            status: Some(JobStatus::Running),
            retry_count: Some(retry_count),
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(JobStatus::Completed),
            retry_count: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: Some(JobStatus::Failed),
            retry_count: None,
        }
    }

    pub fn retry_count(retry_count: u32) -> Self {
        Self {
            status: None,
            retry_count: Some(retry_count),
        }
    }

    /// Operator reset back to a fresh pending job.
    pub fn requeue() -> Self {
        Self {
            status: Some(JobStatus::Pending),
            retry_count: Some(0),
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.retry_count.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Execution Outcome
// ═══════════════════════════════════════════════════════════════════════════════

/// Terminal status reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

impl From<OutcomeStatus> for JobStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Completed => JobStatus::Completed,
            OutcomeStatus::Failed => JobStatus::Failed,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&JobStatus::from(*self), f)
    }
}

/// Result of one `execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub job_id: JobId,
    pub status: OutcomeStatus,
    /// Final persisted retry count
    pub retry_count: u32,
    /// Message of the last failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ExecutionOutcome {
    pub fn completed(job_id: JobId, retry_count: u32) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Completed,
            retry_count,
            last_error: None,
        }
    }

    pub fn failed(job_id: JobId, retry_count: u32, last_error: Option<String>) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Failed,
            retry_count,
            last_error,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_id() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);

        let uuid = Uuid::new_v4();
        assert_eq!(JobId::from(uuid).as_str(), uuid.to_string());
        assert_eq!(JobId::from(17_i64).as_str(), "17");
    }

    #[test]
    fn test_record_deserialize_tolerates_bad_parameters() {
        let mut value =
            serde_json::to_value(JobRecord::new("EmailSender", "send", json!(["a@example.com"])))
                .unwrap();

        for bad in [json!(42), json!(null), json!("oops"), json!(true)] {
            value["parameters"] = bad;
            let record: JobRecord = serde_json::from_value(value.clone()).unwrap();
            assert!(record.parameters.is_empty());
            assert_eq!(record.target, "EmailSender");
        }

        value.as_object_mut().unwrap().remove("parameters");
        let record: JobRecord = serde_json::from_value(value.clone()).unwrap();
        assert!(record.parameters.is_empty());

        value["parameters"] = json!({"to": "a@example.com"});
        let record: JobRecord = serde_json::from_value(value).unwrap();
        assert!(matches!(record.parameters, JobParameters::Named(_)));
    }

    #[test]
    fn test_job_status() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());

        assert_eq!("running".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert!("dead".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_parameters_parse() {
        assert_eq!(
            JobParameters::parse(Some(r#"["a@example.com", 3]"#)),
            JobParameters::Positional(vec![json!("a@example.com"), json!(3)])
        );
        assert!(matches!(
            JobParameters::parse(Some(r#"{"to": "a@example.com"}"#)),
            JobParameters::Named(_)
        ));
        assert_eq!(JobParameters::parse(None), JobParameters::default());
        assert_eq!(JobParameters::parse(Some("{broken")), JobParameters::default());
        assert_eq!(JobParameters::parse(Some("42")), JobParameters::default());
        assert_eq!(JobParameters::parse(Some("null")), JobParameters::default());
    }

    #[test]
    fn test_parameter_accessors() {
        let params = JobParameters::from(vec![json!("hello"), json!(5)]);
        assert_eq!(params.arg::<String>(0).unwrap(), "hello");
        assert_eq!(params.arg::<u32>(1).unwrap(), 5);
        assert!(params.arg::<u32>(0).is_err());
        assert!(params.arg::<String>(2).is_err());
        assert!(params.named::<String>("to").is_err());

        let params = JobParameters::from_value(json!({"to": "ops@example.com"}));
        assert_eq!(params.named::<String>("to").unwrap(), "ops@example.com");
        assert!(params.arg::<String>(0).is_err());
    }

    #[test]
    fn test_record_validate() {
        let record = JobRecord::new("EmailSender", "send", JobParameters::default());
        assert!(record.validate().is_ok());
        assert_eq!(record.handler_key(), "EmailSender@send");

        let err = JobRecord::new("", "send", JobParameters::default()).validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidJobDefinition);
        assert!(JobRecord::new("EmailSender", "  ", JobParameters::default()).validate().is_err());
    }

    #[test]
    fn test_record_apply_update() {
        let mut record = JobRecord::new("EmailSender", "send", JobParameters::default());
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.retry_count, 0);

        record.apply(&JobUpdate::running(0));
        assert_eq!(record.status, JobStatus::Running);

        record.apply(&JobUpdate::retry_count(1));
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.retry_count, 1);

        record.apply(&JobUpdate::retry_count(3).with_status(JobStatus::Failed));
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.retry_count, 3);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ExecutionOutcome::failed(JobId::from("7"), 3, Some("boom".into()));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["retry_count"], 3);
        assert_eq!(value["job_id"], "7");
    }
}
