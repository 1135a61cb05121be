//! Structured job event sink.
//!
//! The executor reports every success, failure and retry notice through a
//! [`JobLogger`]. [`TracingJobLogger`] forwards events to `tracing`;
//! [`MemoryJobLogger`] keeps them for inspection in tests.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{JobId, JobParameters};
use crate::telemetry::SensitiveFieldRedactor;

/// Channel used for job failure events unless configured otherwise.
pub const DEFAULT_ERROR_CHANNEL: &str = "background_jobs_errors";

/// Structured context attached to every job event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFields {
    pub job_id: JobId,
    pub params: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogFields {
    pub fn new(job_id: &JobId, params: &JobParameters) -> Self {
        Self {
            job_id: job_id.clone(),
            params: params.to_value(),
            timestamp: Utc::now(),
            attempt: None,
            error: None,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Sink for job lifecycle events.
pub trait JobLogger: Send + Sync {
    fn log_info(&self, event: &str, fields: &LogFields);

    /// `channel` tags job failures so a subscriber can route them apart from general output.
    fn log_error(&self, channel: &str, event: &str, fields: &LogFields);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tracing Logger
// ═══════════════════════════════════════════════════════════════════════════════

/// Emits job events as `tracing` events, redacting sensitive parameter values.
#[derive(Debug, Clone)]
pub struct TracingJobLogger {
    redactor: SensitiveFieldRedactor,
}

impl TracingJobLogger {
    pub fn new(redactor: SensitiveFieldRedactor) -> Self {
        Self { redactor }
    }
}

impl Default for TracingJobLogger {
    fn default() -> Self {
        Self::new(SensitiveFieldRedactor::global().clone())
    }
}

impl JobLogger for TracingJobLogger {
    fn log_info(&self, event: &str, fields: &LogFields) {
        let params = self.redactor.redact_json(&fields.params);
        tracing::info!(
            job_id = %fields.job_id,
            attempt = ?fields.attempt,
            params = %params,
            timestamp = %fields.timestamp.to_rfc3339(),
            "{}",
            event
        );
    }

    fn log_error(&self, channel: &str, event: &str, fields: &LogFields) {
        let params = self.redactor.redact_json(&fields.params);
        tracing::error!(
            channel = channel,
            job_id = %fields.job_id,
            attempt = ?fields.attempt,
            params = %params,
            timestamp = %fields.timestamp.to_rfc3339(),
            error = fields.error.as_deref().unwrap_or(""),
            "{}",
            event
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Recording Logger
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Error,
}

/// One recorded job event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub level: EventLevel,
    pub channel: Option<String>,
    pub event: String,
    pub fields: LogFields,
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryJobLogger {
    events: Arc<Mutex<Vec<LoggedEvent>>>,
}

impl MemoryJobLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().clone()
    }

    pub fn infos(&self) -> Vec<LoggedEvent> {
        self.filtered(EventLevel::Info)
    }

    pub fn errors(&self) -> Vec<LoggedEvent> {
        self.filtered(EventLevel::Error)
    }

    /// Info events whose message starts with `prefix`.
    pub fn infos_starting_with(&self, prefix: &str) -> Vec<LoggedEvent> {
        self.infos()
            .into_iter()
            .filter(|e| e.event.starts_with(prefix))
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn filtered(&self, level: EventLevel) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

impl JobLogger for MemoryJobLogger {
    fn log_info(&self, event: &str, fields: &LogFields) {
        self.events.lock().push(LoggedEvent {
            level: EventLevel::Info,
            channel: None,
            event: event.to_string(),
            fields: fields.clone(),
        });
    }

    fn log_error(&self, channel: &str, event: &str, fields: &LogFields) {
        self.events.lock().push(LoggedEvent {
            level: EventLevel::Error,
            channel: Some(channel.to_string()),
            event: event.to_string(),
            fields: fields.clone(),
        });
    }
}
