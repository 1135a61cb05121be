//! Structured logging with JSON/pretty formats and sensitive data redaction.
//!
//! - JSON format for production environments
//! - Pretty format for development
//! - Per-module log level configuration
//! - Redaction of secrets in job parameters before they reach any log line

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Global redactor instance for sensitive data.
static REDACTOR: OnceLock<SensitiveFieldRedactor> = OnceLock::new();

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty or compact)
    #[serde(default)]
    pub format: LogFormat,

    /// Per-module log levels
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Whether to include file/line information
    #[serde(default)]
    pub include_location: bool,

    /// Whether to include target (module path)
    #[serde(default = "default_include_target")]
    pub include_target: bool,

    /// Redaction configuration
    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: false,
            include_target: default_include_target(),
            redaction: RedactionConfig::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    #[default]
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Configuration for sensitive data redaction.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionConfig {
    #[serde(default = "default_redaction_enabled")]
    pub enabled: bool,

    #[serde(default = "default_redaction_patterns")]
    pub patterns: Vec<RedactionPattern>,

    /// Replacement text for redacted values
    #[serde(default = "default_redaction_replacement")]
    pub replacement: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: default_redaction_enabled(),
            patterns: default_redaction_patterns(),
            replacement: default_redaction_replacement(),
        }
    }
}

/// A pattern for identifying sensitive data to redact.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionPattern {
    pub name: String,

    /// Object keys to match (case-insensitive substring)
    #[serde(default)]
    pub field_names: Vec<String>,

    /// Regex matched against string values
    #[serde(default)]
    pub value_pattern: Option<String>,
}

/// Redactor for sensitive values in job parameters.
#[derive(Debug, Clone)]
pub struct SensitiveFieldRedactor {
    field_names: Vec<String>,
    value_regexes: Vec<regex::Regex>,
    replacement: String,
    enabled: bool,
}

impl SensitiveFieldRedactor {
    /// Create a new redactor from configuration. Invalid regexes are skipped.
    pub fn new(config: &RedactionConfig) -> Self {
        let field_names = config
            .patterns
            .iter()
            .flat_map(|p| p.field_names.iter().map(|s| s.to_lowercase()))
            .collect();

        let value_regexes = config
            .patterns
            .iter()
            .filter_map(|p| {
                let pattern = p.value_pattern.as_ref()?;
                match regex::Regex::new(pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(pattern = %p.name, error = %e, "Skipping invalid redaction pattern");
                        None
                    }
                }
            })
            .collect();

        Self {
            field_names,
            value_regexes,
            replacement: config.replacement.clone(),
            enabled: config.enabled,
        }
    }

    /// Check if a field name should be redacted.
    pub fn should_redact_field(&self, field_name: &str) -> bool {
        if !self.enabled {
            return false;
        }

        let lower = field_name.to_lowercase();
        self.field_names.iter().any(|f| lower.contains(f.as_str()))
    }

    /// Redact a string value if it matches any pattern.
    pub fn redact_value(&self, value: &str) -> String {
        if !self.enabled {
            return value.to_string();
        }

        let mut result = value.to_string();
        for regex in &self.value_regexes {
            result = regex
                .replace_all(&result, self.replacement.as_str())
                .into_owned();
        }
        result
    }

    /// Redact a JSON document: values under sensitive keys are replaced whole,
    /// other strings are scanned for sensitive patterns.
    pub fn redact_json(&self, value: &Value) -> Value {
        if !self.enabled {
            return value.clone();
        }

        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, v)| {
                        let redacted = if self.should_redact_field(key) {
                            Value::String(self.replacement.clone())
                        } else {
                            self.redact_json(v)
                        };
                        (key.clone(), redacted)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_json(v)).collect()),
            Value::String(s) => Value::String(self.redact_value(s)),
            other => other.clone(),
        }
    }

    /// Get the global redactor instance.
    pub fn global() -> &'static SensitiveFieldRedactor {
        REDACTOR.get_or_init(|| SensitiveFieldRedactor::new(&RedactionConfig::default()))
    }
}

// Default value functions
fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_include_target() -> bool {
    true
}

fn default_redaction_enabled() -> bool {
    true
}

fn default_redaction_replacement() -> String {
    "[REDACTED]".to_string()
}

fn default_redaction_patterns() -> Vec<RedactionPattern> {
    vec![
        RedactionPattern {
            name: "api_keys".to_string(),
            field_names: vec!["api_key".to_string(), "apikey".to_string(), "api-key".to_string()],
            value_pattern: Some(r"sk-[a-zA-Z0-9]{20,}".to_string()),
        },
        RedactionPattern {
            name: "passwords".to_string(),
            field_names: vec![
                "password".to_string(),
                "passwd".to_string(),
                "secret".to_string(),
                "credential".to_string(),
            ],
            value_pattern: None,
        },
        RedactionPattern {
            name: "tokens".to_string(),
            field_names: vec![
                "token".to_string(),
                "bearer".to_string(),
                "authorization".to_string(),
            ],
            value_pattern: Some(r"eyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+".to_string()),
        },
        RedactionPattern {
            name: "credit_cards".to_string(),
            field_names: vec!["credit_card".to_string(), "cc_number".to_string()],
            value_pattern: Some(r"\b(?:\d{4}[-\s]?){3}\d{4}\b".to_string()),
        },
    ]
}

/// Initialize the logging subsystem.
///
/// Installs the global redactor and a `tracing` subscriber built from the
/// configured level, module directives and format. Call it before anything
/// redacts (a [`TracingJobLogger`](crate::jobs::TracingJobLogger) for
/// instance), otherwise the default redaction patterns stay in effect.
///
/// # Errors
///
/// Returns an error if a directive cannot be parsed or a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let redactor_installed = install_redactor(&config.redaction);

    let mut filter = EnvFilter::try_new(&config.level)?;
    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(directive.parse()?);
    }

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_target(config.include_target),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_target(config.include_target),
            )
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_target(config.include_target),
            )
            .try_init()?,
    }

    if !redactor_installed {
        tracing::warn!(
            "Redactor was already in use before logging was initialized; configured redaction patterns are ignored"
        );
    }

    Ok(())
}

/// Install the global redactor. Returns `false` when one is already set,
/// which happens if [`SensitiveFieldRedactor::global`] ran first.
fn install_redactor(config: &RedactionConfig) -> bool {
    REDACTOR.set(SensitiveFieldRedactor::new(config)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_name_redaction() {
        let redactor = SensitiveFieldRedactor::new(&RedactionConfig::default());

        assert!(redactor.should_redact_field("api_key"));
        assert!(redactor.should_redact_field("SMTP_PASSWORD"));
        assert!(redactor.should_redact_field("access_token"));
        assert!(!redactor.should_redact_field("recipient"));
    }

    #[test]
    fn test_redactor_cannot_be_replaced_once_used() {
        let _ = SensitiveFieldRedactor::global();
        assert!(!install_redactor(&RedactionConfig::default()));
    }

    #[test]
    fn test_redact_json() {
        let redactor = SensitiveFieldRedactor::new(&RedactionConfig::default());
        let params = json!({
            "to": "ops@example.com",
            "smtp_password": "hunter2",
            "nested": [{"api_key": "abc"}, "sk-abcdefghijklmnopqrstuvwxyz"],
            "retries": 3
        });

        let redacted = redactor.redact_json(&params);
        assert_eq!(redacted["to"], "ops@example.com");
        assert_eq!(redacted["smtp_password"], "[REDACTED]");
        assert_eq!(redacted["nested"][0]["api_key"], "[REDACTED]");
        assert_eq!(redacted["nested"][1], "[REDACTED]");
        assert_eq!(redacted["retries"], 3);
    }

    #[test]
    fn test_disabled_redaction_passes_through() {
        let config = RedactionConfig {
            enabled: false,
            ..RedactionConfig::default()
        };
        let redactor = SensitiveFieldRedactor::new(&config);
        let params = json!({"password": "hunter2"});
        assert_eq!(redactor.redact_json(&params), params);
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let config = RedactionConfig {
            patterns: vec![RedactionPattern {
                name: "broken".to_string(),
                field_names: vec![],
                value_pattern: Some("(".to_string()),
            }],
            ..RedactionConfig::default()
        };
        let redactor = SensitiveFieldRedactor::new(&config);
        assert_eq!(redactor.redact_value("plain"), "plain");
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.redaction.enabled);
        assert!(config.include_target);
    }
}
