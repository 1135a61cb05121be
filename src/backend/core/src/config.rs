//! Configuration management.
//!
//! Values come from an optional file, then environment variables prefixed
//! with `JOBRUNNER` using `__` as the section separator
//! (`JOBRUNNER__EXECUTOR__MAX_RETRIES=5`).

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::jobs::ExecutorConfig;
use crate::telemetry::LoggingConfig;

const ENV_PREFIX: &str = "JOBRUNNER";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long to wait for a pooled connection
    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,

    /// Apply bundled migrations on startup
    #[serde(default)]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout: default_acquire_timeout(),
            run_migrations: false,
        }
    }
}

// Default value functions
fn default_database_url() -> String { "postgres://localhost:5432/jobrunner".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_min_connections() -> u32 { 1 }
fn default_acquire_timeout() -> Duration { Duration::from_secs(5) }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path; environment variables still override it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::telemetry::LogFormat;
    use std::io::Write;

    // Tests that read or write `JOBRUNNER__*` variables hold this lock.
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

    /// Sets environment variables for the lifetime of the guard.
    struct EnvVars(Vec<&'static str>);

    impl EnvVars {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
            Self(vars.iter().map(|(key, _)| *key).collect())
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for key in &self.0 {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.executor.max_retries, 3);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(5));
        assert!(!config.database.run_migrations);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_file() {
        let _lock = ENV_LOCK.lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[executor]
max_retries = 5
attempt_timeout = "30s"
error_channel = "jobs_errors"

[executor.backoff]
kind = "exponential"
initial = "1s"
max = "1m"
multiplier = 2.0

[database]
url = "postgres://db:5432/jobs"
run_migrations = true

[logging]
format = "pretty"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.executor.max_retries, 5);
        assert_eq!(config.executor.attempt_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.executor.error_channel, "jobs_errors");
        assert_eq!(config.executor.backoff.delay_after(3), Duration::from_secs(4));
        assert_eq!(config.database.url, "postgres://db:5432/jobs");
        assert!(config.database.run_migrations);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_environment_overrides() {
        let _lock = ENV_LOCK.lock();
        let _env = EnvVars::set(&[
            ("JOBRUNNER__EXECUTOR__MAX_RETRIES", "7"),
            ("JOBRUNNER__EXECUTOR__ERROR_CHANNEL", "env_errors"),
            ("JOBRUNNER__DATABASE__URL", "postgres://env-host:5432/jobs"),
        ]);

        let config = Config::load().unwrap();
        assert_eq!(config.executor.max_retries, 7);
        assert_eq!(config.executor.error_channel, "env_errors");
        assert_eq!(config.database.url, "postgres://env-host:5432/jobs");
        assert_eq!(config.database.max_connections, 5);

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[executor]\nmax_retries = 5\n\n[database]\nmax_connections = 9").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.executor.max_retries, 7);
        assert_eq!(config.database.max_connections, 9);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = Config::from_file("/nonexistent/jobrunner.toml").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
    }
}
