//! CLI subcommands and the state they share.

pub mod handlers;
pub mod requeue;
pub mod run;
pub mod show;

use anyhow::{Context, Result};
use jobrunner_core::config::Config;
use jobrunner_core::db::{Database, PgJobStore};
use jobrunner_core::jobs::{register_builtin, HandlerRegistry};

use crate::output::OutputFormat;

/// Configuration and output settings shared by every command.
pub struct App {
    pub config: Config,
    pub format: OutputFormat,
}

impl App {
    pub fn new(config: Config, format: OutputFormat) -> Self {
        Self { config, format }
    }

    /// Connect to the job database, applying migrations when configured.
    pub async fn job_store(&self) -> Result<PgJobStore> {
        let db = Database::connect(&self.config.database)
            .await
            .context("Failed to connect to the job database")?;

        if self.config.database.run_migrations {
            db.migrate().await.context("Failed to apply migrations")?;
        }

        Ok(db.job_store())
    }

    /// Handlers available to this binary.
    pub fn registry(&self) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        register_builtin(&mut registry);
        registry
    }
}
