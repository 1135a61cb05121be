//! Jobrunner CLI - execute and inspect queued background jobs.
//!
//! Provides run, show, requeue, and handler listing commands.

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobrunner_core::config::Config;
use jobrunner_core::telemetry;

use commands::{handlers, requeue, run, show, App};
use output::OutputFormat;

/// Jobrunner - background job executor
#[derive(Parser)]
#[command(
    name = "jobrunner",
    version,
    about = "Jobrunner - background job executor",
    long_about = "Runs a single queued background job to completion with bounded retry, \
                  and inspects or requeues stored jobs.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "JOBRUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overrides the configured one
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a job until it completes or exhausts its retries
    Run(run::RunArgs),

    /// Show a stored job
    Show(show::ShowArgs),

    /// Reset a job to pending with no attempts recorded
    Requeue(requeue::RequeueArgs),

    /// List registered job handlers
    Handlers,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let format = cli.output;
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            if matches!(format, OutputFormat::Table) {
                output::print_info("Run with RUST_LOG=debug for more detail");
            }
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    telemetry::init_logging(&config.logging).context("Failed to initialize logging")?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting jobrunner");

    let app = App::new(config, cli.output);

    match cli.command {
        Commands::Run(args) => run::execute(args, &app).await,
        Commands::Show(args) => show::execute(args, &app).await.map(|_| ExitCode::SUCCESS),
        Commands::Requeue(args) => requeue::execute(args, &app).await.map(|_| ExitCode::SUCCESS),
        Commands::Handlers => handlers::execute(&app).map(|_| ExitCode::SUCCESS),
    }
}
