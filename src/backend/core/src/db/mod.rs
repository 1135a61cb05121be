//! Database layer for the job runner.
//!
//! Uses PostgreSQL for persistent storage with sqlx. Jobs live in the
//! `background_jobs` table created by the bundled migrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{ErrorCode, ErrorContext, Result, RunnerError};
use crate::jobs::{JobId, JobParameters, JobRecord, JobStatus, JobStore, JobUpdate};

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected to job database"
        );
        Ok(Self { pool })
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Job database migrations applied");
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Job store backed by this pool.
    pub fn job_store(&self) -> PgJobStore {
        PgJobStore::new(self.pool.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Store
// ═══════════════════════════════════════════════════════════════════════════════

/// [`JobStore`] over the `background_jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new job.
    pub async fn insert(&self, record: &JobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO background_jobs (id, target, method, parameters, status, retry_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.target)
        .bind(&record.method)
        .bind(
            serde_json::to_string(&record.parameters.to_value())
                .with_error_code(ErrorCode::SerializationError)?,
        )
        .bind(record.status.as_str())
        .bind(to_db_count(record.retry_count)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, target, method, parameters, status, retry_count, created_at, updated_at
            FROM background_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRecord::try_from).transpose()
    }

    async fn update(&self, job_id: &JobId, update: JobUpdate) -> Result<()> {
        let retry_count = update.retry_count.map(to_db_count).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE background_jobs
            SET status = COALESCE($2, status),
                retry_count = COALESCE($3, retry_count),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_str())
        .bind(update.status.map(|s| s.as_str()))
        .bind(retry_count)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RunnerError::job_not_found(job_id));
        }
        Ok(())
    }
}

fn to_db_count(count: u32) -> Result<i32> {
    i32::try_from(count).map_err(|_| {
        RunnerError::new(ErrorCode::SerializationError, "retry_count out of range")
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub target: String,
    pub method: String,
    pub parameters: Option<String>,
    pub status: String,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = RunnerError;

    fn try_from(row: JobRow) -> Result<Self> {
        let status: JobStatus = row.status.parse()?;
        let retry_count = u32::try_from(row.retry_count).map_err(|_| {
            RunnerError::with_internal(
                ErrorCode::SerializationError,
                "Invalid job row",
                format!("negative retry_count {}", row.retry_count),
            )
        })?;

        Ok(JobRecord {
            id: JobId::from(row.id),
            target: row.target,
            method: row.method,
            parameters: JobParameters::parse(row.parameters.as_deref()),
            status,
            retry_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
