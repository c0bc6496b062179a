// src/core/database.rs
//! Job schedules and validated profiles, behind parameterized queries

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

use crate::types::{Analysis, FewShotExample, JobSchedule, MissionParameters, PersistedRecord, RunStatus};

// ===== Core Database Connection Management =====

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                crate::utils::ensure_dir_exists(parent).await?;
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        info!(
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database, single connection so every query sees the same data
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn jobs(&self) -> JobScheduleRepository<'_> {
        JobScheduleRepository::new(&self.pool)
    }

    pub fn profiles(&self) -> ProfileRepository<'_> {
        ProfileRepository::new(&self.pool)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_schedules (
                job_name TEXT PRIMARY KEY,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                last_run_status TEXT,
                last_run_message TEXT,
                next_run_timestamp_ms INTEGER,
                mission_parameters TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS validated_profiles (
                profile_url TEXT PRIMARY KEY,
                profile_text TEXT NOT NULL,
                mission_data TEXT NOT NULL,
                analysis_data TEXT NOT NULL,
                alignment_score INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_validated_profiles_score ON validated_profiles(alignment_score);",
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}

// ===== Job Schedules =====

#[derive(Debug, sqlx::FromRow)]
struct JobScheduleRow {
    job_name: String,
    is_active: bool,
    last_run_status: Option<String>,
    last_run_message: Option<String>,
    next_run_timestamp_ms: Option<i64>,
    mission_parameters: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<JobScheduleRow> for JobSchedule {
    fn from(row: JobScheduleRow) -> Self {
        let mission_parameters = row.mission_parameters.as_deref().and_then(|raw| {
            match MissionParameters::from_json_str(raw) {
                Ok(params) => Some(params),
                Err(e) => {
                    warn!(
                        "Ignoring invalid mission parameters on job {}: {:#}",
                        row.job_name, e
                    );
                    None
                }
            }
        });

        JobSchedule {
            job_name: row.job_name,
            is_active: row.is_active,
            last_run_status: row.last_run_status,
            last_run_message: row.last_run_message,
            next_run_timestamp_ms: row.next_run_timestamp_ms,
            mission_parameters,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct JobScheduleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobScheduleRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_name(&self, job_name: &str) -> Result<Option<JobSchedule>> {
        let row = sqlx::query_as::<_, JobScheduleRow>(
            r#"
            SELECT job_name, is_active, last_run_status, last_run_message,
                   next_run_timestamp_ms, mission_parameters, created_at, updated_at
            FROM job_schedules
            WHERE job_name = ?
            "#,
        )
        .bind(job_name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(JobSchedule::from))
    }

    /// Create the job or replace its criteria; run history is left untouched
    pub async fn upsert(
        &self,
        job_name: &str,
        mission: &MissionParameters,
        is_active: bool,
        next_run_timestamp_ms: Option<i64>,
    ) -> Result<()> {
        let now = Utc::now();
        let mission_json =
            serde_json::to_string(mission).context("Failed to serialize mission parameters")?;

        sqlx::query(
            r#"
            INSERT INTO job_schedules
                (job_name, is_active, next_run_timestamp_ms, mission_parameters, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_name) DO UPDATE SET
                is_active = excluded.is_active,
                next_run_timestamp_ms = excluded.next_run_timestamp_ms,
                mission_parameters = excluded.mission_parameters,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(job_name)
        .bind(is_active)
        .bind(next_run_timestamp_ms)
        .bind(mission_json)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        info!("Saved job schedule: {}", job_name);
        Ok(())
    }

    /// Store the outcome of a run and when the job becomes due again
    pub async fn record_run(
        &self,
        job_name: &str,
        status: RunStatus,
        message: &str,
        next_run_timestamp_ms: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE job_schedules
            SET last_run_status = ?, last_run_message = ?,
                next_run_timestamp_ms = ?, updated_at = ?
            WHERE job_name = ?
            "#,
        )
        .bind(status.as_str())
        .bind(message)
        .bind(next_run_timestamp_ms)
        .bind(Utc::now())
        .bind(job_name)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// ===== Validated Profiles =====

pub struct ProfileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProfileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, profile_url: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM validated_profiles WHERE profile_url = ?)",
        )
        .bind(profile_url)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert or overwrite the record keyed by `profile_url`
    pub async fn upsert(
        &self,
        profile_url: &str,
        profile_text: &str,
        mission: &MissionParameters,
        analysis: &Analysis,
    ) -> Result<()> {
        let mission_json =
            serde_json::to_string(mission).context("Failed to serialize mission parameters")?;
        let analysis_json =
            serde_json::to_string(analysis).context("Failed to serialize analysis")?;

        sqlx::query(
            r#"
            INSERT INTO validated_profiles
                (profile_url, profile_text, mission_data, analysis_data, alignment_score, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(profile_url) DO UPDATE SET
                profile_text = excluded.profile_text,
                mission_data = excluded.mission_data,
                analysis_data = excluded.analysis_data,
                alignment_score = excluded.alignment_score,
                created_at = excluded.created_at
            "#,
        )
        .bind(profile_url)
        .bind(profile_text)
        .bind(mission_json)
        .bind(analysis_json)
        .bind(analysis.alignment_score as i64)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_url(&self, profile_url: &str) -> Result<Option<PersistedRecord>> {
        let record = sqlx::query_as::<_, PersistedRecord>(
            r#"
            SELECT profile_url, profile_text, mission_data, analysis_data, alignment_score, created_at
            FROM validated_profiles
            WHERE profile_url = ?
            "#,
        )
        .bind(profile_url)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Highest-scored records, used as worked examples in the prompt
    pub async fn high_scoring_examples(&self, limit: u32) -> Result<Vec<FewShotExample>> {
        let examples = sqlx::query_as::<_, FewShotExample>(
            r#"
            SELECT profile_text, analysis_data
            FROM validated_profiles
            ORDER BY alignment_score DESC, created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await?;

        Ok(examples)
    }

    pub async fn top_results(&self, limit: u32) -> Result<Vec<PersistedRecord>> {
        let records = sqlx::query_as::<_, PersistedRecord>(
            r#"
            SELECT profile_url, profile_text, mission_data, analysis_data, alignment_score, created_at
            FROM validated_profiles
            ORDER BY alignment_score DESC, created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM validated_profiles")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
