//! Durable job store
//!
//! Sqlite persistence for durable task submissions. A durable job row is
//! written before the task starts, updated when it reaches a terminal
//! state, and listed on startup so interrupted work is re-run by the next
//! process. Results stay queryable by task id after a restart.

use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::Path;

use crate::error::{DatabaseError, Error, Result};
use crate::types::{FailureKind, TaskId, TaskState};

/// Persistent status of a durable job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted, not yet started
    Pending,
    /// Fetch in flight when last persisted
    Running,
    /// Terminal: succeeded
    Succeeded,
    /// Terminal: failed
    Failed,
    /// Terminal: cancelled by the caller
    Cancelled,
}

impl JobStatus {
    /// Convert integer status code to JobStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => JobStatus::Pending,
            1 => JobStatus::Running,
            2 => JobStatus::Succeeded,
            3 => JobStatus::Failed,
            4 => JobStatus::Cancelled,
            _ => JobStatus::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert JobStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Succeeded => 2,
            JobStatus::Failed => 3,
            JobStatus::Cancelled => 4,
        }
    }

    /// Whether the status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A durable job row
#[derive(Clone, Debug, FromRow)]
pub struct JobRecord {
    /// Task identifier (assigned by the runner, not the database)
    pub id: i64,
    /// De-duplication key
    pub key: String,
    /// Fetch input
    pub input: String,
    /// Integer status code (see [`JobStatus`])
    pub status: i32,
    /// Fetched value, for succeeded jobs
    pub result: Option<String>,
    /// Failure classification, for failed jobs
    pub error_kind: Option<String>,
    /// Error message, for failed jobs
    pub error_message: Option<String>,
    /// Unix timestamp of acceptance
    pub created_at: i64,
    /// Unix timestamp of the last recorded start (None if never started)
    pub started_at: Option<i64>,
    /// Unix timestamp of the terminal transition (None while in flight)
    pub completed_at: Option<i64>,
}

impl JobRecord {
    /// Reconstruct the task state this row describes
    ///
    /// `Pending`/`Running` rows both map to `Pending`: a job interrupted
    /// mid-run is re-run from scratch on the next startup.
    pub fn state(&self) -> TaskState {
        match JobStatus::from_i32(self.status) {
            JobStatus::Pending | JobStatus::Running => TaskState::Pending,
            JobStatus::Succeeded => TaskState::Succeeded {
                value: self.result.clone().unwrap_or_default(),
            },
            JobStatus::Failed => TaskState::Failed {
                kind: self
                    .error_kind
                    .as_deref()
                    .map(FailureKind::parse)
                    .unwrap_or(FailureKind::Network),
                message: self.error_message.clone().unwrap_or_default(),
            },
            JobStatus::Cancelled => TaskState::Cancelled,
        }
    }
}

/// Sqlite-backed durable job store
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the job database and run migrations
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY,
                key TEXT NOT NULL,
                input TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                result TEXT,
                error_kind TEXT,
                error_message TEXT,
                created_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create jobs table: {}",
                e
            )))
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to create status index: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Insert a new pending job
    pub async fn insert_job(&self, id: TaskId, key: &str, input: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO jobs (id, key, input, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(input)
        .bind(JobStatus::Pending.to_i32())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert job: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Mark a job as running
    pub async fn mark_job_running(&self, id: TaskId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query("UPDATE jobs SET status = ?, started_at = ? WHERE id = ?")
            .bind(JobStatus::Running.to_i32())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to mark job running: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Record a job's terminal state
    pub async fn complete_job(&self, id: TaskId, state: &TaskState) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let (status, result, error_kind, error_message) = match state {
            TaskState::Succeeded { value } => {
                (JobStatus::Succeeded, Some(value.as_str()), None, None)
            }
            TaskState::Failed { kind, message } => (
                JobStatus::Failed,
                None,
                Some(kind.as_str()),
                Some(message.as_str()),
            ),
            TaskState::Cancelled => (JobStatus::Cancelled, None, None, None),
            TaskState::Pending | TaskState::Running => {
                return Err(Error::Other(format!(
                    "cannot persist non-terminal state for job {}",
                    id
                )));
            }
        };

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, result = ?, error_kind = ?, error_message = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.to_i32())
        .bind(result)
        .bind(error_kind)
        .bind(error_message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to complete job: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: TaskId) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRecord>(
            r#"
            SELECT id, key, input, status, result, error_kind, error_message,
                   created_at, started_at, completed_at
            FROM jobs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get job: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List jobs that never reached a terminal state (restored on startup)
    pub async fn pending_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, JobRecord>(
            r#"
            SELECT id, key, input, status, result, error_kind, error_message,
                   created_at, started_at, completed_at
            FROM jobs
            WHERE status IN (?, ?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(JobStatus::Pending.to_i32())
        .bind(JobStatus::Running.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list pending jobs: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Highest task id ever assigned (0 for an empty store)
    ///
    /// Used on startup to seed the in-memory id counter past persisted ids.
    pub async fn max_job_id(&self) -> Result<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query max job id: {}",
                    e
                )))
            })?;

        Ok(max.unwrap_or(0))
    }

    /// Delete terminal jobs completed before the given Unix timestamp
    ///
    /// Returns the number of rows removed.
    pub async fn purge_completed(&self, before: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE completed_at IS NOT NULL AND completed_at < ?",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to purge completed jobs: {}",
                e
            )))
        })?;

        Ok(result.rows_affected())
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
