//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{JobError, JobFilter, JobStore};
use super::types::{Job, JobStatus, OutputSettings, Priority};

const JOB_COLUMNS: &str = "id, owner_id, input_file_id, output_filename, output_path, settings, \
     priority, status, progress_percentage, error_message, created_at, updated_at, started_at, \
     completed_at, estimated_duration_secs, actual_duration_secs";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transcoding_jobs (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                input_file_id TEXT NOT NULL,
                output_filename TEXT NOT NULL,
                output_path TEXT,
                settings TEXT NOT NULL,
                priority TEXT NOT NULL,
                priority_rank INTEGER NOT NULL,
                status TEXT NOT NULL,
                progress_percentage INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                estimated_duration_secs INTEGER,
                actual_duration_secs INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_owner ON transcoding_jobs(owner_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON transcoding_jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON transcoding_jobs(created_at);
            "#,
        )
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push("owner_id = ?");
            params.push(Box::new(owner_id.clone()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let settings_json: String = row.get(5)?;
        let priority: String = row.get(6)?;
        let status: String = row.get(7)?;

        let settings: OutputSettings =
            serde_json::from_str(&settings_json).map_err(|e| conversion_error(5, e))?;
        let priority: Priority = priority
            .parse()
            .map_err(|e: String| conversion_error(6, e))?;
        let status: JobStatus = status.parse().map_err(|e: String| conversion_error(7, e))?;

        Ok(Job {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            input_file_id: row.get(2)?,
            output_filename: row.get(3)?,
            output_path: row.get(4)?,
            settings,
            priority,
            status,
            progress_percentage: row.get::<_, i64>(8)?.clamp(0, 100) as u8,
            error_message: row.get(9)?,
            created_at: parse_timestamp(10, row.get(10)?)?,
            updated_at: parse_timestamp(11, row.get(11)?)?,
            started_at: row
                .get::<_, Option<String>>(12)?
                .map(|s| parse_timestamp(12, s))
                .transpose()?,
            completed_at: row
                .get::<_, Option<String>>(13)?
                .map(|s| parse_timestamp(13, s))
                .transpose()?,
            estimated_duration_secs: row.get::<_, Option<i64>>(14)?.map(|v| v.max(0) as u64),
            actual_duration_secs: row.get::<_, Option<i64>>(15)?.map(|v| v.max(0) as u64),
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed width keeps lexical order equal to chronological order.
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
}

impl JobStore for SqliteJobStore {
    fn save(&self, job: &Job) -> Result<(), JobError> {
        let settings_json = serde_json::to_string(&job.settings)
            .map_err(|e| JobError::Serialization(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO transcoding_jobs ({}, priority_rank) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                JOB_COLUMNS
            ),
            params![
                job.id,
                job.owner_id,
                job.input_file_id,
                job.output_filename,
                job.output_path,
                settings_json,
                job.priority.as_str(),
                job.status.as_str(),
                job.progress_percentage as i64,
                job.error_message,
                format_timestamp(&job.created_at),
                format_timestamp(&job.updated_at),
                job.started_at.as_ref().map(format_timestamp),
                job.completed_at.as_ref().map(format_timestamp),
                job.estimated_duration_secs.map(|v| v as i64),
                job.actual_duration_secs.map(|v| v as i64),
                job.priority.rank() as i64,
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM transcoding_jobs WHERE id = ?", JOB_COLUMNS),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM transcoding_jobs {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)
            .map_err(|e| JobError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobError::Database(e.to_string()))
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM transcoding_jobs {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| JobError::Database(e.to_string()))
    }

    fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, JobError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM transcoding_jobs WHERE status = ? \
                 ORDER BY priority_rank ASC, created_at ASC",
                JOB_COLUMNS
            ))
            .map_err(|e| JobError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![status.as_str()], Self::row_to_job)
            .map_err(|e| JobError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobError::Database(e.to_string()))
    }
}
