//! SQLite-backed media store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{MediaError, MediaStore};
use super::types::MediaFile;

/// SQLite-backed media store.
pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
}

impl SqliteMediaStore {
    pub fn new(path: &Path) -> Result<Self, MediaError> {
        let conn = Connection::open(path).map_err(|e| MediaError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, MediaError> {
        let conn = Connection::open_in_memory().map_err(|e| MediaError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), MediaError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media_files (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                path TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                format TEXT NOT NULL,
                video_codec TEXT,
                audio_codec TEXT,
                width INTEGER,
                height INTEGER,
                frame_rate REAL,
                size_bytes INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_owner ON media_files(owner_id);
            "#,
        )
        .map_err(|e| MediaError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, MediaError> {
        self.conn
            .lock()
            .map_err(|_| MediaError::Database("connection mutex poisoned".to_string()))
    }

    fn row_to_media(row: &rusqlite::Row) -> rusqlite::Result<MediaFile> {
        let created_at: String = row.get(11)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    11,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(MediaFile {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            path: row.get(2)?,
            duration_secs: row.get(3)?,
            format: row.get(4)?,
            video_codec: row.get(5)?,
            audio_codec: row.get(6)?,
            width: row.get(7)?,
            height: row.get(8)?,
            frame_rate: row.get::<_, Option<f64>>(9)?.map(|f| f as f32),
            size_bytes: row.get::<_, i64>(10)?.max(0) as u64,
            created_at,
        })
    }
}

impl MediaStore for SqliteMediaStore {
    fn register(&self, media: &MediaFile) -> Result<(), MediaError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO media_files (id, owner_id, path, duration_secs, format, video_codec, audio_codec, width, height, frame_rate, size_bytes, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                media.id,
                media.owner_id,
                media.path,
                media.duration_secs,
                media.format,
                media.video_codec,
                media.audio_codec,
                media.width,
                media.height,
                media.frame_rate.map(f64::from),
                media.size_bytes as i64,
                media.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(|e| MediaError::Database(e.to_string()))?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<MediaFile>, MediaError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, owner_id, path, duration_secs, format, video_codec, audio_codec, width, height, frame_rate, size_bytes, created_at FROM media_files WHERE id = ?",
            params![id],
            Self::row_to_media,
        )
        .optional()
        .map_err(|e| MediaError::Database(e.to_string()))
    }
}
