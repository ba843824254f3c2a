//! SQLite-backed analysis store (durable)

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pb_common::config::StorageBackend;
use pb_common::models::{AnalysisRecord, Prediction};
use pb_common::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::Duration;

use super::{AnalysisStore, HistorySlice};
use crate::pagination::HistoryWindow;

/// Durable store in a single `analyses` table
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and ensure the schema exists
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        tracing::debug!("Analysis database ready: {}", db_path.display());
        Ok(store)
    }

    /// Private in-memory database (one connection kept open for the pool's lifetime)
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                duration REAL,
                prediction TEXT NOT NULL CHECK (prediction IN ('healthy', 'copd', 'pneumonia')),
                confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
                uploaded_at TEXT NOT NULL,
                processed_at TEXT NOT NULL,
                processing_time INTEGER,
                model_version TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_analyses_user_uploaded
             ON analyses (user_id, uploaded_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Fixed-width RFC 3339 (microseconds, `Z`), so text order is time order
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn record_from_row(row: &SqliteRow) -> Result<AnalysisRecord> {
    let prediction: String = row.try_get("prediction")?;
    let prediction: Prediction = prediction
        .parse()
        .map_err(|e| Error::Internal(format!("Corrupt analysis row: {}", e)))?;

    let uploaded_at: String = row.try_get("uploaded_at")?;
    let processed_at: String = row.try_get("processed_at")?;

    Ok(AnalysisRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        file_name: row.try_get("file_name")?,
        file_size: row.try_get::<i64, _>("file_size")?.max(0) as u64,
        mime_type: row.try_get("mime_type")?,
        duration: row.try_get("duration")?,
        prediction,
        confidence: row.try_get("confidence")?,
        uploaded_at: decode_timestamp("uploaded_at", &uploaded_at)?,
        processed_at: decode_timestamp("processed_at", &processed_at)?,
        processing_time: row.try_get("processing_time")?,
        model_version: row.try_get("model_version")?,
    })
}

#[async_trait]
impl AnalysisStore for SqliteStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Sqlite
    }

    async fn insert(&self, record: AnalysisRecord) -> Result<()> {
        let file_size = i64::try_from(record.file_size)
            .map_err(|_| Error::InvalidInput(format!("fileSize too large: {}", record.file_size)))?;

        sqlx::query(
            r#"
            INSERT INTO analyses (
                id, user_id, file_name, file_size, mime_type, duration,
                prediction, confidence, uploaded_at, processed_at,
                processing_time, model_version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.file_name)
        .bind(file_size)
        .bind(&record.mime_type)
        .bind(record.duration)
        .bind(record.prediction.as_str())
        .bind(record.confidence)
        .bind(encode_timestamp(&record.uploaded_at))
        .bind(encode_timestamp(&record.processed_at))
        .bind(record.processing_time)
        .bind(&record.model_version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_by_user(&self, user_id: &str, window: HistoryWindow) -> Result<HistorySlice> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analyses WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, file_name, file_size, mime_type, duration,
                   prediction, confidence, uploaded_at, processed_at,
                   processing_time, model_version
            FROM analyses
            WHERE user_id = ?
            ORDER BY uploaded_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(window.limit))
        .bind(i64::from(window.skip))
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(HistorySlice {
            records,
            total: total.max(0) as u64,
        })
    }
}
