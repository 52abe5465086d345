//! # Content Record Repository
//!
//! Persistence for [`ContentRecord`]s.
//!
//! ## Overview
//!
//! - Point lookups by identifier
//! - Upserts that keep `created_at` and never move `last_refreshed` backwards
//! - Batched writes and soft deletes, each inside one transaction
//! - Filtered listings by mime type (exact or `type/*`) and drive

use crate::error::{LibraryError, Result};
use crate::models::{ContentRecord, RecordFilter};
use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

const SELECT_COLUMNS: &str = r#"
    SELECT id, drive, relative_path, title, mime_type, file_size,
           last_refreshed, publication_date, physical_media, archive_entries,
           source_url, is_deleted, created_at, updated_at
    FROM content_records
"#;

const UPSERT_SQL: &str = r#"
    INSERT INTO content_records (
        id, drive, relative_path, title, mime_type, file_size,
        last_refreshed, publication_date, physical_media, archive_entries,
        source_url, is_deleted, created_at, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        drive = excluded.drive,
        relative_path = excluded.relative_path,
        title = excluded.title,
        mime_type = excluded.mime_type,
        file_size = excluded.file_size,
        last_refreshed = MAX(content_records.last_refreshed, excluded.last_refreshed),
        publication_date = excluded.publication_date,
        physical_media = excluded.physical_media,
        archive_entries = excluded.archive_entries,
        source_url = excluded.source_url,
        is_deleted = excluded.is_deleted,
        updated_at = excluded.updated_at
"#;

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for content record persistence
#[async_trait]
pub trait ContentRecordRepository: Send + Sync {
    /// Find a record by identifier, deleted or not.
    async fn find(&self, id: &str) -> Result<Option<ContentRecord>>;

    /// Find every record among `ids` that exists.
    async fn find_many(&self, ids: &[String]) -> Result<Vec<ContentRecord>>;

    /// Insert or update a single record.
    ///
    /// # Errors
    ///
    /// [`LibraryError::InvalidInput`] when the record fails validation.
    async fn upsert(&self, record: &ContentRecord) -> Result<()>;

    /// Upsert a batch of records in one transaction.
    ///
    /// Either every record is written or none is.
    async fn apply_batch(&self, records: &[ContentRecord]) -> Result<()>;

    /// Mark records as deleted in one transaction.
    ///
    /// Returns how many live records were flipped.
    async fn soft_delete(&self, ids: &[String], updated_at: i64) -> Result<u64>;

    /// List records matching `filter`, ordered by identifier.
    async fn list_all(&self, filter: &RecordFilter) -> Result<Vec<ContentRecord>>;

    /// Identifiers of live records owned by any of `drives`.
    async fn live_ids_on(&self, drives: &[String]) -> Result<Vec<String>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of ContentRecordRepository
#[derive(Clone)]
pub struct SqliteContentRecordRepository {
    pool: SqlitePool,
}

impl SqliteContentRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate(record: &ContentRecord) -> Result<()> {
        record.validate().map_err(|message| LibraryError::InvalidInput {
            field: "ContentRecord".to_string(),
            message,
        })
    }

    async fn upsert_on(conn: &mut SqliteConnection, record: &ContentRecord) -> Result<()> {
        let archive_entries = record
            .archive_entries
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(UPSERT_SQL)
            .bind(&record.id)
            .bind(&record.drive)
            .bind(&record.relative_path)
            .bind(&record.title)
            .bind(&record.mime_type)
            .bind(record.file_size)
            .bind(record.last_refreshed)
            .bind(record.publication_date)
            .bind(record.physical_media)
            .bind(archive_entries)
            .bind(&record.source_url)
            .bind(record.is_deleted)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(conn)
            .await?;

        Ok(())
    }
}

/// Database row representation of a content record
#[derive(Debug, FromRow)]
struct ContentRecordRow {
    id: String,
    drive: String,
    relative_path: String,
    title: String,
    mime_type: String,
    file_size: i64,
    last_refreshed: i64,
    publication_date: Option<i64>,
    physical_media: bool,
    archive_entries: Option<String>,
    source_url: Option<String>,
    is_deleted: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ContentRecordRow> for ContentRecord {
    type Error = LibraryError;

    fn try_from(row: ContentRecordRow) -> Result<Self> {
        let archive_entries = row
            .archive_entries
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()?;

        Ok(ContentRecord {
            id: row.id,
            drive: row.drive,
            relative_path: row.relative_path,
            title: row.title,
            mime_type: row.mime_type,
            file_size: row.file_size,
            last_refreshed: row.last_refreshed,
            publication_date: row.publication_date,
            physical_media: row.physical_media,
            archive_entries,
            source_url: row.source_url,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_mime_clause(builder: &mut QueryBuilder<'_, Sqlite>, mime_types: &[String]) {
    if mime_types.is_empty() || mime_types.iter().any(|m| m == "*" || m == "*/*") {
        return;
    }

    builder.push(" AND (");
    let mut separated = builder.separated(" OR ");
    for pattern in mime_types {
        match pattern.strip_suffix("/*") {
            Some(prefix) => {
                separated.push("mime_type LIKE ");
                separated.push_bind_unseparated(format!("{prefix}/%"));
            }
            None => {
                separated.push("mime_type = ");
                separated.push_bind_unseparated(pattern.clone());
            }
        }
    }
    builder.push(")");
}

#[async_trait]
impl ContentRecordRepository for SqliteContentRecordRepository {
    async fn find(&self, id: &str) -> Result<Option<ContentRecord>> {
        let row = sqlx::query_as::<_, ContentRecordRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ContentRecord::try_from).transpose()
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<ContentRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        builder.push(") ORDER BY id");

        let rows = builder
            .build_query_as::<ContentRecordRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ContentRecord::try_from).collect()
    }

    async fn upsert(&self, record: &ContentRecord) -> Result<()> {
        Self::validate(record)?;
        let mut conn = self.pool.acquire().await?;
        Self::upsert_on(&mut *conn, record).await?;
        debug!(identifier = %record.id, "Upserted content record");
        Ok(())
    }

    async fn apply_batch(&self, records: &[ContentRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        for record in records {
            Self::validate(record)?;
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            Self::upsert_on(&mut *tx, record).await?;
        }
        tx.commit().await?;

        debug!(count = records.len(), "Applied content record batch");
        Ok(())
    }

    async fn soft_delete(&self, ids: &[String], updated_at: i64) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for id in ids {
            let result = sqlx::query(
                "UPDATE content_records SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
            )
            .bind(updated_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            affected += result.rows_affected();
        }
        tx.commit().await?;

        debug!(count = affected, "Soft-deleted content records");
        Ok(affected)
    }

    async fn list_all(&self, filter: &RecordFilter) -> Result<Vec<ContentRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        builder.push(" WHERE 1 = 1");
        if !filter.include_deleted {
            builder.push(" AND is_deleted = 0");
        }
        if let Some(drive) = &filter.drive {
            builder.push(" AND drive = ");
            builder.push_bind(drive.clone());
        }
        push_mime_clause(&mut builder, &filter.mime_types);
        builder.push(" ORDER BY id");

        let rows = builder
            .build_query_as::<ContentRecordRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ContentRecord::try_from).collect()
    }

    async fn live_ids_on(&self, drives: &[String]) -> Result<Vec<String>> {
        if drives.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id FROM content_records WHERE is_deleted = 0 AND drive IN (");
        let mut separated = builder.separated(", ");
        for drive in drives {
            separated.push_bind(drive.clone());
        }
        builder.push(") ORDER BY id");

        let ids = builder
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
