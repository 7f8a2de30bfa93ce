//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ExportRepo, FileRepo, UploadRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: UploadRepo + FileRepo + ExportRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under concurrent tasks.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "sqlite metadata store ready");

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS uploads (
    upload_id        TEXT PRIMARY KEY,
    owner_id         TEXT NOT NULL,
    file_name        TEXT NOT NULL,
    mime_type        TEXT NOT NULL,
    declared_size    INTEGER NOT NULL,
    total_chunks     INTEGER NOT NULL,
    chunks_received  INTEGER NOT NULL DEFAULT 0,
    chunks_assembled INTEGER NOT NULL DEFAULT 0,
    status           TEXT NOT NULL DEFAULT 'pending',
    options          TEXT NOT NULL DEFAULT '{}',
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_uploads_owner_status ON uploads (owner_id, status);

CREATE TABLE IF NOT EXISTS files (
    id            BLOB PRIMARY KEY,
    upload_id     TEXT UNIQUE,
    name          TEXT NOT NULL,
    original_name TEXT,
    size_bytes    INTEGER NOT NULL,
    mime_type     TEXT NOT NULL,
    owner_id      TEXT NOT NULL,
    max_views     INTEGER,
    expires_at    TEXT,
    password_hash TEXT,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_owner ON files (owner_id, created_at);

CREATE TABLE IF NOT EXISTS exports (
    id           BLOB PRIMARY KEY,
    owner_id     TEXT NOT NULL,
    path         TEXT NOT NULL,
    total_files  INTEGER NOT NULL,
    size_bytes   INTEGER NOT NULL DEFAULT 0,
    completed    INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    completed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_exports_owner ON exports (owner_id, created_at);
"#;

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // raw_sql: the schema script holds several statements
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::{ExportRow, FileRow, UploadRow};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl UploadRepo for SqliteStore {
        async fn create_upload(&self, upload: &UploadRow) -> MetadataResult<UploadRow> {
            let result = sqlx::query(
                "INSERT INTO uploads (upload_id, owner_id, file_name, mime_type, declared_size, \
                 total_chunks, chunks_received, chunks_assembled, status, options, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&upload.upload_id)
            .bind(&upload.owner_id)
            .bind(&upload.file_name)
            .bind(&upload.mime_type)
            .bind(upload.declared_size)
            .bind(upload.total_chunks)
            .bind(upload.chunks_received)
            .bind(upload.chunks_assembled)
            .bind(&upload.status)
            .bind(&upload.options)
            .bind(upload.created_at)
            .bind(upload.updated_at)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(upload.clone()),
                Err(err) if MetadataError::is_unique_violation(&err) => {
                    // Deliveries racing on the first chunk: return the winner's row.
                    self.get_upload(&upload.upload_id).await?.ok_or_else(|| {
                        MetadataError::NotFound(format!("upload {}", upload.upload_id))
                    })
                }
                Err(err) => Err(err.into()),
            }
        }

        async fn get_upload(&self, upload_id: &str) -> MetadataResult<Option<UploadRow>> {
            let row = sqlx::query_as::<_, UploadRow>("SELECT * FROM uploads WHERE upload_id = ?")
                .bind(upload_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn record_chunk_received(
            &self,
            upload_id: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<UploadRow> {
            let result = sqlx::query(
                "UPDATE uploads SET chunks_received = chunks_received + 1, updated_at = ? \
                 WHERE upload_id = ?",
            )
            .bind(updated_at)
            .bind(upload_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("upload {upload_id}")));
            }
            self.get_upload(upload_id)
                .await?
                .ok_or_else(|| MetadataError::NotFound(format!("upload {upload_id}")))
        }

        async fn record_chunk_assembled(
            &self,
            upload_id: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE uploads SET chunks_assembled = chunks_assembled + 1, updated_at = ? \
                 WHERE upload_id = ?",
            )
            .bind(updated_at)
            .bind(upload_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("upload {upload_id}")));
            }
            Ok(())
        }

        async fn set_status(
            &self,
            upload_id: &str,
            expected: &str,
            to: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE uploads SET status = ?, updated_at = ? \
                 WHERE upload_id = ? AND status = ?",
            )
            .bind(to)
            .bind(updated_at)
            .bind(upload_id)
            .bind(expected)
            .execute(&self.pool)
            .await?;

            Ok(result.rows_affected() > 0)
        }

        async fn list_pending_uploads(&self, owner_id: &str) -> MetadataResult<Vec<UploadRow>> {
            let rows = sqlx::query_as::<_, UploadRow>(
                "SELECT * FROM uploads WHERE owner_id = ? AND status != 'complete' \
                 ORDER BY created_at ASC",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_uploads(&self, upload_ids: &[String]) -> MetadataResult<u64> {
            let mut deleted = 0u64;
            for upload_id in upload_ids {
                let result = sqlx::query("DELETE FROM uploads WHERE upload_id = ?")
                    .bind(upload_id)
                    .execute(&self.pool)
                    .await?;
                deleted += result.rows_affected();
            }
            Ok(deleted)
        }
    }

    #[async_trait]
    impl FileRepo for SqliteStore {
        async fn create_file(&self, file: &FileRow) -> MetadataResult<()> {
            let result = sqlx::query(
                "INSERT INTO files (id, upload_id, name, original_name, size_bytes, mime_type, \
                 owner_id, max_views, expires_at, password_hash, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(file.id)
            .bind(&file.upload_id)
            .bind(&file.name)
            .bind(&file.original_name)
            .bind(file.size_bytes)
            .bind(&file.mime_type)
            .bind(&file.owner_id)
            .bind(file.max_views)
            .bind(file.expires_at)
            .bind(&file.password_hash)
            .bind(file.created_at)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(err) if MetadataError::is_unique_violation(&err) => {
                    Err(MetadataError::AlreadyExists(format!(
                        "file for upload {:?}",
                        file.upload_id
                    )))
                }
                Err(err) => Err(err.into()),
            }
        }

        async fn get_file(&self, id: Uuid) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_file_by_upload(&self, upload_id: &str) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE upload_id = ?")
                .bind(upload_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_files_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<FileRow>> {
            let rows = sqlx::query_as::<_, FileRow>(
                "SELECT * FROM files WHERE owner_id = ? ORDER BY created_at ASC",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_file(&self, id: Uuid) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM files WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl ExportRepo for SqliteStore {
        async fn create_export(&self, export: &ExportRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO exports (id, owner_id, path, total_files, size_bytes, completed, \
                 created_at, completed_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(export.id)
            .bind(&export.owner_id)
            .bind(&export.path)
            .bind(export.total_files)
            .bind(export.size_bytes)
            .bind(export.completed)
            .bind(export.created_at)
            .bind(export.completed_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn complete_export(
            &self,
            id: Uuid,
            size_bytes: i64,
            completed_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE exports SET completed = 1, size_bytes = ?, completed_at = ? WHERE id = ?",
            )
            .bind(size_bytes)
            .bind(completed_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("export {id}")));
            }
            Ok(())
        }

        async fn get_export(&self, id: Uuid) -> MetadataResult<Option<ExportRow>> {
            let row = sqlx::query_as::<_, ExportRow>("SELECT * FROM exports WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_exports_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<ExportRow>> {
            let rows = sqlx::query_as::<_, ExportRow>(
                "SELECT * FROM exports WHERE owner_id = ? ORDER BY created_at DESC",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_export(&self, id: Uuid) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM exports WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }
    }
}
