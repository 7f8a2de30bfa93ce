//! Database row models.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// ============================================================================
// Uploads
// ============================================================================

/// A chunked upload in progress (or completed).
///
/// `upload_id` is the client-chosen identifier; it doubles as the prefix for
/// chunk object keys in storage. Counters are `i64` because SQLite stores
/// integers as signed 64-bit values.
#[derive(Debug, Clone, FromRow)]
pub struct UploadRow {
    pub upload_id: String,
    pub owner_id: String,
    pub file_name: String,
    pub mime_type: String,
    /// Total size of the assembled file as declared by the client.
    pub declared_size: i64,
    pub total_chunks: i64,
    /// Distinct chunks durably received so far.
    pub chunks_received: i64,
    /// Chunks appended to the backend object by the assembler.
    pub chunks_assembled: i64,
    /// One of: pending, processing, complete.
    pub status: String,
    /// JSON-encoded [`depot_core::UploadOptions`].
    pub options: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// ============================================================================
// Files
// ============================================================================

/// A finalized file visible in the catalog.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    pub id: Uuid,
    /// The upload this file was assembled from. Unique, so at most one file
    /// row may ever reference a given upload.
    pub upload_id: Option<String>,
    /// Stored name, also the object key in the backend.
    pub name: String,
    pub original_name: Option<String>,
    pub size_bytes: i64,
    pub mime_type: String,
    pub owner_id: String,
    pub max_views: Option<i64>,
    pub expires_at: Option<OffsetDateTime>,
    pub password_hash: Option<String>,
    pub created_at: OffsetDateTime,
}

// ============================================================================
// Exports
// ============================================================================

/// A zip export of a user's files.
#[derive(Debug, Clone, FromRow)]
pub struct ExportRow {
    pub id: Uuid,
    pub owner_id: String,
    /// Path of the archive on the export volume.
    pub path: String,
    pub total_files: i64,
    pub size_bytes: i64,
    pub completed: bool,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}
