//! File catalog repository.

use crate::error::MetadataResult;
use crate::models::FileRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for finalized files.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Insert a file row. Fails with `AlreadyExists` when another file
    /// already references the same `upload_id`; the unique index on that
    /// column makes the first finalizer win.
    async fn create_file(&self, file: &FileRow) -> MetadataResult<()>;

    /// Get a file by ID.
    async fn get_file(&self, id: Uuid) -> MetadataResult<Option<FileRow>>;

    /// Get the file produced by an upload, if it was finalized.
    async fn get_file_by_upload(&self, upload_id: &str) -> MetadataResult<Option<FileRow>>;

    /// List an owner's files, oldest first.
    async fn list_files_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<FileRow>>;

    /// Delete a file row. Returns `true` if a row was removed.
    async fn delete_file(&self, id: Uuid) -> MetadataResult<bool>;
}
