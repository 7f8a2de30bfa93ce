//! Upload repository.

use crate::error::MetadataResult;
use crate::models::UploadRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for chunked upload progress.
#[async_trait]
pub trait UploadRepo: Send + Sync {
    /// Create an upload row, or return the existing row when one with the
    /// same `upload_id` is already present (chunk deliveries may race on the
    /// first chunk).
    async fn create_upload(&self, upload: &UploadRow) -> MetadataResult<UploadRow>;

    /// Get an upload by ID.
    async fn get_upload(&self, upload_id: &str) -> MetadataResult<Option<UploadRow>>;

    /// Increment the received-chunk counter after a chunk has been durably
    /// written. Returns the updated row.
    async fn record_chunk_received(
        &self,
        upload_id: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<UploadRow>;

    /// Increment the assembled-chunk counter after the assembler appended a
    /// chunk to the backend object.
    async fn record_chunk_assembled(
        &self,
        upload_id: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Transition `status` from `expected` to `to`, guarded so concurrent
    /// transitions cannot both win. Returns `true` if this call applied the
    /// transition, `false` if the row was not in `expected`.
    async fn set_status(
        &self,
        upload_id: &str,
        expected: &str,
        to: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// List non-terminal uploads for an owner, oldest first.
    async fn list_pending_uploads(&self, owner_id: &str) -> MetadataResult<Vec<UploadRow>>;

    /// Delete upload rows by ID. Returns the number of rows removed; missing
    /// IDs are skipped.
    async fn delete_uploads(&self, upload_ids: &[String]) -> MetadataResult<u64>;
}
