//! Export repository.

use crate::error::MetadataResult;
use crate::models::ExportRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for zip export records.
#[async_trait]
pub trait ExportRepo: Send + Sync {
    /// Insert an export row (initially incomplete).
    async fn create_export(&self, export: &ExportRow) -> MetadataResult<()>;

    /// Mark an export complete, recording its final size.
    async fn complete_export(
        &self,
        id: Uuid,
        size_bytes: i64,
        completed_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Get an export by ID.
    async fn get_export(&self, id: Uuid) -> MetadataResult<Option<ExportRow>>;

    /// List an owner's exports, newest first.
    async fn list_exports_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<ExportRow>>;

    /// Delete an export row. Returns `true` if a row was removed.
    async fn delete_export(&self, id: Uuid) -> MetadataResult<bool>;
}
