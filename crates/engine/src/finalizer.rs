//! Catalog finalization.

use crate::error::{EngineError, EngineResult};
use crate::state::EngineState;
use depot_core::hash::ContentHash;
use depot_core::ids::UploadId;
use depot_core::upload::UploadOptions;
use depot_metadata::{FileRow, MetadataError};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

/// Everything needed to catalog an assembled object.
#[derive(Debug)]
pub struct FinalizeRequest {
    /// Upload the object was assembled from, when applicable. At most one
    /// catalog row may ever reference a given upload.
    pub upload_id: Option<UploadId>,
    /// Stored name, also the object key in the backend.
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub owner_id: String,
    pub options: UploadOptions,
}

/// Inserts catalog rows and fires notifications.
pub struct CatalogFinalizer {
    state: Arc<EngineState>,
}

impl CatalogFinalizer {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    /// Insert the catalog row for an assembled object.
    ///
    /// The unique index on `upload_id` makes the first finalizer win; any
    /// later attempt for the same upload fails with `FinalizeConflict`.
    #[instrument(skip(self, request), fields(owner_id = %request.owner_id, name = %request.name))]
    pub async fn finalize(&self, request: FinalizeRequest) -> EngineResult<FileRow> {
        let options = request.options;
        let row = FileRow {
            id: Uuid::new_v4(),
            upload_id: request.upload_id.as_ref().map(|id| id.as_str().to_string()),
            name: request.name,
            original_name: options.original_name,
            size_bytes: request.size_bytes as i64,
            mime_type: options.mime_type.unwrap_or(request.mime_type),
            owner_id: request.owner_id,
            max_views: options.max_views.map(i64::from),
            expires_at: options.expires_at,
            password_hash: options
                .password
                .map(|p| ContentHash::compute(p.as_bytes()).to_hex()),
            created_at: OffsetDateTime::now_utc(),
        };

        match self.state.metadata.create_file(&row).await {
            Ok(()) => {}
            Err(MetadataError::AlreadyExists(_)) => {
                return Err(EngineError::FinalizeConflict(
                    row.upload_id.unwrap_or(row.name),
                ));
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            file_id = %row.id,
            size_bytes = row.size_bytes,
            "file finalized"
        );

        // Fire-and-forget: a notification failure never fails finalization.
        let notifier = self.state.notifier.clone();
        let notify_row = row.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.file_finalized(&notify_row).await {
                tracing::warn!(
                    notifier = notifier.name(),
                    file_id = %notify_row.id,
                    error = %err,
                    "finalization notification failed"
                );
            }
        });

        Ok(row)
    }
}
