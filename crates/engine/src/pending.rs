//! Management surface for in-flight uploads.

use crate::error::EngineResult;
use crate::state::EngineState;
use depot_core::ids::UploadId;
use depot_metadata::UploadRow;
use std::sync::Arc;
use tracing::instrument;

/// Lists and deletes non-terminal uploads.
pub struct PendingUploads {
    state: Arc<EngineState>,
}

impl PendingUploads {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    /// List an owner's non-terminal uploads, oldest first.
    pub async fn list(&self, owner_id: &str) -> EngineResult<Vec<UploadRow>> {
        Ok(self.state.metadata.list_pending_uploads(owner_id).await?)
    }

    /// Delete uploads and their staged chunks. Ids that do not exist or
    /// belong to another owner are skipped; returns the number of progress
    /// records actually removed, so the call is idempotent.
    #[instrument(skip(self, upload_ids), fields(owner_id = %owner_id, count = upload_ids.len()))]
    pub async fn delete(&self, owner_id: &str, upload_ids: &[UploadId]) -> EngineResult<u64> {
        let mut removed = 0u64;
        for upload_id in upload_ids {
            let _guard = self.state.locks.acquire(upload_id).await;

            let Some(row) = self.state.metadata.get_upload(upload_id.as_str()).await? else {
                continue;
            };
            if row.owner_id != owner_id {
                continue;
            }

            self.state.transient.remove_chunks(upload_id).await?;
            removed += self
                .state
                .metadata
                .delete_uploads(&[upload_id.as_str().to_string()])
                .await?;
        }
        Ok(removed)
    }
}
