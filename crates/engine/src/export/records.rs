//! Management surface for finished exports.

use crate::error::{EngineError, EngineResult};
use crate::state::EngineState;
use depot_core::ids::ExportId;
use depot_core::STREAM_CHUNK_SIZE;
use depot_metadata::ExportRow;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// Streaming read of a finished archive.
pub type ArchiveStream = ReaderStream<tokio::fs::File>;

/// Lists, opens and deletes export records and their archive files.
pub struct Exports {
    state: Arc<EngineState>,
}

impl Exports {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    /// List an owner's exports, newest first.
    pub async fn list(&self, owner_id: &str) -> EngineResult<Vec<ExportRow>> {
        Ok(self.state.metadata.list_exports_by_owner(owner_id).await?)
    }

    /// Open a completed archive for streaming.
    pub async fn open(&self, owner_id: &str, id: ExportId) -> EngineResult<ArchiveStream> {
        let row = self.get_owned(owner_id, id).await?;
        if !row.completed {
            return Err(EngineError::ExportNotReady(id.to_string()));
        }
        let file = tokio::fs::File::open(&row.path).await?;
        Ok(ReaderStream::with_capacity(file, STREAM_CHUNK_SIZE))
    }

    /// Delete an export record and its archive file. A missing archive file
    /// is not an error; a missing record returns `false`.
    #[instrument(skip(self), fields(owner_id = %owner_id, export_id = %id))]
    pub async fn delete(&self, owner_id: &str, id: ExportId) -> EngineResult<bool> {
        let row = match self.state.metadata.get_export(*id.as_uuid()).await? {
            Some(row) if row.owner_id == owner_id => row,
            _ => return Ok(false),
        };

        match tokio::fs::remove_file(&row.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(self.state.metadata.delete_export(row.id).await?)
    }

    async fn get_owned(&self, owner_id: &str, id: ExportId) -> EngineResult<ExportRow> {
        self.state
            .metadata
            .get_export(*id.as_uuid())
            .await?
            .filter(|row| row.owner_id == owner_id)
            .ok_or_else(|| EngineError::NotFound(format!("export {id}")))
    }
}
