//! Chunk intake.

use crate::assembler::{AssemblyHandle, AssemblyJob, UploadAssembler};
use crate::error::{EngineError, EngineResult};
use crate::state::EngineState;
use bytes::Bytes;
use depot_core::chunk::ChunkRange;
use depot_core::hash::ContentHash;
use depot_core::ids::UploadId;
use depot_core::upload::{UploadOptions, UploadStatus};
use depot_metadata::UploadRow;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

/// One delivered chunk plus the upload-level facts the client repeats on
/// every delivery. Deliveries may arrive in any order and must agree on the
/// repeated facts.
#[derive(Debug)]
pub struct ChunkUpload {
    pub upload_id: UploadId,
    pub range: ChunkRange,
    pub payload: Bytes,
    /// Total size of the final file in bytes.
    pub declared_size: u64,
    /// Number of chunks the client will send in total.
    pub total_chunks: u32,
    /// Client's final-chunk marker. Informational: assembly triggers on the
    /// received count reaching `total_chunks`, whichever delivery that is.
    pub is_last: bool,
    pub file_name: String,
    pub mime_type: String,
    pub owner_id: String,
    pub options: UploadOptions,
}

/// Progress of an upload after a delivery was handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub upload_id: UploadId,
    pub status: UploadStatus,
    pub chunks_received: u64,
    pub chunks_assembled: u64,
    pub total_chunks: u64,
}

impl ProgressSnapshot {
    fn from_row(row: &UploadRow) -> EngineResult<Self> {
        Ok(Self {
            upload_id: UploadId::parse(&row.upload_id)?,
            status: UploadStatus::parse(&row.status)?,
            chunks_received: row.chunks_received as u64,
            chunks_assembled: row.chunks_assembled as u64,
            total_chunks: row.total_chunks as u64,
        })
    }
}

/// Accepts chunk deliveries, stages them durably and triggers assembly once
/// the chunk set is complete.
pub struct ChunkReceiver {
    state: Arc<EngineState>,
}

impl ChunkReceiver {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    /// Handle one chunk delivery.
    ///
    /// Returns the progress after this delivery and, when this delivery
    /// completed the chunk set, a handle to the spawned assembly.
    #[instrument(
        skip(self, upload),
        fields(
            upload_id = %upload.upload_id,
            start = upload.range.start,
            end = upload.range.end,
        )
    )]
    pub async fn receive(
        &self,
        upload: ChunkUpload,
    ) -> EngineResult<(ProgressSnapshot, Option<AssemblyHandle>)> {
        self.check_limits(&upload)?;

        let state = &self.state;
        let _guard = state.locks.acquire(&upload.upload_id).await;
        let now = OffsetDateTime::now_utc();

        let row = state
            .metadata
            .create_upload(&new_upload_row(&upload, now)?)
            .await?;

        if row.status == UploadStatus::Complete.as_str() {
            return Err(EngineError::ChunkRejected(format!(
                "upload {} is already complete",
                upload.upload_id
            )));
        }
        if row.total_chunks != i64::from(upload.total_chunks) {
            return Err(EngineError::ChunkRejected(format!(
                "delivery declares {} total chunks, upload was created with {}",
                upload.total_chunks, row.total_chunks
            )));
        }
        if row.declared_size != upload.declared_size as i64 {
            return Err(EngineError::ChunkRejected(format!(
                "delivery declares {} bytes, upload was created with {}",
                upload.declared_size, row.declared_size
            )));
        }
        if row.owner_id != upload.owner_id {
            return Err(EngineError::ChunkRejected(format!(
                "delivery owner {:?} does not match the upload's owner",
                upload.owner_id
            )));
        }

        // Re-delivery: byte-identical is acknowledged without double
        // counting; divergent content is a conflicting duplicate.
        if let Some(stored) = state
            .transient
            .chunk_digest(&upload.upload_id, upload.range)
            .await?
        {
            if stored == ContentHash::compute(&upload.payload) {
                tracing::debug!("duplicate chunk, digest match");
                return Ok((ProgressSnapshot::from_row(&row)?, None));
            }
            return Err(EngineError::ChunkRejected(format!(
                "range [{}, {}) was already received with different content",
                upload.range.start, upload.range.end
            )));
        }

        state
            .transient
            .write_chunk(&upload.upload_id, upload.range, &upload.payload)
            .await?;

        state
            .metadata
            .set_status(
                upload.upload_id.as_str(),
                UploadStatus::Pending.as_str(),
                UploadStatus::Processing.as_str(),
                now,
            )
            .await?;
        let row = state
            .metadata
            .record_chunk_received(upload.upload_id.as_str(), now)
            .await?;
        let snapshot = ProgressSnapshot::from_row(&row)?;

        // `>=`, not `==`: a gap-filling chunk sent after a corrupt assembly
        // attempt pushes the count past the declared total and must still
        // re-trigger.
        let handle = if row.chunks_received >= row.total_chunks {
            tracing::info!(chunks = row.chunks_received, "chunk set complete, assembling");
            // Assembly runs against the recorded declaration, not this
            // delivery's copy of it.
            let job = AssemblyJob {
                upload_id: upload.upload_id,
                owner_id: row.owner_id,
                file_name: row.file_name,
                mime_type: row.mime_type,
                declared_size: row.declared_size as u64,
                options: UploadOptions::from_json(&row.options)?,
            };
            Some(UploadAssembler::spawn(state.clone(), job))
        } else {
            None
        };

        Ok((snapshot, handle))
    }

    /// Re-trigger assembly for an upload whose chunk set is already
    /// complete, e.g. after a transient backend failure or a restart.
    #[instrument(skip(self), fields(upload_id = %upload_id))]
    pub async fn resume(&self, upload_id: &UploadId) -> EngineResult<AssemblyHandle> {
        let row = self
            .state
            .metadata
            .get_upload(upload_id.as_str())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("upload {upload_id}")))?;
        if row.status == UploadStatus::Complete.as_str() {
            return Err(EngineError::ChunkRejected(format!(
                "upload {upload_id} is already complete"
            )));
        }
        if row.chunks_received < row.total_chunks {
            return Err(EngineError::ChunkRejected(format!(
                "upload {upload_id} has {} of {} chunks",
                row.chunks_received, row.total_chunks
            )));
        }

        let job = AssemblyJob::for_upload(&self.state, upload_id).await?;
        Ok(UploadAssembler::spawn(self.state.clone(), job))
    }

    fn check_limits(&self, upload: &ChunkUpload) -> EngineResult<()> {
        let limits = &self.state.config.uploads;

        if upload.total_chunks == 0 {
            return Err(EngineError::ChunkRejected(
                "total_chunks must be at least 1".to_string(),
            ));
        }
        if upload.payload.len() as u64 != upload.range.len() {
            return Err(EngineError::ChunkRejected(format!(
                "payload is {} bytes, range covers {}",
                upload.payload.len(),
                upload.range.len()
            )));
        }
        if !upload.range.fits_within(upload.declared_size) {
            return Err(EngineError::ChunkRejected(format!(
                "range [{}, {}) exceeds declared size {}",
                upload.range.start, upload.range.end, upload.declared_size
            )));
        }
        if upload.range.len() > limits.max_chunk_size {
            return Err(EngineError::ChunkRejected(format!(
                "chunk of {} bytes exceeds limit {}",
                upload.range.len(),
                limits.max_chunk_size
            )));
        }
        if limits.max_upload_size != 0 && upload.declared_size > limits.max_upload_size {
            return Err(EngineError::ChunkRejected(format!(
                "declared size {} exceeds limit {}",
                upload.declared_size, limits.max_upload_size
            )));
        }
        Ok(())
    }
}

fn new_upload_row(upload: &ChunkUpload, now: OffsetDateTime) -> EngineResult<UploadRow> {
    Ok(UploadRow {
        upload_id: upload.upload_id.as_str().to_string(),
        owner_id: upload.owner_id.clone(),
        file_name: upload.file_name.clone(),
        mime_type: upload.mime_type.clone(),
        declared_size: upload.declared_size as i64,
        total_chunks: i64::from(upload.total_chunks),
        chunks_received: 0,
        chunks_assembled: 0,
        status: UploadStatus::Pending.as_str().to_string(),
        options: upload.options.to_json()?,
        created_at: now,
        updated_at: now,
    })
}
