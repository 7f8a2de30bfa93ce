//! Assembly of staged chunks into a stored object.

use crate::error::{EngineError, EngineResult};
use crate::finalizer::{CatalogFinalizer, FinalizeRequest};
use crate::state::EngineState;
use depot_core::ids::UploadId;
use depot_core::upload::{UploadOptions, UploadStatus};
use depot_metadata::FileRow;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

/// Parameters for one assembly run.
///
/// Everything the assembler needs travels in this struct; nothing is read
/// from ambient state.
#[derive(Debug)]
pub struct AssemblyJob {
    pub upload_id: UploadId,
    pub owner_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub declared_size: u64,
    pub options: UploadOptions,
}

impl AssemblyJob {
    /// Rebuild a job from the stored progress record, e.g. to retry assembly
    /// after a backend failure or a process restart.
    pub async fn for_upload(state: &EngineState, upload_id: &UploadId) -> EngineResult<Self> {
        let row = state
            .metadata
            .get_upload(upload_id.as_str())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("upload {upload_id}")))?;
        Ok(Self {
            upload_id: upload_id.clone(),
            owner_id: row.owner_id,
            file_name: row.file_name,
            mime_type: row.mime_type,
            declared_size: row.declared_size as u64,
            options: UploadOptions::from_json(&row.options)?,
        })
    }
}

/// Awaitable completion of a spawned assembly, resolving to the finalized
/// catalog record.
#[derive(Debug)]
pub struct AssemblyHandle {
    inner: JoinHandle<EngineResult<FileRow>>,
}

impl AssemblyHandle {
    pub(crate) fn spawn(state: Arc<EngineState>, job: AssemblyJob) -> Self {
        let inner = tokio::spawn(async move { assemble(state, job).await });
        Self { inner }
    }

    /// Wait for the assembly to finish.
    pub async fn wait(self) -> EngineResult<FileRow> {
        self.inner
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?
    }
}

/// Streams staged chunks in order into the storage backend, then finalizes.
pub struct UploadAssembler;

impl UploadAssembler {
    /// Spawn an assembly run as a background task.
    pub fn spawn(state: Arc<EngineState>, job: AssemblyJob) -> AssemblyHandle {
        AssemblyHandle::spawn(state, job)
    }
}

#[instrument(skip(state, job), fields(upload_id = %job.upload_id, declared_size = job.declared_size))]
async fn assemble(state: Arc<EngineState>, job: AssemblyJob) -> EngineResult<FileRow> {
    let _guard = state.locks.acquire(&job.upload_id).await;

    let chunks = state.transient.list_chunks(&job.upload_id).await?;
    validate_coverage(&chunks, job.declared_size)?;

    // Coverage is proven; any failure past this point is a backend problem
    // and must leave no partial object behind.
    let object_key = object_name(&job.file_name);
    let mut sink = state.storage.put_stream(&object_key).await?;
    let mut bytes_written = 0u64;

    for (range, path) in &chunks {
        if range.start != bytes_written {
            sink.abort().await?;
            return Err(EngineError::AssemblyCorrupt(format!(
                "chunk start {} does not match write offset {bytes_written}",
                range.start
            )));
        }
        let data = match state.transient.read_chunk(path).await {
            Ok(data) => data,
            Err(err) => {
                sink.abort().await?;
                return Err(err);
            }
        };
        let len = data.len() as u64;
        if let Err(err) = sink.write(data).await {
            if let Err(abort_err) = sink.abort().await {
                tracing::warn!(error = %abort_err, "sink abort failed after write error");
            }
            return Err(EngineError::BackendWrite(err.to_string()));
        }
        bytes_written += len;
        if let Err(err) = state
            .metadata
            .record_chunk_assembled(job.upload_id.as_str(), OffsetDateTime::now_utc())
            .await
        {
            if let Err(abort_err) = sink.abort().await {
                tracing::warn!(error = %abort_err, "sink abort failed after metadata error");
            }
            return Err(err.into());
        }
    }

    let size = sink
        .finish()
        .await
        .map_err(|e| EngineError::BackendWrite(e.to_string()))?;

    state
        .metadata
        .set_status(
            job.upload_id.as_str(),
            UploadStatus::Processing.as_str(),
            UploadStatus::Complete.as_str(),
            OffsetDateTime::now_utc(),
        )
        .await?;
    let removed = state.transient.remove_chunks(&job.upload_id).await?;
    tracing::info!(
        object_key = %object_key,
        size,
        chunks = removed,
        "upload assembled"
    );

    let finalizer = CatalogFinalizer::new(state.clone());
    finalizer
        .finalize(FinalizeRequest {
            upload_id: Some(job.upload_id),
            name: object_key,
            size_bytes: size,
            mime_type: job.mime_type,
            owner_id: job.owner_id,
            options: job.options,
        })
        .await
}

/// Check that the sorted chunk set covers exactly `[0, declared_size)`.
fn validate_coverage(
    chunks: &[(depot_core::chunk::ChunkRange, std::path::PathBuf)],
    declared_size: u64,
) -> EngineResult<()> {
    let mut expected_start = 0u64;
    for (range, _) in chunks {
        if range.start > expected_start {
            return Err(EngineError::AssemblyCorrupt(format!(
                "missing bytes [{expected_start}, {})",
                range.start
            )));
        }
        if range.start < expected_start {
            return Err(EngineError::AssemblyCorrupt(format!(
                "overlap at byte {}",
                range.start
            )));
        }
        expected_start = range.end;
    }
    if expected_start != declared_size {
        return Err(EngineError::AssemblyCorrupt(format!(
            "coverage ends at {expected_start}, declared size is {declared_size}"
        )));
    }
    Ok(())
}

/// Generate the stored object name, keeping the original extension so the
/// catalog entry remains recognizable.
fn object_name(file_name: &str) -> String {
    let stem = Uuid::new_v4().simple().to_string();
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => format!("{stem}.{ext}"),
        _ => stem,
    }
}
