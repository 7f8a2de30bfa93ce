//! Transient chunk files.
//!
//! Received chunks are staged on local disk under the configured temp
//! directory with deterministic names, so an interrupted upload survives a
//! process restart and re-delivered chunks can be compared byte-for-byte.

use crate::error::EngineResult;
use bytes::Bytes;
use depot_core::chunk::{chunk_file_name, parse_chunk_file_name, ChunkRange};
use depot_core::hash::ContentHash;
use depot_core::ids::UploadId;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Staging area for chunk files, one flat directory.
pub struct TransientChunks {
    dir: PathBuf,
}

impl TransientChunks {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding the chunk files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chunk_path(&self, upload_id: &UploadId, range: ChunkRange) -> PathBuf {
        self.dir.join(chunk_file_name(upload_id, range))
    }

    /// Durably stage a chunk: write to a temp sibling, fsync, then rename
    /// into the deterministic name.
    pub async fn write_chunk(
        &self,
        upload_id: &UploadId,
        range: ChunkRange,
        payload: &Bytes,
    ) -> EngineResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let final_path = self.chunk_path(upload_id, range);
        let temp_path = self.dir.join(format!(".tmp.{}", Uuid::new_v4()));

        let mut file = tokio::fs::File::create(&temp_path).await?;
        let write_result = write_and_sync(&mut file, payload).await;
        drop(file);
        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        tokio::fs::rename(&temp_path, &final_path).await?;
        Ok(())
    }

    /// Read a staged chunk back.
    pub async fn read_chunk(&self, path: &Path) -> EngineResult<Bytes> {
        Ok(Bytes::from(tokio::fs::read(path).await?))
    }

    /// Digest of a staged chunk, or `None` when the range was never staged.
    pub async fn chunk_digest(
        &self,
        upload_id: &UploadId,
        range: ChunkRange,
    ) -> EngineResult<Option<ContentHash>> {
        let path = self.chunk_path(upload_id, range);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(ContentHash::compute(&data))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// List the staged chunks of one upload, sorted by range start.
    pub async fn list_chunks(
        &self,
        upload_id: &UploadId,
    ) -> EngineResult<Vec<(ChunkRange, PathBuf)>> {
        let mut chunks = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(chunks),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Ok((id, range)) = parse_chunk_file_name(name) else {
                continue;
            };
            if id == *upload_id {
                chunks.push((range, entry.path()));
            }
        }
        chunks.sort_by_key(|(range, _)| range.start);
        Ok(chunks)
    }

    /// Remove all staged chunks of one upload. Returns the count removed.
    pub async fn remove_chunks(&self, upload_id: &UploadId) -> EngineResult<u64> {
        let mut removed = 0u64;
        for (_, path) in self.list_chunks(upload_id).await? {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }
}

async fn write_and_sync(file: &mut tokio::fs::File, payload: &Bytes) -> std::io::Result<()> {
    file.write_all(payload).await?;
    file.sync_all().await
}
