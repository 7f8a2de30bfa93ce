//! Zip export of a user's catalog.

use crate::error::{EngineError, EngineResult};
use crate::export::flow::FlowGauge;
use crate::state::EngineState;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use bytes::Bytes;
use depot_core::config::ExportCompression;
use depot_core::ids::ExportId;
use depot_metadata::{ExportRow, FileRow};
use futures::io::AsyncWriteExt as _;
use futures::StreamExt;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt as _;
use tokio::sync::mpsc;
use tracing::instrument;

/// Streams every catalog object of an owner into a zip archive on the
/// export volume, under explicit backpressure accounting.
pub struct ExportPacker {
    state: Arc<EngineState>,
}

impl ExportPacker {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    /// Export all of an owner's files into a fresh archive.
    ///
    /// A failed export leaves nothing behind: the partial archive is removed
    /// and the export record deleted.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn export_all(&self, owner_id: &str) -> EngineResult<ExportRow> {
        let files = self.state.metadata.list_files_by_owner(owner_id).await?;
        if files.is_empty() {
            return Err(EngineError::NoFiles(owner_id.to_string()));
        }

        let export_id = ExportId::new();
        let dir = &self.state.config.exports.dir;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{export_id}.zip"));

        let row = ExportRow {
            id: *export_id.as_uuid(),
            owner_id: owner_id.to_string(),
            path: path.to_string_lossy().into_owned(),
            total_files: files.len() as i64,
            size_bytes: 0,
            completed: false,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
        };
        self.state.metadata.create_export(&row).await?;

        match self.pack(&path, &files).await {
            Ok(size) => {
                self.state
                    .metadata
                    .complete_export(row.id, size as i64, OffsetDateTime::now_utc())
                    .await?;
                tracing::info!(export_id = %export_id, size, files = files.len(), "export completed");
                self.state
                    .metadata
                    .get_export(row.id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("export {export_id}")))
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&path).await;
                if let Err(cleanup) = self.state.metadata.delete_export(row.id).await {
                    tracing::warn!(export_id = %export_id, error = %cleanup, "failed to delete export record");
                }
                Err(err)
            }
        }
    }

    async fn pack(&self, path: &Path, files: &[FileRow]) -> EngineResult<u64> {
        let gauge = Arc::new(FlowGauge::new(self.state.config.exports.flow_threshold));
        let file = tokio::fs::File::create(path).await?;
        let (size, file) = self.pack_into(file, gauge, files).await?;
        file.sync_all().await?;
        Ok(size)
    }

    /// Stream the archive for `files` into an arbitrary sink, pacing the
    /// producer on `gauge`. Returns the byte count drained and the sink.
    pub async fn pack_into<W>(
        &self,
        sink: W,
        gauge: Arc<FlowGauge>,
        files: &[FileRow],
    ) -> EngineResult<(u64, W)>
    where
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        let drain = tokio::spawn(drain_frames(sink, rx, gauge.clone()));

        // The writer owns `tx`; when it is dropped (success or error) the
        // channel closes and the drain task finishes.
        let archive_result = self.write_archive(tx, gauge, files).await;
        let drained = drain
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;

        archive_result?;
        Ok(drained?)
    }

    async fn write_archive(
        &self,
        tx: mpsc::UnboundedSender<Bytes>,
        gauge: Arc<FlowGauge>,
        files: &[FileRow],
    ) -> EngineResult<()> {
        let compression = match self.state.config.exports.compression {
            ExportCompression::Stored => Compression::Stored,
            ExportCompression::Deflate => Compression::Deflate,
        };
        let mut zip = ZipFileWriter::with_tokio(GaugedWriter {
            tx,
            gauge: gauge.clone(),
        });
        let mut used = HashSet::new();

        for file in files {
            let entry_name = disambiguate(
                file.original_name.as_deref().unwrap_or(&file.name),
                &mut used,
            );
            let builder = ZipEntryBuilder::new(entry_name.into(), compression);
            let mut entry = zip
                .write_entry_stream(builder)
                .await
                .map_err(|e| EngineError::Archive(e.to_string()))?;

            let mut source = self
                .state
                .storage
                .get_stream(&file.name)
                .await
                .map_err(|e| EngineError::ExportRead(format!("{}: {e}", file.name)))?;
            loop {
                gauge.ready().await;
                let Some(frame) = source.next().await else {
                    break;
                };
                let frame =
                    frame.map_err(|e| EngineError::ExportRead(format!("{}: {e}", file.name)))?;
                entry
                    .write_all(&frame)
                    .await
                    .map_err(|e| EngineError::Archive(e.to_string()))?;
            }
            entry
                .close()
                .await
                .map_err(|e| EngineError::Archive(e.to_string()))?;
        }

        zip.close()
            .await
            .map_err(|e| EngineError::Archive(e.to_string()))?;
        Ok(())
    }
}

/// Drains produced frames into the sink, accounting every byte. Frames are
/// still accounted after a sink failure so a producer parked on the gauge
/// is released before the error surfaces.
async fn drain_frames<W>(
    mut sink: W,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    gauge: Arc<FlowGauge>,
) -> io::Result<(u64, W)>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut written = 0u64;
    let mut failure: Option<io::Error> = None;
    while let Some(frame) = rx.recv().await {
        if failure.is_none() {
            match sink.write_all(&frame).await {
                Ok(()) => written += frame.len() as u64,
                Err(err) => failure = Some(err),
            }
        }
        gauge.drained(frame.len() as u64);
    }
    if let Some(err) = failure {
        return Err(err);
    }
    sink.flush().await?;
    Ok((written, sink))
}

/// Channel-backed `AsyncWrite` that records every produced frame on the
/// gauge. Writes never block; pacing happens at the producer via
/// [`FlowGauge::ready`].
struct GaugedWriter {
    tx: mpsc::UnboundedSender<Bytes>,
    gauge: Arc<FlowGauge>,
}

impl tokio::io::AsyncWrite for GaugedWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.tx.send(Bytes::copy_from_slice(buf)).is_err() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive drain task ended",
            )));
        }
        self.gauge.pushed(buf.len() as u64);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Pick a unique entry name, appending `-1`, `-2`, ... before the extension
/// on collision.
fn disambiguate(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
        _ => (name.to_string(), String::new()),
    };
    let mut counter = 1u32;
    loop {
        let candidate = format!("{stem}-{counter}{ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}
