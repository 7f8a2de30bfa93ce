//! Mock backends and stores for failure-path tests.

use async_trait::async_trait;
use bytes::Bytes;
use depot_metadata::{
    ExportRepo, ExportRow, FileRepo, FileRow, MetadataError, MetadataResult, MetadataStore,
    UploadRepo, UploadRow,
};
use depot_storage::{ByteStream, ObjectMeta, ObjectSink, StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Delegates to a real backend but can be armed to fail every sink write,
/// simulating a backend outage during assembly.
pub struct FlakyBackend {
    inner: Arc<dyn StorageBackend>,
    fail_writes: AtomicBool,
}

impl FlakyBackend {
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn ObjectSink>> {
        let sink = self.inner.put_stream(key).await?;
        if self.fail_writes.load(Ordering::SeqCst) {
            Ok(Box::new(FailingSink { inner: Some(sink) }))
        } else {
            Ok(sink)
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn total_size(&self) -> StorageResult<u64> {
        self.inner.total_size().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Sink whose writes always fail; abort cleans up through the real sink.
struct FailingSink {
    inner: Option<Box<dyn ObjectSink>>,
}

#[async_trait]
impl ObjectSink for FailingSink {
    async fn write(&mut self, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::other(
            "injected write failure",
        )))
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        if let Some(inner) = self.inner.take() {
            inner.abort().await?;
        }
        Err(StorageError::Io(std::io::Error::other(
            "injected write failure",
        )))
    }

    async fn abort(mut self: Box<Self>) -> StorageResult<()> {
        if let Some(inner) = self.inner.take() {
            inner.abort().await?;
        }
        Ok(())
    }
}

/// Delegates to a real metadata store but can be armed to fail
/// `record_chunk_assembled`, simulating a database outage mid-assembly.
pub struct FlakyMetadata {
    inner: Arc<dyn MetadataStore>,
    fail_chunk_assembled: AtomicBool,
}

impl FlakyMetadata {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            fail_chunk_assembled: AtomicBool::new(false),
        }
    }

    pub fn fail_chunk_assembled(&self, on: bool) {
        self.fail_chunk_assembled.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl UploadRepo for FlakyMetadata {
    async fn create_upload(&self, upload: &UploadRow) -> MetadataResult<UploadRow> {
        self.inner.create_upload(upload).await
    }

    async fn get_upload(&self, upload_id: &str) -> MetadataResult<Option<UploadRow>> {
        self.inner.get_upload(upload_id).await
    }

    async fn record_chunk_received(
        &self,
        upload_id: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<UploadRow> {
        self.inner.record_chunk_received(upload_id, updated_at).await
    }

    async fn record_chunk_assembled(
        &self,
        upload_id: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        if self.fail_chunk_assembled.load(Ordering::SeqCst) {
            return Err(MetadataError::Io(std::io::Error::other(
                "injected metadata failure",
            )));
        }
        self.inner.record_chunk_assembled(upload_id, updated_at).await
    }

    async fn set_status(
        &self,
        upload_id: &str,
        expected: &str,
        to: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<bool> {
        self.inner.set_status(upload_id, expected, to, updated_at).await
    }

    async fn list_pending_uploads(&self, owner_id: &str) -> MetadataResult<Vec<UploadRow>> {
        self.inner.list_pending_uploads(owner_id).await
    }

    async fn delete_uploads(&self, upload_ids: &[String]) -> MetadataResult<u64> {
        self.inner.delete_uploads(upload_ids).await
    }
}

#[async_trait]
impl FileRepo for FlakyMetadata {
    async fn create_file(&self, file: &FileRow) -> MetadataResult<()> {
        self.inner.create_file(file).await
    }

    async fn get_file(&self, id: Uuid) -> MetadataResult<Option<FileRow>> {
        self.inner.get_file(id).await
    }

    async fn get_file_by_upload(&self, upload_id: &str) -> MetadataResult<Option<FileRow>> {
        self.inner.get_file_by_upload(upload_id).await
    }

    async fn list_files_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<FileRow>> {
        self.inner.list_files_by_owner(owner_id).await
    }

    async fn delete_file(&self, id: Uuid) -> MetadataResult<bool> {
        self.inner.delete_file(id).await
    }
}

#[async_trait]
impl ExportRepo for FlakyMetadata {
    async fn create_export(&self, export: &ExportRow) -> MetadataResult<()> {
        self.inner.create_export(export).await
    }

    async fn complete_export(
        &self,
        id: Uuid,
        size_bytes: i64,
        completed_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        self.inner.complete_export(id, size_bytes, completed_at).await
    }

    async fn get_export(&self, id: Uuid) -> MetadataResult<Option<ExportRow>> {
        self.inner.get_export(id).await
    }

    async fn list_exports_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<ExportRow>> {
        self.inner.list_exports_by_owner(owner_id).await
    }

    async fn delete_export(&self, id: Uuid) -> MetadataResult<bool> {
        self.inner.delete_export(id).await
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadata {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}
