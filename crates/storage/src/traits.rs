//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Object store abstraction over the configured backend.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's size without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Get an object as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Start a streaming upload. Writes become visible only on
    /// [`ObjectSink::finish`]; an aborted sink leaves no partial object.
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn ObjectSink>>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Total bytes currently stored by this backend.
    async fn total_size(&self) -> StorageResult<u64>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "s3",
    /// "local", "swift"). Used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// Performs a lightweight operation to verify the backend is reachable
    /// and properly configured. Called during startup before accepting work.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<time::OffsetDateTime>,
}

/// An in-progress streaming upload.
///
/// Each backend supplies its own assembly strategy behind this trait: the
/// local backend appends to a temp file and renames, S3 runs a multipart
/// upload, Swift buffers for a single PUT. Callers write ordered data and
/// must call exactly one of `finish` or `abort`.
#[async_trait]
pub trait ObjectSink: Send {
    /// Write the next run of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Commit the upload and return the total bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Abort the upload, discarding everything written so far.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
