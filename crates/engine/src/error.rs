//! Engine error types.

use thiserror::Error;

/// Pipeline errors.
///
/// Retryability matters here: `BackendWrite` and `AssemblyCorrupt` leave
/// transient chunks and the progress record in place so the client can
/// re-send and re-trigger; `ChunkRejected` mutates nothing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("chunk rejected: {0}")]
    ChunkRejected(String),

    #[error("assembly aborted, chunk set does not cover the upload: {0}")]
    AssemblyCorrupt(String),

    #[error("backend write failed: {0}")]
    BackendWrite(String),

    #[error("upload already finalized: {0}")]
    FinalizeConflict(String),

    #[error("no files to export for owner {0}")]
    NoFiles(String),

    #[error("export source read failed: {0}")]
    ExportRead(String),

    #[error("export {0} is not completed")]
    ExportNotReady(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Storage(#[from] depot_storage::StorageError),

    #[error(transparent)]
    Metadata(#[from] depot_metadata::MetadataError),

    #[error(transparent)]
    Core(#[from] depot_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Stable machine-readable code for the error class. Suitable for
    /// structured log fields and outer-layer error mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChunkRejected(_) => "chunk_rejected",
            Self::AssemblyCorrupt(_) => "assembly_corrupt",
            Self::BackendWrite(_) => "backend_write",
            Self::FinalizeConflict(_) => "finalize_conflict",
            Self::NoFiles(_) => "no_files",
            Self::ExportRead(_) => "export_read",
            Self::ExportNotReady(_) => "export_not_ready",
            Self::NotFound(_) => "not_found",
            Self::Archive(_) => "archive",
            Self::Task(_) => "task",
            Self::Storage(_) => "storage",
            Self::Metadata(_) => "metadata",
            Self::Core(_) => "core",
            Self::Io(_) => "io",
        }
    }
}
