//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("invalid byte range: start {start} >= end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid upload status: {0}")]
    InvalidStatus(String),

    #[error("invalid chunk file name: {0}")]
    InvalidChunkFileName(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
