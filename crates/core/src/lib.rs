//! Core domain types and shared logic for the depot upload pipeline.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Upload, file and export identifiers
//! - Chunk byte ranges and transient file naming
//! - Upload progress lifecycle and catalog options
//! - Content hashing
//! - Application configuration

pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;
pub mod ids;
pub mod upload;

pub use chunk::{ChunkRange, chunk_file_name, parse_chunk_file_name};
pub use config::{
    AppConfig, ExportCompression, ExportConfig, MetadataConfig, NotifyConfig, StorageConfig,
    UploadConfig,
};
pub use error::{Error, Result};
pub use hash::ContentHash;
pub use ids::{ExportId, UploadId};
pub use upload::{UploadOptions, UploadStatus};

/// Default maximum chunk size: 96 MiB
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 96 * 1024 * 1024;

/// Frame size for streaming reads: 64 KiB
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Default export backpressure threshold: 8 MiB
pub const DEFAULT_FLOW_THRESHOLD: u64 = 8 * 1024 * 1024;
