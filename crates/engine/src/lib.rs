//! The depot pipeline: chunk intake, assembly, cataloging and export.
//!
//! An outer server embeds this crate and drives it through a handful of
//! surfaces, all sharing one [`EngineState`]:
//! - [`ChunkReceiver`] accepts chunk deliveries and triggers assembly
//! - [`UploadAssembler`] streams a complete chunk set into storage
//! - [`CatalogFinalizer`] inserts the catalog row, exactly once per upload
//! - [`PendingUploads`] lists and deletes in-flight uploads
//! - [`ExportPacker`] / [`Exports`] build and manage zip exports

pub mod assembler;
pub mod error;
pub mod export;
pub mod finalizer;
pub mod notify;
pub mod pending;
pub mod receiver;
pub mod state;
pub mod transient;

pub use assembler::{AssemblyHandle, AssemblyJob, UploadAssembler};
pub use error::{EngineError, EngineResult};
pub use export::{ArchiveStream, ExportPacker, Exports, FlowGauge};
pub use finalizer::{CatalogFinalizer, FinalizeRequest};
pub use notify::{Notifier, NoopNotifier, WebhookNotifier};
pub use pending::PendingUploads;
pub use receiver::{ChunkReceiver, ChunkUpload, ProgressSnapshot};
pub use state::{EngineState, UploadLocks};
pub use transient::TransientChunks;
