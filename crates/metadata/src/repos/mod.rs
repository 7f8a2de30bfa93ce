//! Repository traits, one per aggregate.

pub mod exports;
pub mod files;
pub mod uploads;

pub use exports::ExportRepo;
pub use files::FileRepo;
pub use uploads::UploadRepo;
