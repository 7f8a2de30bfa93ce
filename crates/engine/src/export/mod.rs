//! Export pipeline: packing, backpressure accounting and record management.

pub mod flow;
pub mod packer;
pub mod records;

pub use flow::FlowGauge;
pub use packer::ExportPacker;
pub use records::{ArchiveStream, Exports};
