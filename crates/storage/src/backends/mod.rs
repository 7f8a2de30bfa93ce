//! Storage backend implementations.

pub mod local;
pub mod s3;
pub mod swift;
