//! Object storage abstraction and backends for depot.
//!
//! This crate provides:
//! - The [`StorageBackend`] trait with streaming reads and writes
//! - Per-backend streaming upload strategies behind [`ObjectSink`]
//! - Backends: local filesystem, S3-compatible, OpenStack Swift

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{local::LocalBackend, s3::S3Backend, swift::SwiftBackend};
pub use error::{StorageError, StorageResult};
pub use traits::{ByteStream, ObjectMeta, ObjectSink, StorageBackend};

use depot_core::config::StorageConfig;
use std::sync::Arc;

/// Create a storage backend from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Local { path } => {
            let backend = LocalBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Swift {
            auth_url,
            username,
            key,
            container,
        } => {
            let backend = SwiftBackend::new(auth_url, username, key, container)?;
            Ok(Arc::new(backend))
        }
    }
}
