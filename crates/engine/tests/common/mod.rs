//! Shared fixtures for engine integration tests.

pub mod mocks;

use bytes::Bytes;
use depot_core::chunk::ChunkRange;
use depot_core::config::{AppConfig, MetadataConfig, StorageConfig};
use depot_core::ids::UploadId;
use depot_core::upload::UploadOptions;
use depot_engine::receiver::ChunkUpload;
use depot_engine::state::EngineState;
use depot_engine::notify::NoopNotifier;
use depot_metadata::MetadataStore;
use depot_storage::StorageBackend;
use std::path::Path;
use std::sync::Arc;

/// Fully local engine state rooted in `root`.
pub async fn test_state(root: &Path) -> Arc<EngineState> {
    EngineState::for_testing(root).await.unwrap()
}

/// Fully local test configuration rooted in `root`.
pub fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::for_testing();
    config.storage = StorageConfig::Local {
        path: root.join("storage"),
    };
    config.metadata = MetadataConfig::Sqlite {
        path: root.join("metadata.db"),
    };
    config.uploads.temp_dir = root.join("tmp");
    config.exports.dir = root.join("exports");
    config
}

/// Engine state built from an already-prepared configuration.
pub async fn state_from_config(config: AppConfig) -> Arc<EngineState> {
    let storage = depot_storage::from_config(&config.storage).await.unwrap();
    let metadata = depot_metadata::from_config(&config.metadata).await.unwrap();
    Arc::new(EngineState::new(
        Arc::new(config),
        storage,
        metadata,
        Arc::new(NoopNotifier),
    ))
}

/// Engine state with a caller-provided storage backend, everything else
/// local under `root`.
pub async fn state_with_backend(
    root: &Path,
    storage: Arc<dyn StorageBackend>,
) -> Arc<EngineState> {
    let mut config = test_config(root);
    config.storage = StorageConfig::Local {
        path: root.join("unused-storage"),
    };

    let metadata = depot_metadata::from_config(&config.metadata).await.unwrap();
    Arc::new(EngineState::new(
        Arc::new(config),
        storage,
        metadata,
        Arc::new(NoopNotifier),
    ))
}

/// Engine state with a caller-provided metadata store, everything else
/// local under `root`.
pub async fn state_with_metadata(
    root: &Path,
    metadata: Arc<dyn MetadataStore>,
) -> Arc<EngineState> {
    let config = test_config(root);
    let storage = depot_storage::from_config(&config.storage).await.unwrap();
    Arc::new(EngineState::new(
        Arc::new(config),
        storage,
        metadata,
        Arc::new(NoopNotifier),
    ))
}

/// Deterministic payload of `len` bytes starting at absolute offset `start`.
pub fn payload(start: u64, len: u64) -> Bytes {
    Bytes::from(
        (start..start + len)
            .map(|i| (i % 251) as u8)
            .collect::<Vec<u8>>(),
    )
}

/// A chunk delivery for a 300-byte, 3-chunk upload unless overridden.
pub fn delivery(upload_id: &str, start: u64, end: u64, total_chunks: u32) -> ChunkUpload {
    ChunkUpload {
        upload_id: UploadId::parse(upload_id).unwrap(),
        range: ChunkRange::new(start, end).unwrap(),
        payload: payload(start, end - start),
        declared_size: 300,
        total_chunks,
        is_last: false,
        file_name: "data.bin".to_string(),
        mime_type: "application/octet-stream".to_string(),
        owner_id: "alice".to_string(),
        options: UploadOptions::default(),
    }
}
