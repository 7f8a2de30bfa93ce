//! Shared engine state and per-upload locking.

use crate::error::EngineResult;
use crate::notify::{Notifier, NoopNotifier};
use crate::transient::TransientChunks;
use depot_core::config::{AppConfig, MetadataConfig, StorageConfig};
use depot_core::ids::UploadId;
use depot_metadata::MetadataStore;
use depot_storage::StorageBackend;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Per-upload async mutexes.
///
/// All mutations for one upload id are serialized; different ids proceed
/// concurrently. Lock entries are created on demand and kept for the
/// process lifetime (upload ids are bounded in practice by active clients).
#[derive(Default)]
pub struct UploadLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UploadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for an upload id, waiting if another task holds it.
    pub async fn acquire(&self, upload_id: &UploadId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(upload_id.as_str().to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Everything the pipeline components share.
pub struct EngineState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageBackend>,
    pub metadata: Arc<dyn MetadataStore>,
    pub notifier: Arc<dyn Notifier>,
    pub locks: UploadLocks,
    pub transient: TransientChunks,
}

impl EngineState {
    /// Assemble engine state from already-built components.
    pub fn new(
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageBackend>,
        metadata: Arc<dyn MetadataStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let transient = TransientChunks::new(config.uploads.temp_dir.clone());
        Self {
            config,
            storage,
            metadata,
            notifier,
            locks: UploadLocks::new(),
            transient,
        }
    }

    /// Build state from configuration, constructing the storage backend and
    /// metadata store via their `from_config` factories.
    pub async fn from_config(config: AppConfig) -> EngineResult<Arc<Self>> {
        config
            .validate()
            .map_err(depot_core::Error::Config)
            .map_err(crate::EngineError::from)?;
        let storage = depot_storage::from_config(&config.storage).await?;
        let metadata = depot_metadata::from_config(&config.metadata).await?;
        let notifier = crate::notify::from_config(&config.notify);
        Ok(Arc::new(Self::new(
            Arc::new(config),
            storage,
            metadata,
            notifier,
        )))
    }

    /// Build a fully local state rooted in `root`.
    ///
    /// **For testing only.** Local storage, SQLite metadata and the transient
    /// and export directories all live under `root`.
    pub async fn for_testing(root: &Path) -> EngineResult<Arc<Self>> {
        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Local {
            path: root.join("storage"),
        };
        config.metadata = MetadataConfig::Sqlite {
            path: root.join("metadata.db"),
        };
        config.uploads.temp_dir = root.join("tmp");
        config.exports.dir = root.join("exports");

        let storage = depot_storage::from_config(&config.storage).await?;
        let metadata = depot_metadata::from_config(&config.metadata).await?;
        Ok(Arc::new(Self::new(
            Arc::new(config),
            storage,
            metadata,
            Arc::new(NoopNotifier),
        )))
    }
}
