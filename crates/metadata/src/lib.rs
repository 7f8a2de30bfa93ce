//! Metadata persistence for depot.
//!
//! Data model:
//! - `uploads`: chunked uploads in progress, with received/assembled counters
//! - `files`: the finalized catalog, one row per visible file
//! - `exports`: zip archives packed from a user's files

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{ExportRow, FileRow, UploadRow};
pub use repos::{ExportRepo, FileRepo, UploadRepo};
pub use store::{MetadataStore, SqliteStore};

use depot_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_config_sqlite_ok() {
        let dir = tempfile::tempdir().unwrap();
        let config = MetadataConfig::Sqlite {
            path: dir.path().join("meta.db"),
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
    }
}
