//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upload handling configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory holding transient chunk files.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Maximum size of a single chunk in bytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,
    /// Maximum declared size of an upload in bytes (0 = unlimited).
    #[serde(default)]
    pub max_upload_size: u64,
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./data/tmp")
}

fn default_max_chunk_size() -> u64 {
    crate::DEFAULT_MAX_CHUNK_SIZE
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            max_chunk_size: default_max_chunk_size(),
            max_upload_size: 0,
        }
    }
}

impl UploadConfig {
    /// Validate upload configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_size == 0 {
            return Err("uploads.max_chunk_size cannot be 0".to_string());
        }
        if self.max_upload_size != 0 && self.max_upload_size < self.max_chunk_size {
            return Err(format!(
                "uploads.max_upload_size {} is smaller than max_chunk_size {}",
                self.max_upload_size, self.max_chunk_size
            ));
        }
        Ok(())
    }
}

/// Export archive configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory where finished export archives are written.
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
    /// Backpressure threshold in bytes: the packer pauses reading sources
    /// while this many produced bytes are waiting to be drained to disk.
    #[serde(default = "default_flow_threshold")]
    pub flow_threshold: u64,
    /// Compression applied to archive entries.
    #[serde(default)]
    pub compression: ExportCompression,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./data/exports")
}

fn default_flow_threshold() -> u64 {
    crate::DEFAULT_FLOW_THRESHOLD
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
            flow_threshold: default_flow_threshold(),
            compression: ExportCompression::default(),
        }
    }
}

impl ExportConfig {
    /// Validate export configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.flow_threshold == 0 {
            return Err("exports.flow_threshold cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Compression algorithm for export archive entries.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportCompression {
    /// Entries stored verbatim.
    Stored,
    /// Deflate compression (default).
    #[default]
    Deflate,
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Local {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if
        /// not set. Prefer env vars or IAM roles over config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Same fallback as `access_key_id`.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO
        /// and some S3-compatible services; AWS itself wants virtual-hosted
        /// style (false, the default).
        #[serde(default)]
        force_path_style: bool,
    },
    /// OpenStack Swift storage (TempAuth).
    Swift {
        /// Authentication endpoint, e.g. `http://swift:8080/auth/v1.0`.
        auth_url: String,
        /// TempAuth user, e.g. `test:tester`.
        username: String,
        /// TempAuth key.
        key: String,
        /// Container holding the objects.
        container: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Local { .. } => Ok(()),
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Swift {
                auth_url,
                username,
                key,
                container,
            } => {
                if auth_url.is_empty() || username.is_empty() || key.is_empty() {
                    return Err(
                        "swift config requires auth_url, username and key".to_string()
                    );
                }
                if container.is_empty() {
                    return Err("swift config requires a container".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
        }
    }
}

/// Outbound notification configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook URL to POST finalized-upload payloads to.
    pub webhook_url: String,
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Upload handling configuration.
    #[serde(default)]
    pub uploads: UploadConfig,
    /// Export archive configuration.
    #[serde(default)]
    pub exports: ExportConfig,
    /// Outbound notification configuration (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotifyConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            uploads: UploadConfig::default(),
            exports: ExportConfig::default(),
            notify: None,
        }
    }
}

impl AppConfig {
    /// Validate all sections, collecting the first failure.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.metadata.validate()?;
        self.uploads.validate()?;
        self.exports.validate()?;
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses local storage and SQLite metadata under
    /// relative `./data` paths; tests normally override the paths with
    /// tempdirs.
    pub fn for_testing() -> Self {
        Self::default()
    }
}
