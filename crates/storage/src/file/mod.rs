//! File storage backends.
//!
//! A logical path goes in; a servable location comes out: a local
//! filesystem path for the disk backend, a signed time-limited URL for the
//! cloud backend. The backend is selected by the `kind` configuration value.

mod cloud;
mod disk;

pub use self::cloud::{GoogleCloudConfig, GoogleCloudStorage};
pub use self::disk::{DiskConfig, DiskStorage};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Error type for file storage operations.
#[derive(Debug, Error)]
pub enum FileStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cloud request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Cloud storage returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("URL signing failed: {0}")]
    Signing(String),

    #[error("Unknown file storage kind: {0}")]
    UnknownKind(String),

    #[error("Missing configuration for file storage kind: {0}")]
    MissingConfig(String),
}

/// Resolves and persists files behind a backend-neutral contract.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Resolves a logical path to a servable location. A missing file
    /// resolves to the backend's configured not-found fallback.
    async fn get_file(&self, path: &str) -> Result<String, FileStorageError>;

    /// Persists bytes under a logical path, creating intermediate
    /// structure as needed.
    async fn save_file(&self, path: &str, content: &[u8]) -> Result<(), FileStorageError>;
}

/// File storage configuration; `kind` selects the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct FileStorageConfig {
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub disk: Option<DiskConfig>,

    #[serde(default)]
    pub google_cloud: Option<GoogleCloudConfig>,
}

fn default_kind() -> String {
    "disk".to_string()
}

/// Builds the backend named by `config.kind` (`disk` | `google-cloud`).
pub fn from_config(config: &FileStorageConfig) -> Result<Arc<dyn FileStorage>, FileStorageError> {
    match config.kind.as_str() {
        "disk" => {
            let disk = config
                .disk
                .clone()
                .ok_or_else(|| FileStorageError::MissingConfig("disk".to_string()))?;
            Ok(Arc::new(DiskStorage::new(disk)))
        }
        "google-cloud" => {
            let cloud = config
                .google_cloud
                .clone()
                .ok_or_else(|| FileStorageError::MissingConfig("google-cloud".to_string()))?;
            Ok(Arc::new(GoogleCloudStorage::new(cloud)))
        }
        other => Err(FileStorageError::UnknownKind(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_disk_backend() {
        let config = FileStorageConfig {
            kind: "disk".to_string(),
            disk: Some(DiskConfig {
                root: "/tmp".to_string(),
                not_found_path: "/tmp/404".to_string(),
            }),
            google_cloud: None,
        };

        assert!(from_config(&config).is_ok());
    }

    #[test]
    fn test_factory_rejects_unknown_kind() {
        let config = FileStorageConfig {
            kind: "ftp".to_string(),
            disk: None,
            google_cloud: None,
        };

        assert!(matches!(
            from_config(&config),
            Err(FileStorageError::UnknownKind(kind)) if kind == "ftp"
        ));
    }

    #[test]
    fn test_factory_requires_backend_config() {
        let config = FileStorageConfig {
            kind: "google-cloud".to_string(),
            disk: None,
            google_cloud: None,
        };

        assert!(matches!(
            from_config(&config),
            Err(FileStorageError::MissingConfig(_))
        ));
    }

    #[test]
    fn test_kind_defaults_to_disk() {
        let config: FileStorageConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.kind, "disk");
    }
}
