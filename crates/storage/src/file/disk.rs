//! Local filesystem backend.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;

use super::{FileStorage, FileStorageError};

/// Settings for the disk backend.
#[derive(Debug, Clone, Deserialize)]
pub struct DiskConfig {
    /// Directory all logical paths resolve under.
    pub root: String,

    /// Location returned when a requested file does not exist.
    pub not_found_path: String,
}

/// Stores files under a root directory.
pub struct DiskStorage {
    root: PathBuf,
    not_found_path: String,
}

impl DiskStorage {
    pub fn new(config: DiskConfig) -> Self {
        Self {
            root: PathBuf::from(config.root),
            not_found_path: config.not_found_path,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl FileStorage for DiskStorage {
    async fn get_file(&self, path: &str) -> Result<String, FileStorageError> {
        let resolved = self.resolve(path);
        match fs::try_exists(&resolved).await {
            Ok(true) => Ok(resolved.to_string_lossy().into_owned()),
            _ => Ok(self.not_found_path.clone()),
        }
    }

    async fn save_file(&self, path: &str, content: &[u8]) -> Result<(), FileStorageError> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            if !fs::try_exists(parent).await.unwrap_or(false) {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&resolved, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("backplane-disk-{}-{}", label, nanos))
    }

    fn storage_at(root: &PathBuf) -> DiskStorage {
        DiskStorage::new(DiskConfig {
            root: root.to_string_lossy().into_owned(),
            not_found_path: "assets/not_found.png".to_string(),
        })
    }

    #[tokio::test]
    async fn test_save_then_get_returns_full_path() {
        let root = temp_root("roundtrip");
        let storage = storage_at(&root);

        storage.save_file("report.txt", b"contents").await.unwrap();
        let location = storage.get_file("report.txt").await.unwrap();

        assert_eq!(location, root.join("report.txt").to_string_lossy());
        assert_eq!(std::fs::read(&location).unwrap(), b"contents");

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_falls_back() {
        let root = temp_root("fallback");
        let storage = storage_at(&root);

        let location = storage.get_file("absent.txt").await.unwrap();
        assert_eq!(location, "assets/not_found.png");
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let root = temp_root("nested");
        let storage = storage_at(&root);

        storage
            .save_file("exports/2024/data.csv", b"a,b\n1,2")
            .await
            .unwrap();

        let location = storage.get_file("exports/2024/data.csv").await.unwrap();
        assert!(location.ends_with("data.csv"));
        assert!(root.join("exports/2024").is_dir());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_file() {
        let root = temp_root("overwrite");
        let storage = storage_at(&root);

        storage.save_file("file.bin", b"old").await.unwrap();
        storage.save_file("file.bin", b"new").await.unwrap();

        let location = storage.get_file("file.bin").await.unwrap();
        assert_eq!(std::fs::read(location).unwrap(), b"new");

        std::fs::remove_dir_all(&root).unwrap();
    }
}
