//! In-memory storage provider for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::provider::{Metadata, StorageProvider};
use strongroom_common::{Error, Result, VaultPath};

/// In-memory storage entry.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, metadata: Metadata },
    Directory { metadata: Metadata },
}

/// In-memory storage provider.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop.
pub struct MemoryProvider {
    storage: RwLock<HashMap<String, Entry>>,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        let mut storage = HashMap::new();
        storage.insert(
            "/".to_string(),
            Entry::Directory {
                metadata: Self::dir_metadata("/"),
            },
        );

        Self {
            storage: RwLock::new(storage),
        }
    }

    /// Number of stored files, not counting directories.
    pub fn file_count(&self) -> usize {
        self.read()
            .values()
            .filter(|e| matches!(e, Entry::File { .. }))
            .count()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.storage.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.storage.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn path_to_key(path: &VaultPath) -> String {
        path.to_string_path()
    }

    fn dir_metadata(name: &str) -> Metadata {
        Metadata {
            name: name.to_string(),
            size: None,
            is_directory: true,
            modified: Utc::now(),
        }
    }

    fn check_parent(&self, path: &VaultPath) -> Result<()> {
        if let Some(parent) = path.parent() {
            match self.read().get(&Self::path_to_key(&parent)) {
                Some(Entry::Directory { .. }) => {}
                Some(Entry::File { .. }) => {
                    return Err(Error::InvalidInput("Parent is a file".to_string()));
                }
                None => {
                    return Err(Error::NotFound("Parent directory not found".to_string()));
                }
            }
        }
        Ok(())
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upload(&self, path: &VaultPath, data: Vec<u8>) -> Result<Metadata> {
        self.check_parent(path)?;

        let key = Self::path_to_key(path);
        let mut storage = self.write();
        if let Some(Entry::Directory { .. }) = storage.get(&key) {
            return Err(Error::InvalidInput(format!(
                "Cannot overwrite directory: {}",
                path
            )));
        }

        let metadata = Metadata {
            name: path.name().unwrap_or("/").to_string(),
            size: Some(data.len() as u64),
            is_directory: false,
            modified: Utc::now(),
        };

        storage.insert(
            key,
            Entry::File {
                data,
                metadata: metadata.clone(),
            },
        );

        Ok(metadata)
    }

    async fn download(&self, path: &VaultPath) -> Result<Vec<u8>> {
        match self.read().get(&Self::path_to_key(path)) {
            Some(Entry::File { data, .. }) => Ok(data.clone()),
            Some(Entry::Directory { .. }) => {
                Err(Error::InvalidInput("Cannot download directory".to_string()))
            }
            None => Err(Error::NotFound(format!("File not found: {}", path))),
        }
    }

    async fn exists(&self, path: &VaultPath) -> Result<bool> {
        Ok(self.read().contains_key(&Self::path_to_key(path)))
    }

    async fn delete(&self, path: &VaultPath) -> Result<()> {
        let key = Self::path_to_key(path);
        let mut storage = self.write();

        match storage.get(&key) {
            Some(Entry::File { .. }) => {
                storage.remove(&key);
                Ok(())
            }
            Some(Entry::Directory { .. }) => Err(Error::InvalidInput(
                "Cannot delete a directory as a file".to_string(),
            )),
            None => Err(Error::NotFound(format!("File not found: {}", path))),
        }
    }

    async fn create_dir(&self, path: &VaultPath) -> Result<Metadata> {
        self.check_parent(path)?;

        let key = Self::path_to_key(path);
        let mut storage = self.write();

        if storage.contains_key(&key) {
            return Err(Error::AlreadyExists(format!(
                "Path already exists: {}",
                path
            )));
        }

        let metadata = Self::dir_metadata(path.name().unwrap_or("/"));
        storage.insert(
            key,
            Entry::Directory {
                metadata: metadata.clone(),
            },
        );

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_download() {
        let provider = MemoryProvider::new();
        let path = VaultPath::parse("/test.txt");
        let data = b"Hello, World!".to_vec();

        provider.upload(&path, data.clone()).await.unwrap();
        let downloaded = provider.download(&path).await.unwrap();

        assert_eq!(downloaded, data);
        assert_eq!(provider.file_count(), 1);
    }

    #[tokio::test]
    async fn test_upload_needs_parent_directory() {
        let provider = MemoryProvider::new();

        let result = provider
            .upload(&VaultPath::parse("/d/blob"), vec![1])
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        provider.create_dir(&VaultPath::parse("/d")).await.unwrap();
        provider
            .upload(&VaultPath::parse("/d/blob"), vec![1])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_file() {
        let provider = MemoryProvider::new();
        let path = VaultPath::parse("/blob");

        provider.upload(&path, vec![1, 2]).await.unwrap();
        provider.delete(&path).await.unwrap();

        assert!(!provider.exists(&path).await.unwrap());
        assert!(matches!(provider.delete(&path).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_dir_twice_fails() {
        let provider = MemoryProvider::new();
        let path = VaultPath::parse("/m");

        let meta = provider.create_dir(&path).await.unwrap();
        assert!(meta.is_directory);
        assert!(matches!(
            provider.create_dir(&path).await,
            Err(Error::AlreadyExists(_))
        ));
    }
}
