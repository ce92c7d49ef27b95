//! Storage provider trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use strongroom_common::{Result, VaultPath};

/// Metadata for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Name of the object.
    pub name: String,
    /// Size in bytes (None for directories).
    pub size: Option<u64>,
    /// Whether this is a directory.
    pub is_directory: bool,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Storage provider trait for different backends.
///
/// Paths are relative to the provider's root. Implementations must make
/// `upload` replace existing content without exposing a truncated file.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the provider name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Upload data to the storage, replacing any existing file.
    ///
    /// # Preconditions
    /// - Parent directory must exist
    ///
    /// # Errors
    /// - Parent directory not found
    /// - I/O errors
    async fn upload(&self, path: &VaultPath, data: Vec<u8>) -> Result<Metadata>;

    /// Download data from storage.
    ///
    /// # Errors
    /// - File not found
    /// - Path is a directory
    async fn download(&self, path: &VaultPath) -> Result<Vec<u8>>;

    /// Check if a path exists.
    async fn exists(&self, path: &VaultPath) -> Result<bool>;

    /// Delete a file.
    ///
    /// # Errors
    /// - File not found
    /// - Path is a directory
    async fn delete(&self, path: &VaultPath) -> Result<()>;

    /// Create a single directory.
    ///
    /// # Errors
    /// - Already exists
    /// - Parent missing
    async fn create_dir(&self, path: &VaultPath) -> Result<Metadata>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_serialization() {
        let metadata = Metadata {
            name: "test-file.txt".to_string(),
            size: Some(1024),
            is_directory: false,
            modified: Utc::now(),
        };

        let json = serde_json::to_string(&metadata).unwrap();
        let deserialized: Metadata = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.name, metadata.name);
        assert_eq!(deserialized.size, metadata.size);
    }
}
