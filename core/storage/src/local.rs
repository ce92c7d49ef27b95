//! Local filesystem storage provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::warn;

use crate::provider::{Metadata, StorageProvider};
use strongroom_common::{Error, Result, VaultPath};

/// Local filesystem storage provider.
///
/// Stores vault data in a local directory structure rooted at the vault
/// directory.
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Create a local provider over an existing directory.
    ///
    /// # Errors
    /// - Root does not exist or is not a directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.is_dir() {
            return Err(Error::NotFound(format!(
                "Storage root not found: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    /// Convert a VaultPath to a filesystem path.
    fn to_fs_path(&self, path: &VaultPath) -> PathBuf {
        let mut fs_path = self.root.clone();
        for component in path.components() {
            fs_path.push(component);
        }
        fs_path
    }

    /// Create metadata from filesystem metadata.
    fn create_metadata(&self, path: &VaultPath, fs_meta: std::fs::Metadata) -> Metadata {
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(|t| t.into())
            .unwrap_or_else(|_| Utc::now());

        Metadata {
            name: path.name().unwrap_or("/").to_string(),
            size: if fs_meta.is_file() {
                Some(fs_meta.len())
            } else {
                None
            },
            is_directory: fs_meta.is_dir(),
            modified,
        }
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling temp file name, unique within this process.
fn temp_path_for(parent: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    parent.join(format!(".tmp.{}.{}", std::process::id(), n))
}

/// Write `data` next to `target` and rename it into place.
///
/// If the rename fails the original file is untouched and the temp file is
/// removed.
pub async fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| Error::InvalidInput("Target has no parent directory".to_string()))?;
    let temp_path = temp_path_for(parent);

    if let Err(e) = fs::write(&temp_path, data).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, target).await {
        if let Err(cleanup) = fs::remove_file(&temp_path).await {
            warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp file");
        }
        return Err(e.into());
    }

    Ok(())
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, path: &VaultPath, data: Vec<u8>) -> Result<Metadata> {
        let fs_path = self.to_fs_path(path);

        match fs_path.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => return Err(Error::NotFound("Parent directory not found".to_string())),
        }

        if fs_path.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Cannot overwrite directory: {}",
                path
            )));
        }

        write_atomic(&fs_path, &data).await?;

        let fs_meta = fs::metadata(&fs_path).await?;
        Ok(self.create_metadata(path, fs_meta))
    }

    async fn download(&self, path: &VaultPath) -> Result<Vec<u8>> {
        let fs_path = self.to_fs_path(path);

        if !fs_path.exists() {
            return Err(Error::NotFound(format!("File not found: {}", path)));
        }

        if fs_path.is_dir() {
            return Err(Error::InvalidInput("Cannot download directory".to_string()));
        }

        Ok(fs::read(&fs_path).await?)
    }

    async fn exists(&self, path: &VaultPath) -> Result<bool> {
        let fs_path = self.to_fs_path(path);
        Ok(fs::try_exists(&fs_path).await?)
    }

    async fn delete(&self, path: &VaultPath) -> Result<()> {
        let fs_path = self.to_fs_path(path);

        if !fs_path.exists() {
            return Err(Error::NotFound(format!("File not found: {}", path)));
        }

        if fs_path.is_dir() {
            return Err(Error::InvalidInput(
                "Cannot delete a directory as a file".to_string(),
            ));
        }

        fs::remove_file(&fs_path).await?;
        Ok(())
    }

    async fn create_dir(&self, path: &VaultPath) -> Result<Metadata> {
        let fs_path = self.to_fs_path(path);

        if fs_path.exists() {
            return Err(Error::AlreadyExists(format!(
                "Path already exists: {}",
                path
            )));
        }

        fs::create_dir(&fs_path).await?;

        let fs_meta = fs::metadata(&fs_path).await?;
        Ok(self.create_metadata(path, fs_meta))
    }
}
