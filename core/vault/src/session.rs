//! Vault session: path-level operations over an open handle.
//!
//! The session is the only owner of its [`VaultHandle`]. Dropping the session
//! drops the handle, which zeroizes the key, so every exit path releases the
//! vault exactly once.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::handle::{DirectoryEntry, VaultHandle};
use strongroom_common::{Error, Result, VaultPath};

/// An unlocked vault.
pub struct VaultSession {
    handle: VaultHandle,
    vault_dir: PathBuf,
}

impl VaultSession {
    /// Wrap an open handle for the vault at `vault_dir`.
    pub fn new(handle: VaultHandle, vault_dir: impl Into<PathBuf>) -> Self {
        Self {
            handle,
            vault_dir: vault_dir.into(),
        }
    }

    /// Directory the vault lives in.
    pub fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }

    /// Whether the underlying handle is still open.
    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Release the vault now. Later calls are no-ops.
    pub fn close(&mut self) {
        self.handle.close();
    }

    /// Whether `path` exists in the vault.
    pub fn exists(&self, path: &VaultPath) -> bool {
        self.handle.exists(path)
    }

    /// Whether `path` exists and is a directory.
    pub fn is_directory(&self, path: &VaultPath) -> bool {
        self.handle
            .metadata(path)
            .map(|entry| entry.is_directory)
            .unwrap_or(false)
    }

    /// Direct children of a directory, ordered by name.
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `NotADirectory` if the path is a file
    pub fn list(&self, path: &VaultPath) -> Result<Vec<DirectoryEntry>> {
        self.handle.list(path).map_err(|e| e.at_path(path))
    }

    /// Metadata of a single path.
    pub fn stat(&self, path: &VaultPath) -> Result<DirectoryEntry> {
        self.handle.metadata(path).map_err(|e| e.at_path(path))
    }

    /// Copy a local file into `dest_dir`, creating the directory chain.
    ///
    /// The vault file takes the local file's name and replaces any file of
    /// that name.
    ///
    /// # Errors
    /// - `LocalFileNotFound` if `local` does not exist
    /// - `NotADirectory` if a segment of `dest_dir` is a file
    pub async fn upload_local(&mut self, local: &Path, dest_dir: &VaultPath) -> Result<VaultPath> {
        let meta = match fs::metadata(local).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::LocalFileNotFound(local.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Cannot upload a directory: {}",
                local.display()
            )));
        }

        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidInput(format!("Unusable file name: {}", local.display()))
            })?;

        self.mkdir(dest_dir).await?;
        let target = dest_dir.join(name)?;

        let size = self
            .handle
            .copy_in(local, &target)
            .await
            .map_err(|e| e.at_path(&target))?;

        debug!(local = %local.display(), target = %target, size, "Uploaded local file");
        Ok(target)
    }

    /// Copy a vault file to `local`, creating or replacing it.
    pub async fn download(&self, path: &VaultPath, local: &Path) -> Result<u64> {
        self.handle
            .copy_out(path, local)
            .await
            .map_err(|e| e.at_path(path))
    }

    /// Create `path` and any missing ancestors. Existing directories are fine.
    ///
    /// # Errors
    /// - `NotADirectory` if any prefix of `path` is a file
    pub async fn mkdir(&mut self, path: &VaultPath) -> Result<()> {
        for prefix in path.ancestors_inclusive() {
            match self.handle.metadata(&prefix) {
                Ok(entry) if entry.is_directory => continue,
                Ok(_) => return Err(Error::NotADirectory(prefix.to_string())),
                Err(Error::NotFound(_)) => self
                    .handle
                    .create_dir(&prefix)
                    .await
                    .map_err(|e| e.at_path(&prefix))?,
                Err(e) => return Err(e.at_path(&prefix)),
            }
        }
        Ok(())
    }

    /// Delete a file or directory.
    ///
    /// A recursive delete removes children before parents. It stops at the
    /// first failure; whatever was removed before that stays removed.
    /// Each removed node re-encrypts and re-uploads the whole tree, so deleting
    /// an n-node subtree costs O(n²).
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `DirectoryNotEmpty` for a non-empty directory without `recursive`
    pub async fn delete(&mut self, path: &VaultPath, recursive: bool) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidInput(
                "Cannot delete the vault root".to_string(),
            ));
        }

        let entry = self.stat(path)?;
        if !entry.is_directory || !recursive {
            return self.handle.delete(path).await.map_err(|e| e.at_path(path));
        }

        let order = self
            .handle
            .walk_post_order(path)
            .map_err(|e| e.at_path(path))?;
        debug!(path = %path, entries = order.len(), "Recursive delete");
        for target in order {
            self.handle
                .delete(&target)
                .await
                .map_err(|e| e.at_path(&target))?;
        }
        Ok(())
    }

    /// Read a vault file as UTF-8 text.
    pub async fn read_text_file(&self, path: &VaultPath) -> Result<String> {
        self.handle
            .read_to_string(path)
            .await
            .map_err(|e| e.at_path(path))
    }
}
