//! Open vault handle with encrypted file operations.
//!
//! A handle owns the unwrapped master key, the decrypted namespace tree and
//! the random source used for fresh nonces. Closing it zeroizes the key and
//! discards the tree; dropping an open handle closes it.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{
    random_uuid, VaultConfig, CONFIG_FILENAME, DATA_DIRNAME, META_DIRNAME, TREE_FILENAME,
};
use crate::tree::{TreeNode, VaultTree};
use strongroom_common::{Error, Result, VaultPath};
use strongroom_crypto::{decrypt, encrypt, MasterKey, SecureRandom};
use strongroom_storage::StorageProvider;

/// One entry of a directory listing, or the result of a stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (`/` for the root).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Plaintext size in bytes; zero for directories.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

impl From<&TreeNode> for DirectoryEntry {
    fn from(node: &TreeNode) -> Self {
        Self {
            name: node.metadata.name.clone(),
            is_directory: node.is_directory(),
            size_bytes: node.metadata.size.unwrap_or(0),
            modified_at: node.metadata.modified_at,
        }
    }
}

fn storage_path(dir: &str, name: &str) -> Result<VaultPath> {
    VaultPath::root().join(dir)?.join(name)
}

fn config_path() -> Result<VaultPath> {
    VaultPath::root().join(CONFIG_FILENAME)
}

fn tree_path() -> Result<VaultPath> {
    storage_path(META_DIRNAME, TREE_FILENAME)
}

/// An open vault.
///
/// Mutating operations take `&mut self`, so a handle is never shared between
/// concurrent callers.
pub struct VaultHandle {
    storage: Arc<dyn StorageProvider>,
    master_key: Option<MasterKey>,
    tree: VaultTree,
    rng: Box<dyn SecureRandom + Send>,
}

impl VaultHandle {
    /// Write the layout of an empty vault into `storage`.
    ///
    /// # Postconditions
    /// - Data and metadata directories exist
    /// - An empty encrypted tree and the plain configuration are stored
    ///
    /// # Errors
    /// - Storage failure
    pub async fn initialize(
        storage: &dyn StorageProvider,
        key: &MasterKey,
        config: &VaultConfig,
        rng: &mut dyn SecureRandom,
    ) -> Result<()> {
        for dir in [DATA_DIRNAME, META_DIRNAME] {
            let path = VaultPath::root().join(dir)?;
            if !storage.exists(&path).await? {
                storage.create_dir(&path).await?;
            }
        }

        let tree_bytes = VaultTree::new().to_bytes()?;
        let tree_key = key.derive_tree_key();
        let sealed = encrypt(tree_key.as_bytes(), &tree_bytes, rng)?;
        storage.upload(&tree_path()?, sealed).await?;

        storage.upload(&config_path()?, config.to_bytes()?).await?;

        debug!(provider = storage.name(), vault_id = %config.jti, "Vault layout initialized");
        Ok(())
    }

    /// Open the vault stored in `storage` with an unwrapped master key.
    ///
    /// The key is owned by the handle from here on; on error it is dropped
    /// and zeroized.
    ///
    /// # Errors
    /// - `InvalidVault` if the configuration or tree is missing, unreadable
    ///   or from an incompatible format
    pub async fn open(
        storage: Arc<dyn StorageProvider>,
        key: MasterKey,
        rng: Box<dyn SecureRandom + Send>,
    ) -> Result<Self> {
        let config_bytes = storage.download(&config_path()?).await.map_err(|e| {
            Error::InvalidVault(format!("{} unreadable: {}", CONFIG_FILENAME, e))
        })?;
        let config = VaultConfig::from_bytes(&config_bytes)
            .map_err(|e| Error::InvalidVault(format!("{} malformed: {}", CONFIG_FILENAME, e)))?;
        if !config.is_compatible() {
            return Err(Error::InvalidVault(format!(
                "unsupported vault format {}",
                config.format
            )));
        }

        let sealed = storage
            .download(&tree_path()?)
            .await
            .map_err(|e| Error::InvalidVault(format!("namespace tree unreadable: {}", e)))?;
        let tree_key = key.derive_tree_key();
        let tree_bytes = decrypt(tree_key.as_bytes(), &sealed)
            .map_err(|_| Error::InvalidVault("namespace tree failed authentication".to_string()))?;
        let tree = VaultTree::from_bytes(&tree_bytes)
            .map_err(|e| Error::InvalidVault(format!("namespace tree malformed: {}", e)))?;

        info!(vault_id = %config.jti, files = tree.count_files(), "Vault opened");
        Ok(Self {
            storage,
            master_key: Some(key),
            tree,
            rng,
        })
    }

    /// Whether the handle still holds its key.
    pub fn is_open(&self) -> bool {
        self.master_key.is_some()
    }

    /// Release the handle: zeroize the key and drop the decrypted tree.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&mut self) -> bool {
        match self.master_key.take() {
            Some(mut key) => {
                key.destroy();
                self.tree = VaultTree::new();
                info!("Vault handle closed");
                true
            }
            None => false,
        }
    }

    fn key(&self) -> Result<&MasterKey> {
        self.master_key
            .as_ref()
            .ok_or_else(|| Error::Storage("Vault handle is closed".to_string()))
    }

    fn ensure_open(&self) -> Result<()> {
        self.key().map(|_| ())
    }

    /// Whether `path` exists. A closed handle contains nothing.
    pub fn exists(&self, path: &VaultPath) -> bool {
        self.is_open() && self.tree.exists(path)
    }

    /// Metadata for a single node.
    pub fn metadata(&self, path: &VaultPath) -> Result<DirectoryEntry> {
        self.ensure_open()?;
        self.tree.get_node(path).map(DirectoryEntry::from)
    }

    /// Direct children of a directory, ordered by name.
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `NotADirectory` if the path is a file
    pub fn list(&self, path: &VaultPath) -> Result<Vec<DirectoryEntry>> {
        self.ensure_open()?;
        Ok(self
            .tree
            .list(path)?
            .into_iter()
            .map(DirectoryEntry::from)
            .collect())
    }

    /// All paths under `path` in post-order.
    pub fn walk_post_order(&self, path: &VaultPath) -> Result<Vec<VaultPath>> {
        self.ensure_open()?;
        self.tree.post_order(path)
    }

    /// Encrypt and persist a tree, then adopt it.
    ///
    /// The in-memory tree only changes once the stored copy has been replaced.
    async fn commit(&mut self, tree: VaultTree) -> Result<()> {
        let tree_bytes = tree.to_bytes()?;
        let tree_key = self.key()?.derive_tree_key();
        let sealed = encrypt(tree_key.as_bytes(), &tree_bytes, self.rng.as_mut())?;

        self.storage.upload(&tree_path()?, sealed).await?;
        self.tree = tree;
        Ok(())
    }

    /// Create a single directory.
    ///
    /// # Preconditions
    /// - Parent directory must exist
    ///
    /// # Errors
    /// - Parent not found or not a directory
    /// - Already exists
    /// - Storage failure
    pub async fn create_dir(&mut self, path: &VaultPath) -> Result<()> {
        self.ensure_open()?;
        debug!(path = %path, "Creating directory");

        let mut tree = self.tree.clone();
        tree.create_directory(path)?;
        self.commit(tree).await?;

        info!(path = %path, "Directory created");
        Ok(())
    }

    /// Create or replace a file with encrypted content.
    ///
    /// # Preconditions
    /// - Parent directory must exist
    ///
    /// # Postconditions
    /// - Content blob is stored before the tree references it
    /// - A replaced file moves to a fresh blob; the old blob is removed only
    ///   after the tree commit, so a failed replace leaves the old content
    ///
    /// # Errors
    /// - Parent not found or not a directory
    /// - Path is a directory
    /// - Encryption or storage failure
    pub async fn write_file(&mut self, path: &VaultPath, content: &[u8]) -> Result<()> {
        self.ensure_open()?;
        debug!(path = %path, "Writing encrypted file");

        let old_blob = match self.tree.get_node(path) {
            Ok(node) if node.is_directory() => {
                return Err(Error::InvalidInput(format!("Is a directory: {}", path)));
            }
            Ok(node) => node.metadata.blob_id.clone(),
            Err(_) => None,
        };

        let mut tree = self.tree.clone();
        let blob_id = random_uuid(self.rng.as_mut()).simple().to_string();
        tree.upsert_file(path, &blob_id, content.len() as u64)?;

        let content_key = self.key()?.derive_content_key(blob_id.as_bytes());
        let sealed = encrypt(content_key.as_bytes(), content, self.rng.as_mut())?;
        self.storage
            .upload(&storage_path(DATA_DIRNAME, &blob_id)?, sealed)
            .await?;

        self.commit(tree).await?;

        if let Some(old_blob) = old_blob {
            let blob_path = storage_path(DATA_DIRNAME, &old_blob)?;
            if let Err(e) = self.storage.delete(&blob_path).await {
                warn!(path = %path, error = %e, "Failed to remove replaced content blob");
            }
        }

        info!(path = %path, size = content.len(), "File written");
        Ok(())
    }

    /// Read and decrypt file content.
    ///
    /// # Errors
    /// - File not found
    /// - Path is a directory
    /// - Decryption or storage failure
    pub async fn read_file(&self, path: &VaultPath) -> Result<Vec<u8>> {
        let key = self.key()?;
        debug!(path = %path, "Reading encrypted file");

        let node = self.tree.get_node(path)?;
        let blob_id = match &node.metadata.blob_id {
            Some(id) if node.is_file() => id.clone(),
            _ => return Err(Error::InvalidInput(format!("Is a directory: {}", path))),
        };

        let sealed = self
            .storage
            .download(&storage_path(DATA_DIRNAME, &blob_id)?)
            .await?;
        let content_key = key.derive_content_key(blob_id.as_bytes());
        let content = decrypt(content_key.as_bytes(), &sealed)?;

        debug!(path = %path, size = content.len(), "File read");
        Ok(content)
    }

    /// Read a file as UTF-8 text.
    pub async fn read_to_string(&self, path: &VaultPath) -> Result<String> {
        let content = self.read_file(path).await?;
        String::from_utf8(content)
            .map_err(|_| Error::InvalidInput(format!("Not valid UTF-8 text: {}", path)))
    }

    /// Copy a local file into the vault at `path`. Returns the byte count.
    pub async fn copy_in(&mut self, local: &Path, path: &VaultPath) -> Result<u64> {
        let content = fs::read(local).await?;
        self.write_file(path, &content).await?;
        Ok(content.len() as u64)
    }

    /// Copy a vault file out to `local`, replacing it. Returns the byte count.
    pub async fn copy_out(&self, path: &VaultPath, local: &Path) -> Result<u64> {
        let content = self.read_file(path).await?;
        fs::write(local, &content).await?;
        Ok(content.len() as u64)
    }

    /// Delete a file or an empty directory.
    ///
    /// # Postconditions
    /// - The tree no longer references the node
    /// - A file's blob is removed afterwards; failure to remove it only
    ///   leaves an unreferenced blob behind
    ///
    /// # Errors
    /// - Not found
    /// - `DirectoryNotEmpty` for a directory with children
    /// - Root cannot be deleted
    pub async fn delete(&mut self, path: &VaultPath) -> Result<()> {
        self.ensure_open()?;
        if path.is_root() {
            return Err(Error::InvalidInput("Cannot delete the vault root".to_string()));
        }
        debug!(path = %path, "Deleting");

        let node = self.tree.get_node(path)?;
        if node.is_directory() && !node.children.is_empty() {
            return Err(Error::DirectoryNotEmpty(path.to_string()));
        }
        let blob_id = node.metadata.blob_id.clone();

        let mut tree = self.tree.clone();
        tree.remove(path)?;
        self.commit(tree).await?;

        if let Some(blob_id) = blob_id {
            let blob_path = storage_path(DATA_DIRNAME, &blob_id)?;
            if let Err(e) = self.storage.delete(&blob_path).await {
                warn!(path = %path, error = %e, "Failed to remove content blob");
            }
        }

        info!(path = %path, "Deleted");
        Ok(())
    }
}

impl Drop for VaultHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use strongroom_storage::MemoryProvider;
    use tempfile::TempDir;

    async fn open_memory() -> (Arc<MemoryProvider>, VaultHandle) {
        let storage = Arc::new(MemoryProvider::new());
        let mut rng = StdRng::seed_from_u64(7);
        let key = MasterKey::generate(&mut rng);
        let config = VaultConfig::generate(&mut rng).unwrap();

        VaultHandle::initialize(storage.as_ref(), &key, &config, &mut rng)
            .await
            .unwrap();
        let handle = VaultHandle::open(storage.clone(), key, Box::new(rng))
            .await
            .unwrap();
        (storage, handle)
    }

    #[tokio::test]
    async fn test_write_read_file() {
        let (storage, mut handle) = open_memory().await;
        let path = VaultPath::parse("/notes.txt");

        handle.write_file(&path, b"secret notes").await.unwrap();

        assert_eq!(handle.read_file(&path).await.unwrap(), b"secret notes");
        assert_eq!(handle.metadata(&path).unwrap().size_bytes, 12);
        // config, tree and one blob
        assert_eq!(storage.file_count(), 3);
    }

    #[tokio::test]
    async fn test_blobs_are_ciphertext() {
        let (storage, mut handle) = open_memory().await;
        let path = VaultPath::parse("/plain.txt");
        handle.write_file(&path, b"visible?").await.unwrap();

        let node = handle.tree.get_node(&path).unwrap();
        let blob_id = node.metadata.blob_id.clone().unwrap();
        let stored = storage
            .download(&storage_path(DATA_DIRNAME, &blob_id).unwrap())
            .await
            .unwrap();

        assert!(!stored.windows(8).any(|w| w == b"visible?"));
    }

    #[tokio::test]
    async fn test_replace_drops_old_blob() {
        let (storage, mut handle) = open_memory().await;
        let path = VaultPath::parse("/a.txt");

        handle.write_file(&path, b"one").await.unwrap();
        let first = handle.tree.get_node(&path).unwrap().metadata.blob_id.clone().unwrap();
        handle.write_file(&path, b"second").await.unwrap();
        let second = handle.tree.get_node(&path).unwrap().metadata.blob_id.clone().unwrap();

        assert_ne!(first, second);

        assert_eq!(handle.read_to_string(&path).await.unwrap(), "second");
        assert_eq!(storage.file_count(), 3);
    }

    #[tokio::test]
    async fn test_reopen_sees_changes() {
        let storage = Arc::new(MemoryProvider::new());
        let mut rng = StdRng::seed_from_u64(8);
        let key = MasterKey::generate(&mut rng);
        let key_copy = MasterKey::from_bytes(*key.as_bytes());
        let config = VaultConfig::generate(&mut rng).unwrap();
        VaultHandle::initialize(storage.as_ref(), &key, &config, &mut rng)
            .await
            .unwrap();

        let mut handle = VaultHandle::open(storage.clone(), key, Box::new(rng))
            .await
            .unwrap();
        handle.create_dir(&VaultPath::parse("/docs")).await.unwrap();
        handle
            .write_file(&VaultPath::parse("/docs/a"), b"x")
            .await
            .unwrap();
        drop(handle);

        let reopened = VaultHandle::open(
            storage.clone(),
            key_copy,
            Box::new(StdRng::seed_from_u64(9)),
        )
        .await
        .unwrap();
        let names: Vec<_> = reopened
            .list(&VaultPath::parse("/docs"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    #[tokio::test]
    async fn test_open_with_wrong_key_is_invalid_vault() {
        let storage = Arc::new(MemoryProvider::new());
        let mut rng = StdRng::seed_from_u64(10);
        let key = MasterKey::generate(&mut rng);
        let config = VaultConfig::generate(&mut rng).unwrap();
        VaultHandle::initialize(storage.as_ref(), &key, &config, &mut rng)
            .await
            .unwrap();

        let other = MasterKey::generate(&mut rng);
        let result = VaultHandle::open(storage, other, Box::new(rng)).await;
        assert!(matches!(result, Err(Error::InvalidVault(_))));
    }

    #[tokio::test]
    async fn test_open_empty_storage_is_invalid_vault() {
        let mut rng = StdRng::seed_from_u64(1);
        let key = MasterKey::generate(&mut rng);
        let result =
            VaultHandle::open(Arc::new(MemoryProvider::new()), key, Box::new(rng)).await;
        assert!(matches!(result, Err(Error::InvalidVault(_))));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let (storage, mut handle) = open_memory().await;
        handle.create_dir(&VaultPath::parse("/d")).await.unwrap();
        handle
            .write_file(&VaultPath::parse("/d/f"), b"data")
            .await
            .unwrap();

        assert!(matches!(
            handle.delete(&VaultPath::parse("/d")).await,
            Err(Error::DirectoryNotEmpty(_))
        ));
        assert!(handle.delete(&VaultPath::root()).await.is_err());

        handle.delete(&VaultPath::parse("/d/f")).await.unwrap();
        handle.delete(&VaultPath::parse("/d")).await.unwrap();

        assert!(!handle.exists(&VaultPath::parse("/d")));
        assert_eq!(storage.file_count(), 2);
    }

    #[tokio::test]
    async fn test_read_directory_rejected() {
        let (_storage, mut handle) = open_memory().await;
        handle.create_dir(&VaultPath::parse("/d")).await.unwrap();

        assert!(matches!(
            handle.read_file(&VaultPath::parse("/d")).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            handle.write_file(&VaultPath::parse("/d"), b"x").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_copy_in_and_out() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in.bin");
        let target = temp.path().join("out.bin");
        std::fs::write(&source, [0u8, 1, 2, 255]).unwrap();

        let (_storage, mut handle) = open_memory().await;
        let path = VaultPath::parse("/in.bin");

        assert_eq!(handle.copy_in(&source, &path).await.unwrap(), 4);
        assert_eq!(handle.copy_out(&path, &target).await.unwrap(), 4);
        assert_eq!(std::fs::read(&target).unwrap(), vec![0u8, 1, 2, 255]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_storage, mut handle) = open_memory().await;
        handle.create_dir(&VaultPath::parse("/d")).await.unwrap();

        assert!(handle.close());
        assert!(!handle.close());
        assert!(!handle.is_open());
        assert!(!handle.exists(&VaultPath::parse("/d")));
        assert!(handle.list(&VaultPath::root()).is_err());
    }
}
