//! Vault lifecycle: create, open, inspect and re-key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::fs;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::{VaultConfig, CONFIG_FILENAME, KEYFILE_NAME};
use crate::handle::VaultHandle;
use crate::keyfile::KeyFile;
use crate::session::VaultSession;
use strongroom_common::{Error, Result};
use strongroom_crypto::{KdfParams, MasterKey, SecureRandom};
use strongroom_storage::LocalProvider;

/// Minimum length of a new password, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A new password that matched its confirmation and meets the length rule.
///
/// The only way to build one is [`NewPassword::confirm`], so operations that
/// take a `NewPassword` never see an unchecked password.
pub struct NewPassword(Zeroizing<String>);

impl NewPassword {
    /// Check a password against its confirmation, then against the length
    /// rule.
    ///
    /// # Errors
    /// - `PasswordMismatch` if the two entries differ
    /// - `WeakPassword` if shorter than [`MIN_PASSWORD_LENGTH`] characters
    pub fn confirm(password: &str, confirmation: &str) -> Result<Self> {
        let same: bool = password.as_bytes().ct_eq(confirmation.as_bytes()).into();
        if !same {
            return Err(Error::PasswordMismatch);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::WeakPassword {
                min: MIN_PASSWORD_LENGTH,
            });
        }
        Ok(Self(Zeroizing::new(password.to_string())))
    }

    /// Password bytes for key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Removes a half-built vault unless committed.
struct CreationGuard {
    vault_dir: PathBuf,
    created_dir: bool,
    committed: bool,
}

impl CreationGuard {
    fn new(vault_dir: &Path, created_dir: bool) -> Self {
        Self {
            vault_dir: vault_dir.to_path_buf(),
            created_dir,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }

    fn clear_contents(&self) -> std::io::Result<()> {
        for entry in std::fs::read_dir(&self.vault_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        let result = if self.created_dir {
            std::fs::remove_dir_all(&self.vault_dir)
        } else {
            self.clear_contents()
        };
        if let Err(e) = result {
            warn!(path = %self.vault_dir.display(), error = %e, "Failed to clean up partial vault");
        }
    }
}

/// Create a new vault in `vault_dir`.
///
/// # Preconditions
/// - `vault_dir` is missing or an empty directory
///
/// # Postconditions
/// - On success the directory holds a complete vault; the key file is
///   written last
/// - On failure nothing created by this call remains
///
/// # Errors
/// - `DirectoryNotEmpty` if the directory has any entry
/// - `NotADirectory` if the path is a file
/// - I/O, crypto or storage failure
pub async fn create_vault(
    vault_dir: &Path,
    password: &NewPassword,
    kdf: &KdfParams,
    rng: &mut dyn SecureRandom,
) -> Result<VaultConfig> {
    let created_dir = match fs::metadata(vault_dir).await {
        Ok(meta) if !meta.is_dir() => {
            return Err(Error::NotADirectory(vault_dir.display().to_string()));
        }
        Ok(_) => {
            let mut entries = fs::read_dir(vault_dir).await?;
            if entries.next_entry().await?.is_some() {
                return Err(Error::DirectoryNotEmpty(vault_dir.display().to_string()));
            }
            false
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(vault_dir).await?;
            true
        }
        Err(e) => return Err(e.into()),
    };
    let guard = CreationGuard::new(vault_dir, created_dir);

    let mut key = MasterKey::generate(rng);
    let config = VaultConfig::generate(rng)?;

    let storage = LocalProvider::new(vault_dir)?;
    VaultHandle::initialize(&storage, &key, &config, rng).await?;

    let keyfile = KeyFile::seal(&key, password.as_bytes(), kdf, rng)?;
    key.destroy();
    keyfile.store(vault_dir).await?;

    guard.commit();
    info!(path = %vault_dir.display(), vault_id = %config.jti, "Vault created");
    Ok(config)
}

/// Unlock the vault in `vault_dir`.
///
/// # Errors
/// - `InvalidVault` if the key file is missing or malformed
/// - `WrongPassword` if the password does not unwrap the key
pub async fn open_vault(
    vault_dir: &Path,
    password: &str,
    rng: Box<dyn SecureRandom + Send>,
) -> Result<VaultSession> {
    let keyfile = KeyFile::load(vault_dir).await?;
    let key = keyfile.unlock(password.as_bytes())?;

    let storage = Arc::new(LocalProvider::new(vault_dir)?);
    let handle = VaultHandle::open(storage, key, rng).await?;

    info!(path = %vault_dir.display(), "Vault unlocked");
    Ok(VaultSession::new(handle, vault_dir))
}

/// What can be learned about a vault without its password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultMetadata {
    /// Inspected directory.
    pub path: PathBuf,
    /// Whether the key file is present.
    pub valid: bool,
    /// Why the directory is not a vault, when it is not.
    pub invalid_reason: Option<String>,
    /// Vault format number.
    pub format: Option<u32>,
    /// Cipher suite label.
    pub cipher_combo: Option<String>,
    /// Vault identifier.
    pub vault_id: Option<String>,
    /// Argon2id memory cost in KiB.
    pub kdf_cost: Option<u32>,
}

fn read_u32(value: &serde_json::Value, pointer: &str) -> Option<u32> {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

async fn read_json(path: &Path) -> Result<Option<serde_json::Value>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes).ok()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read vault metadata without a password. Never modifies anything.
///
/// A directory without a key file is reported as invalid rather than as an
/// error; fields that cannot be read are `None`.
pub async fn inspect_vault(vault_dir: &Path) -> Result<VaultMetadata> {
    let mut meta = VaultMetadata {
        path: vault_dir.to_path_buf(),
        valid: false,
        invalid_reason: None,
        format: None,
        cipher_combo: None,
        vault_id: None,
        kdf_cost: None,
    };

    if !fs::try_exists(KeyFile::path(vault_dir)).await? {
        meta.invalid_reason = Some(format!("{} not found", KEYFILE_NAME));
        return Ok(meta);
    }
    meta.valid = true;

    if let Some(config) = read_json(&vault_dir.join(CONFIG_FILENAME)).await? {
        meta.format = read_u32(&config, "/format");
        meta.cipher_combo = config
            .get("cipherCombo")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        meta.vault_id = config.get("jti").and_then(|v| v.as_str()).map(str::to_string);
    }
    if let Some(keyfile) = read_json(&KeyFile::path(vault_dir)).await? {
        meta.kdf_cost = read_u32(&keyfile, "/kdf/memoryCost");
    }

    Ok(meta)
}

/// Re-wrap the master key under a new password.
///
/// Vault content is untouched. The new key file is written beside the old
/// one and renamed over it, so an interruption leaves the old password
/// working.
///
/// # Errors
/// - `InvalidVault` if the key file is missing or malformed
/// - `WrongPassword` if `old` does not unwrap the key
pub async fn change_password(
    vault_dir: &Path,
    old: &str,
    new: &NewPassword,
    rng: &mut dyn SecureRandom,
) -> Result<()> {
    let keyfile = KeyFile::load(vault_dir).await?;
    let mut key = keyfile.unlock(old.as_bytes())?;

    let resealed = KeyFile::seal(&key, new.as_bytes(), &keyfile.kdf, rng);
    key.destroy();
    resealed?.store(vault_dir).await?;

    info!(path = %vault_dir.display(), "Vault password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use strongroom_common::VaultPath;
    use tempfile::TempDir;

    const PASSWORD: &str = "correct horse";

    fn fast_kdf() -> KdfParams {
        KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn new_password(p: &str) -> NewPassword {
        NewPassword::confirm(p, p).unwrap()
    }

    fn rng(seed: u64) -> Box<dyn SecureRandom + Send> {
        Box::new(StdRng::seed_from_u64(seed))
    }

    async fn create(dir: &Path) -> VaultConfig {
        create_vault(
            dir,
            &new_password(PASSWORD),
            &fast_kdf(),
            &mut StdRng::seed_from_u64(1),
        )
        .await
        .unwrap()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_confirm_checks_mismatch_first() {
        assert!(matches!(
            NewPassword::confirm("short", "other"),
            Err(Error::PasswordMismatch)
        ));
        assert!(matches!(
            NewPassword::confirm("short", "short"),
            Err(Error::WeakPassword { min: 8 })
        ));
        assert!(NewPassword::confirm("12345678", "12345678").is_ok());
    }

    #[tokio::test]
    async fn test_create_and_open() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("vault");

        let config = create(&dir).await;
        assert!(config.is_compatible());
        assert_eq!(
            entries(&dir),
            vec!["d", "m", "masterkey.strongroom", "vault.strongroom"]
        );

        let session = open_vault(&dir, PASSWORD, rng(2)).await.unwrap();
        assert!(session.list(&VaultPath::root()).unwrap().is_empty());
        assert_eq!(session.vault_dir(), dir.as_path());
    }

    #[tokio::test]
    async fn test_create_in_empty_existing_directory() {
        let temp = TempDir::new().unwrap();
        create(temp.path()).await;
        assert!(KeyFile::path(temp.path()).exists());
    }

    #[tokio::test]
    async fn test_create_rejects_non_empty_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("existing.txt"), b"keep me").unwrap();

        let result = create_vault(
            temp.path(),
            &new_password(PASSWORD),
            &fast_kdf(),
            &mut StdRng::seed_from_u64(1),
        )
        .await;

        assert!(matches!(result, Err(Error::DirectoryNotEmpty(_))));
        assert_eq!(entries(temp.path()), vec!["existing.txt"]);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("vault");
        let bad_kdf = KdfParams {
            memory_cost: 0,
            time_cost: 0,
            parallelism: 0,
        };

        let result = create_vault(
            &dir,
            &new_password(PASSWORD),
            &bad_kdf,
            &mut StdRng::seed_from_u64(1),
        )
        .await;

        assert!(result.is_err());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_failed_create_in_existing_directory_empties_it() {
        let temp = TempDir::new().unwrap();
        let bad_kdf = KdfParams {
            memory_cost: 0,
            time_cost: 0,
            parallelism: 0,
        };

        let result = create_vault(
            temp.path(),
            &new_password(PASSWORD),
            &bad_kdf,
            &mut StdRng::seed_from_u64(1),
        )
        .await;

        assert!(result.is_err());
        assert!(temp.path().is_dir());
        assert!(entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_open_wrong_password() {
        let temp = TempDir::new().unwrap();
        create(temp.path()).await;

        let result = open_vault(temp.path(), "not the password", rng(3)).await;
        assert!(matches!(result, Err(Error::WrongPassword)));
    }

    #[tokio::test]
    async fn test_open_non_vault() {
        let temp = TempDir::new().unwrap();
        let result = open_vault(temp.path(), PASSWORD, rng(3)).await;
        assert!(matches!(result, Err(Error::InvalidVault(_))));
    }

    #[tokio::test]
    async fn test_inspect_vault() {
        let temp = TempDir::new().unwrap();
        let config = create(temp.path()).await;

        let meta = inspect_vault(temp.path()).await.unwrap();
        assert!(meta.valid);
        assert_eq!(meta.format, Some(1));
        assert_eq!(meta.cipher_combo.as_deref(), Some("XCHACHA20_POLY1305"));
        assert_eq!(meta.vault_id.as_deref(), Some(config.jti.as_str()));
        assert_eq!(meta.kdf_cost, Some(1024));
    }

    #[tokio::test]
    async fn test_inspect_tolerates_missing_fields() {
        let temp = TempDir::new().unwrap();
        std::fs::write(KeyFile::path(temp.path()), b"{}").unwrap();
        std::fs::write(temp.path().join(CONFIG_FILENAME), b"garbage").unwrap();

        let meta = inspect_vault(temp.path()).await.unwrap();
        assert!(meta.valid);
        assert_eq!(meta.format, None);
        assert_eq!(meta.cipher_combo, None);
        assert_eq!(meta.kdf_cost, None);
    }

    #[tokio::test]
    async fn test_inspect_non_vault_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let meta = inspect_vault(temp.path()).await.unwrap();

        assert!(!meta.valid);
        assert!(meta.invalid_reason.is_some());
        assert!(entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_change_password() {
        let temp = TempDir::new().unwrap();
        create(temp.path()).await;
        {
            let mut session = open_vault(temp.path(), PASSWORD, rng(4)).await.unwrap();
            session.mkdir(&VaultPath::parse("/kept")).await.unwrap();
        }

        change_password(
            temp.path(),
            PASSWORD,
            &new_password("new password 123"),
            &mut StdRng::seed_from_u64(5),
        )
        .await
        .unwrap();

        assert!(matches!(
            open_vault(temp.path(), PASSWORD, rng(6)).await,
            Err(Error::WrongPassword)
        ));
        let session = open_vault(temp.path(), "new password 123", rng(7))
            .await
            .unwrap();
        assert!(session.is_directory(&VaultPath::parse("/kept")));

        assert_eq!(
            entries(temp.path()),
            vec!["d", "m", "masterkey.strongroom", "vault.strongroom"]
        );
        assert_eq!(inspect_vault(temp.path()).await.unwrap().kdf_cost, Some(1024));
    }

    #[tokio::test]
    async fn test_change_password_wrong_old_leaves_file() {
        let temp = TempDir::new().unwrap();
        create(temp.path()).await;
        let before = std::fs::read(KeyFile::path(temp.path())).unwrap();

        let result = change_password(
            temp.path(),
            "wrong password",
            &new_password("new password 123"),
            &mut StdRng::seed_from_u64(5),
        )
        .await;

        assert!(matches!(result, Err(Error::WrongPassword)));
        assert_eq!(std::fs::read(KeyFile::path(temp.path())).unwrap(), before);
    }
}
