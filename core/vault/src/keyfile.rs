//! Password-protected master key file.
//!
//! The key file is the only artifact that ties a password to a vault. It
//! holds the Argon2id parameters, the salt and the master key wrapped under
//! the password-derived key. Its presence is what makes a directory a vault.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use zeroize::Zeroizing;

use strongroom_common::{Error, Result};
use strongroom_crypto::{decrypt, derive_key, encrypt, KdfParams, MasterKey, Salt, SecureRandom};
use strongroom_storage::local::write_atomic;

use crate::config::KEYFILE_NAME;

/// Key file format version.
pub const KEYFILE_VERSION: u32 = 1;

/// Serialized key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    /// Key file format version.
    pub version: u32,
    /// Argon2id parameters used to derive the wrapping key.
    pub kdf: KdfParams,
    /// Base64 salt.
    pub salt: String,
    /// Base64 of nonce || wrapped master key || tag.
    pub wrapped_key: String,
}

impl KeyFile {
    /// Wrap `key` under a key derived from `password`.
    ///
    /// A fresh salt is drawn from `rng` on every call.
    pub fn seal(
        key: &MasterKey,
        password: &[u8],
        kdf: &KdfParams,
        rng: &mut dyn SecureRandom,
    ) -> Result<Self> {
        let salt = Salt::generate(rng);
        let kek = derive_key(password, &salt, kdf)?;
        let wrapped = encrypt(kek.as_bytes(), key.as_bytes(), rng)?;

        Ok(Self {
            version: KEYFILE_VERSION,
            kdf: kdf.clone(),
            salt: BASE64.encode(salt.as_bytes()),
            wrapped_key: BASE64.encode(wrapped),
        })
    }

    /// Unwrap the master key with `password`.
    ///
    /// # Errors
    /// - `WrongPassword` if authentication of the wrapped key fails
    /// - `InvalidVault` if the file contents are malformed
    pub fn unlock(&self, password: &[u8]) -> Result<MasterKey> {
        if password.is_empty() {
            return Err(Error::WrongPassword);
        }

        let salt_bytes = BASE64
            .decode(&self.salt)
            .map_err(|_| Error::InvalidVault("key file salt is not base64".to_string()))?;
        let salt = Salt::from_slice(&salt_bytes)
            .ok_or_else(|| Error::InvalidVault("key file salt has wrong length".to_string()))?;
        let wrapped = BASE64
            .decode(&self.wrapped_key)
            .map_err(|_| Error::InvalidVault("wrapped key is not base64".to_string()))?;

        let kek = derive_key(password, &salt, &self.kdf)
            .map_err(|e| Error::InvalidVault(format!("unusable KDF parameters: {}", e)))?;
        let plain = Zeroizing::new(
            decrypt(kek.as_bytes(), &wrapped).map_err(|_| Error::WrongPassword)?,
        );

        MasterKey::from_slice(&plain)
            .ok_or_else(|| Error::InvalidVault("wrapped key has wrong length".to_string()))
    }

    /// Location of the key file inside `vault_dir`.
    pub fn path(vault_dir: &Path) -> PathBuf {
        vault_dir.join(KEYFILE_NAME)
    }

    /// Read and parse the key file.
    ///
    /// A missing or unparsable file means the directory is not a vault.
    pub async fn load(vault_dir: &Path) -> Result<Self> {
        let path = Self::path(vault_dir);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::InvalidVault(format!(
                    "{} not found in {}",
                    KEYFILE_NAME,
                    vault_dir.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidVault(format!("{} is malformed: {}", KEYFILE_NAME, e)))
    }

    /// Write the key file, atomically replacing any previous one.
    pub async fn store(&self, vault_dir: &Path) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        write_atomic(&Self::path(vault_dir), &json).await
    }
}
