//! Vault configuration artifact and on-disk layout names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use strongroom_common::{Error, Result, VaultId};
use strongroom_crypto::aead::CIPHER_COMBO;
use strongroom_crypto::SecureRandom;

/// Current vault format number.
pub const VAULT_FORMAT: u32 = 1;

/// Configuration file name in vault root.
pub const CONFIG_FILENAME: &str = "vault.strongroom";

/// Password-protected key file name in vault root.
pub const KEYFILE_NAME: &str = "masterkey.strongroom";

/// Data directory name in vault root.
pub const DATA_DIRNAME: &str = "d";

/// Metadata directory name in vault root.
pub const META_DIRNAME: &str = "m";

/// Encrypted tree filename in metadata directory.
pub const TREE_FILENAME: &str = "tree.enc";

/// Plain vault configuration stored at the vault root.
///
/// Holds no secrets; `inspect_vault` reads it without a password.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Vault format number.
    pub format: u32,
    /// Cipher suite label.
    pub cipher_combo: String,
    /// Unique vault identifier.
    pub jti: VaultId,
    /// Vault creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl VaultConfig {
    /// Create a configuration for a new vault with the given identifier.
    pub fn new(id: VaultId) -> Self {
        Self {
            format: VAULT_FORMAT,
            cipher_combo: CIPHER_COMBO.to_string(),
            jti: id,
            created_at: Utc::now(),
        }
    }

    /// Create a configuration with a random UUID drawn from `rng`.
    pub fn generate(rng: &mut dyn SecureRandom) -> Result<Self> {
        let id = random_uuid(rng);
        Ok(Self::new(VaultId::new(id.to_string())?))
    }

    /// Check if this configuration can be opened by this build.
    pub fn is_compatible(&self) -> bool {
        self.format == VAULT_FORMAT
    }

    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Version 4 UUID built from `rng` rather than an ambient generator.
pub(crate) fn random_uuid(rng: &mut dyn SecureRandom) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}
