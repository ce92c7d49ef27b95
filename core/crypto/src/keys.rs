//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::SecureRandom;

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of KDF salts in bytes.
pub const SALT_LENGTH: usize = 32;

/// Randomly generated vault master key.
///
/// The root of the key hierarchy: content and tree keys are derived from it.
/// It is stored on disk only wrapped under a password-derived
/// [`KeyEncryptionKey`]. Deliberately not `Clone`, so each key has exactly one
/// owner responsible for destroying it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
    #[zeroize(skip)]
    destroyed: bool,
}

impl MasterKey {
    /// Generate a fresh master key from the given random source.
    pub fn generate(rng: &mut dyn SecureRandom) -> Self {
        let mut key = [0u8; KEY_LENGTH];
        rng.fill_bytes(&mut key);
        Self::from_bytes(key)
    }

    /// Create a master key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self {
            key,
            destroyed: false,
        }
    }

    /// Create a master key by copying a slice straight into the key.
    ///
    /// Returns `None` unless the slice is exactly `KEY_LENGTH` bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LENGTH {
            return None;
        }
        let mut key = Self::from_bytes([0u8; KEY_LENGTH]);
        key.key.copy_from_slice(bytes);
        Some(key)
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Zero the key material now instead of waiting for drop.
    ///
    /// Idempotent. A destroyed key holds only zero bytes.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            self.key.zeroize();
            self.destroyed = true;
        }
    }

    /// Whether [`MasterKey::destroy`] has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Derive the key for one content blob.
    ///
    /// Uses blake2b keyed by the master key and the blob identifier.
    pub fn derive_content_key(&self, blob_id: &[u8]) -> ContentKey {
        self.derive(blob_id, b"filekey")
    }

    /// Derive the key protecting the namespace tree.
    pub fn derive_tree_key(&self) -> ContentKey {
        self.derive(b"tree", b"treekey")
    }

    fn derive(&self, id: &[u8], label: &[u8]) -> ContentKey {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.key);
        hasher.update(id);
        hasher.update(label);

        let result = hasher.finalize();
        let mut derived = [0u8; KEY_LENGTH];
        derived.copy_from_slice(&result);
        ContentKey::from_bytes(derived)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Key for encrypting file contents and the namespace tree.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    key: [u8; KEY_LENGTH],
}

impl ContentKey {
    /// Create a content key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey([REDACTED])")
    }
}

/// Password-derived key that wraps the master key in the key file.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyEncryptionKey {
    key: [u8; KEY_LENGTH],
}

impl KeyEncryptionKey {
    /// Create a key-encryption key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyEncryptionKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt.
    pub fn generate(rng: &mut dyn SecureRandom) -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        rng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, failing on the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; SALT_LENGTH]>::try_from(bytes).ok().map(Self)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}
