//! Cryptographic primitives for strongroom.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Secure key management with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Randomness always comes from a caller-supplied [`SecureRandom`]; there is
//!   no global generator

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt};
pub use kdf::{derive_key, KdfParams};
pub use keys::{ContentKey, KeyEncryptionKey, MasterKey, Salt};

use rand::{CryptoRng, RngCore};

/// A cryptographically secure random source that can be passed around as a
/// trait object.
pub trait SecureRandom: RngCore + CryptoRng {}

impl<T: RngCore + CryptoRng> SecureRandom for T {}
