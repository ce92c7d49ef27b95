//! Vault engine for strongroom.
//!
//! This module provides:
//! - Vault creation, unlocking, inspection and password change
//! - Encrypted file and directory operations
//! - An encrypted namespace tree over opaque content blobs
//! - Sessions that release their key exactly once
//!
//! # Architecture
//! The vault module sits between the user interface and storage providers,
//! handling all encryption/decryption operations transparently.

pub mod config;
pub mod handle;
pub mod keyfile;
pub mod lifecycle;
pub mod session;
pub mod tree;

pub use config::VaultConfig;
pub use handle::{DirectoryEntry, VaultHandle};
pub use keyfile::KeyFile;
pub use lifecycle::{
    change_password, create_vault, inspect_vault, open_vault, NewPassword, VaultMetadata,
    MIN_PASSWORD_LENGTH,
};
pub use session::VaultSession;
pub use tree::{NodeType, TreeNode, VaultTree};
