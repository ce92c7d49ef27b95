//! Storage provider abstraction for strongroom.
//!
//! Storage providers hold ciphertext only: encrypted blobs, the encrypted
//! namespace tree and the plain vault artifacts. They know nothing about keys
//! or the virtual namespace.
//!
//! # Design Principles
//! - Provider isolation: No provider-specific logic in vault or crypto modules
//! - Async operations: All I/O operations are async
//! - Unified error semantics: Consistent error types across providers

pub mod local;
pub mod memory;
pub mod provider;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{Metadata, StorageProvider};
