//! Common error types for strongroom.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for strongroom operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The directory has no key file, or its vault artifacts are malformed.
    #[error("Not a valid vault: {0}")]
    InvalidVault(String),

    /// The password did not unlock the key file.
    #[error("Wrong password")]
    WrongPassword,

    /// A directory that had to be empty was not.
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A path segment that had to be a directory is a file.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A local source file does not exist.
    #[error("Local file not found: {}", .0.display())]
    LocalFileNotFound(PathBuf),

    /// Password and confirmation differ.
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// Password is shorter than the minimum length.
    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Opaque failure from the storage layer, tagged with the virtual path
    /// that triggered it.
    #[error("Storage error at {path}: {source}")]
    StorageProvider {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// Whether this error belongs to the user-facing vault taxonomy, as opposed
    /// to an opaque storage, crypto or I/O failure.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Error::InvalidVault(_)
                | Error::WrongPassword
                | Error::DirectoryNotEmpty(_)
                | Error::NotFound(_)
                | Error::NotADirectory(_)
                | Error::LocalFileNotFound(_)
                | Error::PasswordMismatch
                | Error::WeakPassword { .. }
                | Error::StorageProvider { .. }
        )
    }

    /// Wrap a non-domain error with the virtual path it occurred at.
    ///
    /// Domain errors pass through unchanged.
    pub fn at_path(self, path: impl ToString) -> Self {
        if self.is_domain() {
            self
        } else {
            Error::StorageProvider {
                path: path.to_string(),
                source: Box::new(self),
            }
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_path_wraps_storage_errors() {
        let err = Error::Storage("disk on fire".to_string()).at_path("/docs/a.txt");
        match err {
            Error::StorageProvider { path, source } => {
                assert_eq!(path, "/docs/a.txt");
                assert!(matches!(*source, Error::Storage(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_at_path_keeps_domain_errors() {
        let err = Error::NotFound("/x".to_string()).at_path("/x");
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_storage_provider_display_includes_path() {
        let err = Error::Io(std::io::Error::other("boom")).at_path("/a");
        assert!(err.to_string().starts_with("Storage error at /a:"));
    }
}
