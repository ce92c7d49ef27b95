//! Common types used throughout strongroom.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultId(String);

impl VaultId {
    /// Create a new VaultId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "VaultId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An absolute, normalized path within a vault, independent of underlying storage.
///
/// Components are never empty and never `.` or `..`, so every value is already
/// in normal form. Root is the empty component list and renders as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VaultPath {
    components: Vec<String>,
}

impl VaultPath {
    /// Create a root path.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Normalize a path string into an absolute VaultPath.
    ///
    /// Relative input is taken relative to root. Never fails.
    pub fn parse(path: &str) -> Self {
        Self::root().resolve(path)
    }

    /// Resolve `input` against this path.
    ///
    /// Input starting with `/` is absolute and ignores `self`. Otherwise it is
    /// appended to `self`. Empty and `.` segments are dropped, `..` pops one
    /// segment and is a no-op at root.
    pub fn resolve(&self, input: &str) -> Self {
        let mut stack: Vec<String> = if input.starts_with('/') {
            Vec::new()
        } else {
            self.components.clone()
        };

        for segment in input.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    stack.pop();
                }
                other => stack.push(other.to_string()),
            }
        }

        Self { components: stack }
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the file/directory name (last component).
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a single child component.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        validate_component(child)?;
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Every prefix of this path from the first component down to the path
    /// itself. Root yields nothing.
    pub fn ancestors_inclusive(&self) -> impl Iterator<Item = VaultPath> + '_ {
        (1..=self.components.len()).map(move |len| Self {
            components: self.components[..len].to_vec(),
        })
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Convert to a string representation.
    pub fn to_string_path(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}", self.components.join("/"))
        }
    }
}

fn validate_component(comp: &str) -> crate::Result<()> {
    if comp.is_empty() {
        return Err(crate::Error::InvalidInput(
            "Path component cannot be empty".to_string(),
        ));
    }
    if comp == "." || comp == ".." {
        return Err(crate::Error::InvalidInput(format!(
            "Path component cannot be '{}'",
            comp
        )));
    }
    if comp.contains('/') {
        return Err(crate::Error::InvalidInput(
            "Path component cannot contain a separator".to_string(),
        ));
    }
    Ok(())
}

impl Default for VaultPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for VaultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_path())
    }
}
