//! Virtual filesystem tree representation.
//!
//! The vault tree holds the cleartext namespace: names, sizes, timestamps and
//! the blob each file's content lives in. It is persisted encrypted as a
//! single artifact, so storage only ever sees opaque blob identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use strongroom_common::{Error, Result, VaultPath};

/// Type of tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
}

/// Metadata for a tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Cleartext name.
    pub name: String,
    /// Node type.
    pub node_type: NodeType,
    /// Content blob identifier (only for files).
    pub blob_id: Option<String>,
    /// File size (only for files).
    pub size: Option<u64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// A node in the vault tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Node metadata.
    pub metadata: NodeMetadata,
    /// Children keyed by name (for directories).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    /// Create a new file node.
    pub fn new_file(name: impl Into<String>, blob_id: impl Into<String>, size: u64) -> Self {
        let now = Utc::now();

        Self {
            metadata: NodeMetadata {
                name: name.into(),
                node_type: NodeType::File,
                blob_id: Some(blob_id.into()),
                size: Some(size),
                created_at: now,
                modified_at: now,
            },
            children: BTreeMap::new(),
        }
    }

    /// Create a new directory node.
    pub fn new_directory(name: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            metadata: NodeMetadata {
                name: name.into(),
                node_type: NodeType::Directory,
                blob_id: None,
                size: None,
                created_at: now,
                modified_at: now,
            },
            children: BTreeMap::new(),
        }
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.metadata.node_type == NodeType::File
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        self.metadata.node_type == NodeType::Directory
    }

    /// Get child by name.
    pub fn get_child(&self, name: &str) -> Option<&TreeNode> {
        self.children.get(name)
    }

    /// Get mutable child by name.
    pub fn get_child_mut(&mut self, name: &str) -> Option<&mut TreeNode> {
        self.children.get_mut(name)
    }

    /// Add a child node.
    pub fn add_child(&mut self, node: TreeNode) -> Result<()> {
        if self.is_file() {
            return Err(Error::NotADirectory(self.metadata.name.clone()));
        }

        let name = node.metadata.name.clone();
        if self.children.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Child '{}' already exists",
                name
            )));
        }

        self.children.insert(name, node);
        self.metadata.modified_at = Utc::now();
        Ok(())
    }

    /// Remove a child by name.
    pub fn remove_child(&mut self, name: &str) -> Result<TreeNode> {
        let removed = self
            .children
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("Child '{}' not found", name)))?;
        self.metadata.modified_at = Utc::now();
        Ok(removed)
    }
}

/// Virtual filesystem tree for the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultTree {
    /// Root node.
    root: TreeNode,
}

impl VaultTree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self {
            root: TreeNode::new_directory("/"),
        }
    }

    /// Get the root node.
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Navigate to a node by path.
    pub fn get_node(&self, path: &VaultPath) -> Result<&TreeNode> {
        let mut current = &self.root;
        for component in path.components() {
            current = current
                .get_child(component)
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
        }

        Ok(current)
    }

    /// Navigate to a mutable node by path.
    pub fn get_node_mut(&mut self, path: &VaultPath) -> Result<&mut TreeNode> {
        let mut current = &mut self.root;
        for component in path.components() {
            current = current
                .get_child_mut(component)
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
        }

        Ok(current)
    }

    /// Get the directory that would hold `path`.
    ///
    /// # Errors
    /// - `NotFound` if the parent is missing
    /// - `NotADirectory` if the parent is a file
    fn parent_dir_mut(&mut self, path: &VaultPath) -> Result<&mut TreeNode> {
        let parent_path = path
            .parent()
            .ok_or_else(|| Error::InvalidInput("Root has no parent".to_string()))?;

        let parent = self.get_node_mut(&parent_path)?;
        if !parent.is_directory() {
            return Err(Error::NotADirectory(parent_path.to_string()));
        }
        Ok(parent)
    }

    /// Check if a path exists.
    pub fn exists(&self, path: &VaultPath) -> bool {
        self.get_node(path).is_ok()
    }

    /// Insert a file or update an existing one in place.
    ///
    /// An existing file keeps its creation time and takes the new blob and
    /// size. Replacing a directory with a file is rejected.
    pub fn upsert_file(&mut self, path: &VaultPath, blob_id: &str, size: u64) -> Result<()> {
        let name = path
            .name()
            .ok_or_else(|| Error::InvalidInput("Cannot write to the vault root".to_string()))?
            .to_string();

        let parent = self.parent_dir_mut(path)?;
        match parent.get_child_mut(&name) {
            Some(existing) if existing.is_directory() => Err(Error::InvalidInput(format!(
                "Is a directory: {}",
                path
            ))),
            Some(existing) => {
                existing.metadata.blob_id = Some(blob_id.to_string());
                existing.metadata.size = Some(size);
                existing.metadata.modified_at = Utc::now();
                Ok(())
            }
            None => parent.add_child(TreeNode::new_file(name, blob_id, size)),
        }
    }

    /// Create a directory in the tree. The parent must already exist.
    pub fn create_directory(&mut self, path: &VaultPath) -> Result<()> {
        let name = path
            .name()
            .ok_or_else(|| Error::InvalidInput("Cannot create directory at root".to_string()))?
            .to_string();

        let parent = self.parent_dir_mut(path)?;
        parent.add_child(TreeNode::new_directory(name))
    }

    /// Remove a node and its subtree from the tree.
    pub fn remove(&mut self, path: &VaultPath) -> Result<TreeNode> {
        let name = path
            .name()
            .ok_or_else(|| Error::InvalidInput("Cannot remove the vault root".to_string()))?
            .to_string();

        let parent = self.parent_dir_mut(path)?;
        parent.remove_child(&name)
    }

    /// List contents of a directory, ordered by name.
    pub fn list(&self, path: &VaultPath) -> Result<Vec<&TreeNode>> {
        let node = self.get_node(path)?;
        if !node.is_directory() {
            return Err(Error::NotADirectory(path.to_string()));
        }

        Ok(node.children.values().collect())
    }

    /// All paths under `path` (inclusive) in post-order: every child is
    /// yielded before its parent.
    ///
    /// Walks with an explicit work-stack so depth is bounded only by memory.
    pub fn post_order(&self, path: &VaultPath) -> Result<Vec<VaultPath>> {
        let start = self.get_node(path)?;

        let mut order = Vec::new();
        let mut stack = vec![(path.clone(), start, false)];
        while let Some((current, node, expanded)) = stack.pop() {
            if expanded || node.children.is_empty() {
                order.push(current);
                continue;
            }

            stack.push((current.clone(), node, true));
            for (name, child) in node.children.iter().rev() {
                stack.push((current.join(name)?, child, false));
            }
        }

        Ok(order)
    }

    /// Count the total number of files in the tree.
    pub fn count_files(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            for child in node.children.values() {
                if child.is_file() {
                    count += 1;
                } else {
                    stack.push(child);
                }
            }
        }
        count
    }

    /// Serialize tree to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize tree from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Default for VaultTree {
    fn default() -> Self {
        Self::new()
    }
}
