//! Tree nodes and folder listings returned by the photo API.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::TypesError;

/// Whether a node is a folder (contains nodes) or an album (contains photos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A folder of folders and albums.
    Folder,
    /// An album of photos.
    Album,
}

/// One folder or album entry in the remote hierarchy.
///
/// Nodes are never patched in place: every revalidation replaces the whole
/// listing they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Stable identifier, unique within the parent listing.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Folder or album.
    #[serde(rename = "type", alias = "kind")]
    pub kind: NodeKind,
    /// URI-like reference to the parent folder.
    #[serde(default)]
    pub parent_path: String,
    /// Number of children (folders only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u64>,
    /// Number of photos (albums only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_count: Option<u64>,
}

impl TreeNode {
    /// Create a folder node.
    pub fn folder(id: &str, name: &str, parent_path: &str, child_count: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: NodeKind::Folder,
            parent_path: parent_path.to_string(),
            child_count: Some(child_count),
            photo_count: None,
        }
    }

    /// Create an album node.
    pub fn album(id: &str, name: &str, parent_path: &str, photo_count: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: NodeKind::Album,
            parent_path: parent_path.to_string(),
            child_count: None,
            photo_count: Some(photo_count),
        }
    }

    /// Whether this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Whether this node is an album.
    pub fn is_album(&self) -> bool {
        self.kind == NodeKind::Album
    }

    /// Child count for folders, photo count for albums.
    pub fn count(&self) -> u64 {
        match self.kind {
            NodeKind::Folder => self.child_count.unwrap_or(0),
            NodeKind::Album => self.photo_count.unwrap_or(0),
        }
    }
}

/// One step of the trail from the root to the current folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Folder identifier.
    pub id: String,
    /// Display name.
    #[serde(alias = "display_name")]
    pub name: String,
}

impl Breadcrumb {
    /// Create a breadcrumb.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Response body of the folder-contents endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderListing {
    /// Nodes in the order the service returned them.
    #[serde(default)]
    pub nodes: Vec<TreeNode>,
    /// Trail from the root to this folder.
    #[serde(default)]
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl FolderListing {
    /// Create a listing.
    pub fn new(nodes: Vec<TreeNode>, breadcrumbs: Vec<Breadcrumb>) -> Self {
        Self { nodes, breadcrumbs }
    }

    /// Reject listings in which two nodes share an identifier.
    pub fn validate(&self) -> Result<(), TypesError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(TypesError::DuplicateNode {
                    id: node.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Find a node by identifier.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Decode a listing from JSON.
    pub fn from_json(json: &str) -> Result<Self, TypesError> {
        serde_json::from_str(json).map_err(TypesError::Deserialization)
    }
}
