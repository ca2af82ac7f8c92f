//! Path-keyed folder cache for albumsync.
//!
//! This module stores the last known listing of every folder the user has
//! browsed:
//! - One entry per [`FolderPath`] (the root is a reserved key)
//! - Presence alone means "usable"; there is no TTL
//! - Writes replace a whole entry, never a single node
//!
//! The sync engine decides when an entry is replaced. Background
//! revalidation uses [`FolderCache::replace_if_changed`], which compares the
//! stored and fresh entries with exact, order-sensitive equality.

use serde::Serialize;
use std::collections::HashMap;
use albumsync_types::{Breadcrumb, FolderListing, FolderPath, TreeNode};

/// Snapshot of one folder's listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Nodes in the order the service returned them.
    pub nodes: Vec<TreeNode>,
    /// Trail from the root to this folder.
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl CacheEntry {
    /// Create an entry.
    pub fn new(nodes: Vec<TreeNode>, breadcrumbs: Vec<Breadcrumb>) -> Self {
        Self { nodes, breadcrumbs }
    }

    /// Find a node by identifier.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

impl From<FolderListing> for CacheEntry {
    fn from(listing: FolderListing) -> Self {
        Self {
            nodes: listing.nodes,
            breadcrumbs: listing.breadcrumbs,
        }
    }
}

/// Cache of folder listings keyed by path.
#[derive(Debug, Default)]
pub struct FolderCache {
    entries: HashMap<FolderPath, CacheEntry>,
}

impl FolderCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a path.
    pub fn get(&self, path: &FolderPath) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    /// Whether an entry exists for a path.
    pub fn contains(&self, path: &FolderPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Store an entry, replacing any previous entry for the path.
    pub fn insert(&mut self, path: FolderPath, entry: CacheEntry) {
        self.entries.insert(path, entry);
    }

    /// Replace the entry for `path` only if `entry` differs from it.
    ///
    /// Returns `true` when the cache changed. A missing entry counts as
    /// different. Equality is structural and order-sensitive: the same nodes
    /// in another order are a change.
    pub fn replace_if_changed(&mut self, path: FolderPath, entry: CacheEntry) -> bool {
        match self.entries.get(&path) {
            Some(existing) if *existing == entry => false,
            _ => {
                self.entries.insert(path, entry);
                true
            }
        }
    }

    /// Drop the entry for a path. Returns whether one existed.
    pub fn invalidate(&mut self, path: &FolderPath) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached paths, sorted.
    pub fn paths(&self) -> Vec<FolderPath> {
        let mut paths: Vec<FolderPath> = self.entries.keys().cloned().collect();
        paths.sort();
        paths
    }
}
