//! CLI command implementations.

pub mod browse;
pub mod chat;
pub mod ls;
pub mod status;
pub mod sync_album;

use albumsync_core::CacheEntry;
use albumsync_types::{FolderPath, TreeNode};
use std::io::{self, Write};

/// Print a folder listing with its breadcrumb trail.
pub fn render_listing(out: &mut impl Write, path: &FolderPath, entry: &CacheEntry) -> io::Result<()> {
    let trail: Vec<&str> = std::iter::once("Home")
        .chain(entry.breadcrumbs.iter().map(|b| b.name.as_str()))
        .collect();
    writeln!(out, "{}  ({})", path, trail.join(" / "))?;

    if entry.nodes.is_empty() {
        writeln!(out, "  (empty)")?;
    }
    for node in &entry.nodes {
        writeln!(out, "  {}", describe(node))?;
    }
    Ok(())
}

/// One-line description of a node.
pub fn describe(node: &TreeNode) -> String {
    if node.is_folder() {
        format!("[folder] {:<8} {} ({} items)", node.id, node.name, node.count())
    } else {
        format!("[album]  {:<8} {} ({} photos)", node.id, node.name, node.count())
    }
}

/// Path of a folder listed under `parent`.
pub fn folder_path(parent: &FolderPath, node: &TreeNode) -> FolderPath {
    FolderPath::new(&format!("{}/{}", parent.as_str(), node.name))
}
