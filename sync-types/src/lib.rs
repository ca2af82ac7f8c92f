//! # sync-types
//!
//! Data model and wire types for albumsync.
//!
//! This crate provides the foundational types used across all albumsync crates:
//! - [`TreeNode`], [`NodeKind`], [`Breadcrumb`], [`FolderListing`] - The remote album hierarchy
//! - [`FolderPath`] - Cache key for a folder (root is a reserved key)
//! - [`ClientId`], [`SessionId`] - Realtime session identity
//! - [`OutboundMessage`], [`AlbumSyncResult`] - Wire payloads
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod node;

pub use error::TypesError;
pub use ids::{ClientId, FolderPath, SessionId};
pub use messages::{AlbumSyncResult, OutboundMessage};
pub use node::{Breadcrumb, FolderListing, NodeKind, TreeNode};
