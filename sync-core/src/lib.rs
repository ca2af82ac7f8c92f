//! # sync-core
//!
//! Pure logic for albumsync (no I/O, instant tests).
//!
//! This crate implements the cache, navigation and connection state machines
//! without any network access, timers or async, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`FolderCache`] stores path-keyed snapshots by whole-entry replacement
//! - [`NavigationState`] tracks the current path and back-navigation history
//! - [`ChannelMachine`] turns connection events into a new state plus actions
//!
//! The actual I/O (HTTP fetches, sockets, timers) is performed by
//! `sync-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod channel;
pub mod navigation;

pub use cache::{CacheEntry, FolderCache};
pub use channel::{
    BackoffPolicy, ChannelAction, ChannelEvent, ChannelMachine, ChannelNotice, ChannelState,
    CloseReason,
};
pub use navigation::{NavigationSnapshot, NavigationState};
