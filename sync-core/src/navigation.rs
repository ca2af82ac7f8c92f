//! Navigation state for albumsync.
//!
//! Tracks the folder the user is looking at, its breadcrumb trail, and a
//! stack of previously visited paths for back-navigation. One instance
//! exists per browsing session, owned by the sync engine.

use serde::Serialize;
use albumsync_types::{Breadcrumb, FolderPath};

/// Current position in the hierarchy plus back-navigation history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    current: FolderPath,
    breadcrumbs: Vec<Breadcrumb>,
    history: Vec<FolderPath>,
}

/// Copy of a [`NavigationState`] taken before a mutating operation.
pub type NavigationSnapshot = NavigationState;

impl NavigationState {
    /// Start at the root with empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// The path currently displayed.
    pub fn current(&self) -> &FolderPath {
        &self.current
    }

    /// Breadcrumb trail of the current path.
    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    /// Previously visited paths, oldest first.
    pub fn history(&self) -> &[FolderPath] {
        &self.history
    }

    /// Whether `path` is the path currently displayed.
    pub fn is_current(&self, path: &FolderPath) -> bool {
        self.current == *path
    }

    /// Set the current path without touching history.
    pub fn set_current(&mut self, path: FolderPath) {
        self.current = path;
    }

    /// Replace the breadcrumb trail of the current path.
    pub fn set_breadcrumbs(&mut self, breadcrumbs: Vec<Breadcrumb>) {
        self.breadcrumbs = breadcrumbs;
    }

    /// Push the current path onto history and move to `path`.
    pub fn descend_to(&mut self, path: FolderPath) {
        let previous = std::mem::replace(&mut self.current, path);
        self.history.push(previous);
    }

    /// Pop the last visited path (root when history is empty) and move to it.
    ///
    /// Returns the new current path.
    pub fn ascend(&mut self) -> FolderPath {
        let target = self.history.pop().unwrap_or_else(FolderPath::root);
        self.current = target.clone();
        target
    }

    /// Clear history and move to the root.
    pub fn jump_to_root(&mut self) {
        self.history.clear();
        self.current = FolderPath::root();
    }

    /// Copy the whole state.
    pub fn snapshot(&self) -> NavigationSnapshot {
        self.clone()
    }

    /// Restore a previously taken snapshot.
    pub fn restore(&mut self, snapshot: NavigationSnapshot) {
        *self = snapshot;
    }

    /// Back to the root with no breadcrumbs and no history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_root_with_empty_history() {
        let nav = NavigationState::new();
        assert!(nav.current().is_root());
        assert!(nav.history().is_empty());
        assert!(nav.breadcrumbs().is_empty());
    }

    #[test]
    fn descend_pushes_current_onto_history() {
        let mut nav = NavigationState::new();
        nav.descend_to(FolderPath::new("2024"));

        assert_eq!(nav.current(), &FolderPath::new("2024"));
        assert_eq!(nav.history(), &[FolderPath::root()]);
    }

    #[test]
    fn descend_then_ascend_returns_to_root() {
        let mut nav = NavigationState::new();
        nav.descend_to(FolderPath::new("2024"));

        let target = nav.ascend();

        assert!(target.is_root());
        assert!(nav.current().is_root());
        assert!(nav.history().is_empty());
    }

    #[test]
    fn ascend_with_empty_history_goes_to_root() {
        let mut nav = NavigationState::new();
        nav.set_current(FolderPath::new("/Trips/Italy"));

        assert!(nav.ascend().is_root());
        assert!(nav.current().is_root());
    }

    #[test]
    fn ascend_pops_in_reverse_order() {
        let mut nav = NavigationState::new();
        nav.descend_to(FolderPath::new("/Trips"));
        nav.descend_to(FolderPath::new("/Trips/Italy"));

        assert_eq!(nav.ascend(), FolderPath::new("/Trips"));
        assert_eq!(nav.ascend(), FolderPath::root());
    }

    #[test]
    fn jump_to_root_clears_history() {
        let mut nav = NavigationState::new();
        nav.descend_to(FolderPath::new("/Trips"));
        nav.descend_to(FolderPath::new("/Trips/Italy"));

        nav.jump_to_root();

        assert!(nav.current().is_root());
        assert!(nav.history().is_empty());
    }

    #[test]
    fn snapshot_and_restore_round_trip() {
        let mut nav = NavigationState::new();
        nav.descend_to(FolderPath::new("/Trips"));
        nav.set_breadcrumbs(vec![Breadcrumb::new("t", "Trips")]);
        let snapshot = nav.snapshot();

        nav.reset();
        assert!(nav.current().is_root());

        nav.restore(snapshot);
        assert_eq!(nav.current(), &FolderPath::new("/Trips"));
        assert_eq!(nav.history(), &[FolderPath::root()]);
        assert_eq!(nav.breadcrumbs()[0].name, "Trips");
    }

    #[test]
    fn serializes_for_ui() {
        let mut nav = NavigationState::new();
        nav.descend_to(FolderPath::new("2024"));
        let json = serde_json::to_value(&nav).unwrap();
        assert_eq!(json["current"], "2024");
        assert_eq!(json["history"][0], "");
    }
}
