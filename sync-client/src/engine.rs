//! Sync engine: cached mirror of the remote album tree.
//!
//! Reads are cache-first. A cache hit is reported immediately and a
//! background task re-fetches the same folder; the fresh listing replaces the
//! cached one only if it differs, and the UI hears about it only if the user
//! is still looking at that folder. A miss fetches, caches and reports.
//!
//! The engine also owns navigation (current folder, breadcrumbs, history)
//! and the "sync one album" flow, which reloads the current folder in place
//! so the user keeps their position.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::task::JoinHandle;

use albumsync_core::{CacheEntry, FolderCache, NavigationSnapshot, NavigationState};
use albumsync_types::{AlbumSyncResult, Breadcrumb, FolderPath, TreeNode};

use crate::api::{ApiError, PhotoApi};
use crate::bus::{AppEvent, EventBus, LoadSource};

/// Sync engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The photo service call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of a background revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationOutcome {
    /// The fresh listing matched the cache.
    Unchanged,
    /// The cache was replaced and the UI was told.
    Updated,
    /// The cache was replaced but the user had moved on, so the UI was not told.
    UpdatedSilently,
    /// The fetch failed; the cache was left alone.
    Failed,
}

/// Handle to a spawned background revalidation.
///
/// Dropping it leaves the task running.
#[derive(Debug)]
pub struct Revalidation {
    handle: JoinHandle<RevalidationOutcome>,
}

impl Revalidation {
    /// Wait for the revalidation to finish.
    pub async fn wait(self) -> RevalidationOutcome {
        self.handle.await.unwrap_or(RevalidationOutcome::Failed)
    }

    /// Whether the task has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// What [`SyncEngine::load_path`] produced.
#[derive(Debug)]
pub struct LoadOutcome {
    /// Folder that was loaded.
    pub path: FolderPath,
    /// The listing shown to the user.
    pub entry: CacheEntry,
    /// Whether `entry` came from the cache.
    pub source: LoadSource,
    /// Background refresh started by a cache hit.
    pub revalidation: Option<Revalidation>,
}

/// What [`SyncEngine::sync_album`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    /// The service's answer.
    pub result: AlbumSyncResult,
    /// The album as found in the reloaded folder.
    pub album: Option<TreeNode>,
    /// `false` when the reload failed and navigation fell back to the root.
    pub context_preserved: bool,
}

#[derive(Debug, Default)]
struct EngineState {
    cache: FolderCache,
    nav: NavigationState,
}

struct Shared<A> {
    api: A,
    bus: EventBus,
    state: Mutex<EngineState>,
}

/// Cached, navigable view of the remote album tree.
///
/// Cloning is cheap and every clone shares the same cache and navigation.
pub struct SyncEngine<A: PhotoApi> {
    shared: Arc<Shared<A>>,
}

impl<A: PhotoApi> Clone for SyncEngine<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: PhotoApi> SyncEngine<A> {
    /// Create an engine at the root with an empty cache.
    pub fn new(api: A, bus: EventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                bus,
                state: Mutex::new(EngineState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: AppEvent) {
        self.shared.bus.publish(event);
    }

    /// The bus this engine publishes on.
    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// The API this engine fetches from.
    pub fn api(&self) -> &A {
        &self.shared.api
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Show the folder at `path`, cache first.
    ///
    /// If the folder is not cached and its fetch fails, navigation goes back
    /// to where it was, unless another load has moved on meanwhile.
    pub async fn load_path(&self, path: impl Into<FolderPath>) -> Result<LoadOutcome, EngineError> {
        let before = self.lock().nav.snapshot();
        self.show(path.into(), before).await
    }

    async fn show(&self, path: FolderPath, before: NavigationSnapshot) -> Result<LoadOutcome, EngineError> {
        let cached = {
            let mut state = self.lock();
            state.nav.set_current(path.clone());
            let cached = state.cache.get(&path).cloned();
            if let Some(entry) = &cached {
                state.nav.set_breadcrumbs(entry.breadcrumbs.clone());
            }
            cached
        };

        match cached {
            Some(entry) => {
                tracing::debug!(%path, nodes = entry.nodes.len(), "cache hit");
                self.publish(AppEvent::FolderLoaded {
                    path: path.clone(),
                    nodes: entry.nodes.clone(),
                    breadcrumbs: entry.breadcrumbs.clone(),
                    source: LoadSource::Cache,
                });
                let revalidation = self.spawn_revalidation(path.clone());
                Ok(LoadOutcome {
                    path,
                    entry,
                    source: LoadSource::Cache,
                    revalidation: Some(revalidation),
                })
            }
            None => self.load_fresh(path, before).await,
        }
    }

    async fn load_fresh(
        &self,
        path: FolderPath,
        before: NavigationSnapshot,
    ) -> Result<LoadOutcome, EngineError> {
        tracing::debug!(%path, "cache miss, fetching");
        self.publish(AppEvent::LoadingStarted { path: path.clone() });

        let listing = match self.shared.api.folder_contents(&path).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(%path, error = %e, "folder load failed");
                {
                    let mut state = self.lock();
                    if state.nav.is_current(&path) {
                        state.nav.restore(before);
                    }
                }
                self.publish(AppEvent::FolderError {
                    path: path.clone(),
                    message: e.to_string(),
                });
                self.publish(AppEvent::LoadingFinished { path });
                return Err(e.into());
            }
        };

        let entry = CacheEntry::from(listing);
        let still_current = {
            let mut state = self.lock();
            state.cache.insert(path.clone(), entry.clone());
            let still_current = state.nav.is_current(&path);
            if still_current {
                state.nav.set_breadcrumbs(entry.breadcrumbs.clone());
            }
            still_current
        };

        // A listing for a folder the user already left is cached, not shown
        if still_current {
            self.publish(AppEvent::FolderLoaded {
                path: path.clone(),
                nodes: entry.nodes.clone(),
                breadcrumbs: entry.breadcrumbs.clone(),
                source: LoadSource::Fresh,
            });
        } else {
            tracing::debug!(%path, "fresh listing arrived for a folder no longer shown");
        }
        self.publish(AppEvent::LoadingFinished { path: path.clone() });

        Ok(LoadOutcome {
            path,
            entry,
            source: LoadSource::Fresh,
            revalidation: None,
        })
    }

    fn spawn_revalidation(&self, path: FolderPath) -> Revalidation {
        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.revalidate(path).await });
        Revalidation { handle }
    }

    async fn revalidate(&self, path: FolderPath) -> RevalidationOutcome {
        let listing = match self.shared.api.folder_contents(&path).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(%path, error = %e, "background revalidation failed");
                return RevalidationOutcome::Failed;
            }
        };

        let entry = CacheEntry::from(listing);
        let (changed, still_current) = {
            let mut state = self.lock();
            let changed = state.cache.replace_if_changed(path.clone(), entry.clone());
            let still_current = state.nav.is_current(&path);
            if changed && still_current {
                state.nav.set_breadcrumbs(entry.breadcrumbs.clone());
            }
            (changed, still_current)
        };

        match (changed, still_current) {
            (false, _) => {
                tracing::trace!(%path, "revalidation: unchanged");
                RevalidationOutcome::Unchanged
            }
            (true, true) => {
                tracing::debug!(%path, "revalidation: listing changed");
                self.publish(AppEvent::FolderUpdated {
                    path,
                    nodes: entry.nodes,
                    breadcrumbs: entry.breadcrumbs,
                });
                RevalidationOutcome::Updated
            }
            (true, false) => {
                tracing::debug!(%path, "revalidation: listing changed for a folder no longer shown");
                RevalidationOutcome::UpdatedSilently
            }
        }
    }

    /// Re-fetch the current folder, bypassing the cache.
    pub async fn refresh(&self) -> Result<LoadOutcome, EngineError> {
        let path = {
            let mut state = self.lock();
            let path = state.nav.current().clone();
            state.cache.invalidate(&path);
            path
        };
        self.load_path(path).await
    }

    /// Drop the cached listing for `path`. Returns whether one existed.
    pub fn invalidate(&self, path: &FolderPath) -> bool {
        self.lock().cache.invalidate(path)
    }

    /// Drop every cached listing.
    pub fn clear_cache(&self) {
        self.lock().cache.clear();
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Enter `path`, remembering the current folder for [`Self::ascend`].
    pub async fn descend(&self, path: impl Into<FolderPath>) -> Result<LoadOutcome, EngineError> {
        let path = path.into();
        let before = {
            let mut state = self.lock();
            let before = state.nav.snapshot();
            state.nav.descend_to(path.clone());
            before
        };
        self.show(path, before).await
    }

    /// Go back to the previously visited folder, or the root.
    pub async fn ascend(&self) -> Result<LoadOutcome, EngineError> {
        let (target, before) = {
            let mut state = self.lock();
            let before = state.nav.snapshot();
            (state.nav.ascend(), before)
        };
        self.show(target, before).await
    }

    /// Forget history and show the root.
    pub async fn jump_to_root(&self) -> Result<LoadOutcome, EngineError> {
        let before = {
            let mut state = self.lock();
            let before = state.nav.snapshot();
            state.nav.jump_to_root();
            before
        };
        self.show(FolderPath::root(), before).await
    }

    /// Folder currently shown.
    pub fn current_path(&self) -> FolderPath {
        self.lock().nav.current().clone()
    }

    /// Breadcrumb trail of the current folder.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.lock().nav.breadcrumbs().to_vec()
    }

    /// Previously visited folders, oldest first.
    pub fn history(&self) -> Vec<FolderPath> {
        self.lock().nav.history().to_vec()
    }

    /// Copy of the whole navigation state.
    pub fn navigation(&self) -> NavigationSnapshot {
        self.lock().nav.snapshot()
    }

    /// Cached listing for `path`.
    pub fn cached(&self, path: &FolderPath) -> Option<CacheEntry> {
        self.lock().cache.get(path).cloned()
    }

    /// Every cached path, sorted.
    pub fn cached_paths(&self) -> Vec<FolderPath> {
        self.lock().cache.paths()
    }

    // =========================================================================
    // Album sync
    // =========================================================================

    /// Resync one album on the service, then reload the current folder in place.
    ///
    /// A failed sync returns the error and leaves navigation alone. A failed
    /// reload is not an error: navigation falls back to the root and the
    /// outcome reports `context_preserved: false`.
    pub async fn sync_album(&self, album_id: &str) -> Result<SyncOutcome, EngineError> {
        self.publish(AppEvent::SyncStarted {
            album_id: album_id.to_string(),
        });

        let result = match self.shared.api.sync_album(album_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(album_id, error = %e, "album sync failed");
                self.publish(AppEvent::SyncFailed {
                    album_id: album_id.to_string(),
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        tracing::info!(
            album_id,
            synced = result.synced_count,
            album = %result.album_name,
            "album synced"
        );
        self.publish(AppEvent::SyncSucceeded {
            album_id: album_id.to_string(),
            synced_count: result.synced_count,
            album_name: result.album_name.clone(),
        });

        let snapshot = self.navigation();
        let path = snapshot.current().clone();

        match self.reload_in_place(snapshot).await {
            Ok(entry) => {
                let album = entry.find(album_id).cloned();
                if album.is_none() {
                    tracing::debug!(album_id, %path, "synced album not in reloaded folder");
                }
                self.publish(AppEvent::ContextRefreshed {
                    path,
                    album: album.clone(),
                });
                Ok(SyncOutcome {
                    result,
                    album,
                    context_preserved: true,
                })
            }
            Err(e) => {
                tracing::warn!(%path, error = %e, "context refresh failed, reloading from root");
                self.publish(AppEvent::ContextRefreshFailed {
                    path,
                    message: e.to_string(),
                });
                {
                    let mut state = self.lock();
                    state.nav.reset();
                    state.cache.clear();
                }
                if let Err(e) = self.load_path(FolderPath::root()).await {
                    tracing::warn!(error = %e, "root reload after context loss failed");
                }
                Ok(SyncOutcome {
                    result,
                    album: None,
                    context_preserved: false,
                })
            }
        }
    }

    async fn reload_in_place(&self, snapshot: NavigationSnapshot) -> Result<CacheEntry, EngineError> {
        let path = snapshot.current().clone();
        self.invalidate(&path);
        let outcome = self.load_path(path.clone()).await?;

        let mut state = self.lock();
        if state.nav.is_current(&path) {
            let breadcrumbs = outcome.entry.breadcrumbs.clone();
            state.nav.restore(snapshot);
            state.nav.set_breadcrumbs(breadcrumbs);
        }
        Ok(outcome.entry)
    }
}

impl<A: PhotoApi> std::fmt::Debug for SyncEngine<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SyncEngine")
            .field("current", state.nav.current())
            .field("cached", &state.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockPhotoApi;
    use crate::bus::drain;
    use albumsync_types::FolderListing;
    use std::time::Duration;

    fn root_listing() -> FolderListing {
        FolderListing::new(
            vec![
                TreeNode::folder("f2024", "2024", "", 1),
                TreeNode::folder("f2023", "2023", "", 0),
            ],
            vec![Breadcrumb::new("root", "Home")],
        )
    }

    fn fixture() -> (MockPhotoApi, SyncEngine<MockPhotoApi>, EventBus) {
        let api = MockPhotoApi::new();
        api.set_listing("", root_listing());
        api.set_listing(
            "2024",
            FolderListing::new(
                vec![TreeNode::album("a1", "Summer", "2024", 12)],
                vec![Breadcrumb::new("root", "Home"), Breadcrumb::new("f2024", "2024")],
            ),
        );
        let bus = EventBus::new();
        let engine = SyncEngine::new(api.clone(), bus.clone());
        (api, engine, bus)
    }

    fn topics(events: &[AppEvent]) -> Vec<&'static str> {
        events.iter().map(AppEvent::topic).collect()
    }

    fn updated_count(events: &[AppEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, AppEvent::FolderUpdated { .. }))
            .count()
    }

    // ===========================================
    // Cache-first Loading
    // ===========================================

    #[tokio::test]
    async fn miss_fetches_and_reports_fresh() {
        let (api, engine, bus) = fixture();
        let mut rx = bus.subscribe();

        let outcome = engine.load_path(FolderPath::root()).await.unwrap();

        assert_eq!(outcome.source, LoadSource::Fresh);
        assert!(outcome.revalidation.is_none());
        assert_eq!(api.folder_calls(), 1);
        assert_eq!(
            topics(&drain(&mut rx)),
            vec!["folder:loading:start", "folder:loaded", "folder:loading:hide"]
        );
        assert_eq!(engine.breadcrumbs()[0].name, "Home");
    }

    #[tokio::test]
    async fn hit_reports_cache_before_any_fetch() {
        let (api, engine, bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();
        let mut rx = bus.subscribe();

        let outcome = engine.load_path(FolderPath::root()).await.unwrap();

        // The background task has not run yet: still only the first fetch
        assert_eq!(api.folder_calls(), 1);
        assert_eq!(outcome.source, LoadSource::Cache);
        let events = drain(&mut rx);
        assert!(matches!(
            events.first(),
            Some(AppEvent::FolderLoaded { source: LoadSource::Cache, .. })
        ));

        let revalidation = outcome.revalidation.unwrap();
        assert_eq!(revalidation.wait().await, RevalidationOutcome::Unchanged);
        assert_eq!(api.folder_calls(), 2);
    }

    #[tokio::test]
    async fn unchanged_revalidation_emits_no_update() {
        let (_api, engine, bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();
        let mut rx = bus.subscribe();

        let outcome = engine.load_path(FolderPath::root()).await.unwrap();
        outcome.revalidation.unwrap().wait().await;

        assert_eq!(updated_count(&drain(&mut rx)), 0);
    }

    #[tokio::test]
    async fn changed_revalidation_emits_exactly_one_update() {
        let (api, engine, bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();

        let mut changed = root_listing();
        changed.nodes[0].child_count = Some(4);
        api.set_listing("", changed.clone());
        let mut rx = bus.subscribe();

        let outcome = engine.load_path(FolderPath::root()).await.unwrap();
        assert_eq!(outcome.entry.nodes, root_listing().nodes);
        assert_eq!(
            outcome.revalidation.unwrap().wait().await,
            RevalidationOutcome::Updated
        );

        let events = drain(&mut rx);
        assert_eq!(updated_count(&events), 1);
        let update = events
            .iter()
            .find(|e| matches!(e, AppEvent::FolderUpdated { .. }))
            .unwrap();
        assert!(matches!(update, AppEvent::FolderUpdated { nodes, .. } if *nodes == changed.nodes));
        assert_eq!(engine.cached(&FolderPath::root()).unwrap().nodes, changed.nodes);
    }

    #[tokio::test]
    async fn reordering_counts_as_change() {
        let (api, engine, _bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();

        let mut reordered = root_listing();
        reordered.nodes.reverse();
        api.set_listing("", reordered);

        let outcome = engine.load_path(FolderPath::root()).await.unwrap();
        assert_eq!(
            outcome.revalidation.unwrap().wait().await,
            RevalidationOutcome::Updated
        );
    }

    #[tokio::test(start_paused = true)]
    async fn revalidation_for_abandoned_path_is_silent() {
        let (api, engine, bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();

        let mut changed = root_listing();
        changed.nodes.pop();
        api.set_listing("", changed.clone());
        api.set_delay("", Duration::from_millis(200));
        let mut rx = bus.subscribe();

        let outcome = engine.load_path(FolderPath::root()).await.unwrap();
        // User moves on while the root refresh is in flight
        engine.descend("2024").await.unwrap();

        assert_eq!(
            outcome.revalidation.unwrap().wait().await,
            RevalidationOutcome::UpdatedSilently
        );
        assert_eq!(updated_count(&drain(&mut rx)), 0);
        assert_eq!(engine.current_path(), FolderPath::new("2024"));
        assert_eq!(engine.cached(&FolderPath::root()).unwrap().nodes, changed.nodes);
        // Breadcrumbs still belong to the folder on screen
        assert_eq!(engine.breadcrumbs().len(), 2);
    }

    #[tokio::test]
    async fn background_failure_is_swallowed() {
        let (api, engine, bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();
        api.fail_next_folder("offline");
        let mut rx = bus.subscribe();

        let outcome = engine.load_path(FolderPath::root()).await.unwrap();
        assert_eq!(
            outcome.revalidation.unwrap().wait().await,
            RevalidationOutcome::Failed
        );

        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, AppEvent::FolderError { .. })));
        assert!(engine.cached(&FolderPath::root()).is_some());
    }

    #[tokio::test]
    async fn explicit_failure_propagates_and_reports() {
        let (_api, engine, bus) = fixture();
        let mut rx = bus.subscribe();

        let err = engine.load_path("missing").await.unwrap_err();

        assert!(matches!(err, EngineError::Api(_)));
        assert_eq!(
            topics(&drain(&mut rx)),
            vec!["folder:loading:start", "folder:error", "folder:loading:hide"]
        );
        assert!(engine.cached(&FolderPath::new("missing")).is_none());
    }

    #[tokio::test]
    async fn failed_descend_stays_on_previous_folder() {
        let (_api, engine, _bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();

        engine.descend("missing").await.unwrap_err();

        assert!(engine.current_path().is_root());
        assert!(engine.history().is_empty());
        assert_eq!(engine.breadcrumbs()[0].name, "Home");
        assert_eq!(engine.breadcrumbs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_listing_for_abandoned_folder_is_cached_not_shown() {
        let (api, engine, bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();
        api.set_delay("2024", Duration::from_millis(500));
        let mut rx = bus.subscribe();

        let slow = engine.clone();
        let pending = tokio::spawn(async move { slow.descend("2024").await });
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        engine.jump_to_root().await.unwrap();
        let outcome = pending.await.unwrap().unwrap();

        assert_eq!(outcome.source, LoadSource::Fresh);
        assert!(engine.current_path().is_root());
        assert!(engine.cached(&FolderPath::new("2024")).is_some());
        assert_eq!(engine.breadcrumbs().len(), 1);

        let events = drain(&mut rx);
        let loaded: Vec<&FolderPath> = events
            .iter()
            .filter_map(|e| match e {
                AppEvent::FolderLoaded { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(loaded, vec![&FolderPath::root()]);
        assert!(events.iter().any(
            |e| matches!(e, AppEvent::LoadingFinished { path } if *path == FolderPath::new("2024"))
        ));
    }

    #[tokio::test]
    async fn refresh_bypasses_cache() {
        let (api, engine, _bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();

        let outcome = engine.refresh().await.unwrap();

        assert_eq!(outcome.source, LoadSource::Fresh);
        assert_eq!(api.folder_calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let (_api, engine, _bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();
        engine.load_path("2024").await.unwrap();
        assert_eq!(engine.cached_paths().len(), 2);

        assert!(engine.invalidate(&FolderPath::new("2024")));
        assert_eq!(engine.cached_paths(), vec![FolderPath::root()]);

        engine.clear_cache();
        assert!(engine.cached_paths().is_empty());
    }

    // ===========================================
    // Navigation
    // ===========================================

    #[tokio::test]
    async fn descend_then_ascend_returns_to_root() {
        let (_api, engine, _bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();

        engine.descend("2024").await.unwrap();
        assert_eq!(engine.current_path(), FolderPath::new("2024"));
        assert_eq!(engine.history(), vec![FolderPath::root()]);

        let outcome = engine.ascend().await.unwrap();
        assert!(engine.current_path().is_root());
        assert!(engine.history().is_empty());
        assert_eq!(outcome.source, LoadSource::Cache);
    }

    #[tokio::test]
    async fn ascend_from_root_stays_at_root() {
        let (_api, engine, _bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();

        engine.ascend().await.unwrap();
        assert!(engine.current_path().is_root());
    }

    #[tokio::test]
    async fn jump_to_root_clears_history() {
        let (_api, engine, _bus) = fixture();
        engine.load_path(FolderPath::root()).await.unwrap();
        engine.descend("2024").await.unwrap();

        engine.jump_to_root().await.unwrap();

        assert!(engine.current_path().is_root());
        assert!(engine.history().is_empty());
    }

    // ===========================================
    // Album Sync
    // ===========================================

    fn italy(photo_count: u64) -> FolderListing {
        FolderListing::new(
            vec![
                TreeNode::album("A123", "Rome", "/Trips/Italy", photo_count),
                TreeNode::album("A124", "Florence", "/Trips/Italy", 8),
            ],
            vec![
                Breadcrumb::new("root", "Home"),
                Breadcrumb::new("trips", "Trips"),
                Breadcrumb::new("italy", "Italy"),
            ],
        )
    }

    async fn at_italy() -> (MockPhotoApi, SyncEngine<MockPhotoApi>, EventBus) {
        let (api, engine, bus) = fixture();
        api.set_listing(
            "/Trips",
            FolderListing::new(vec![TreeNode::folder("italy", "Italy", "/Trips", 2)], vec![]),
        );
        api.set_listing("/Trips/Italy", italy(10));
        engine.load_path(FolderPath::root()).await.unwrap();
        engine.descend("/Trips").await.unwrap();
        engine.descend("/Trips/Italy").await.unwrap();
        (api, engine, bus)
    }

    #[tokio::test]
    async fn sync_keeps_position_and_finds_updated_album() {
        let (api, engine, bus) = at_italy().await;
        api.set_sync_result(
            "A123",
            AlbumSyncResult {
                synced_count: 15,
                album_name: "Rome".into(),
            },
        );
        api.set_listing("/Trips/Italy", italy(25));
        let mut rx = bus.subscribe();

        let outcome = engine.sync_album("A123").await.unwrap();

        assert!(outcome.context_preserved);
        assert_eq!(outcome.result.synced_count, 15);
        assert_eq!(outcome.album.unwrap().photo_count, Some(25));
        assert_eq!(engine.current_path(), FolderPath::new("/Trips/Italy"));
        assert_eq!(
            engine.history(),
            vec![FolderPath::root(), FolderPath::new("/Trips")]
        );
        assert_eq!(engine.breadcrumbs().len(), 3);

        let topics = topics(&drain(&mut rx));
        assert_eq!(topics.first(), Some(&"sync:start"));
        assert!(topics.contains(&"sync:success"));
        assert_eq!(topics.last(), Some(&"context:refreshed"));
    }

    #[tokio::test]
    async fn sync_of_album_elsewhere_reports_none() {
        let (api, engine, _bus) = at_italy().await;
        api.set_sync_result(
            "Z9",
            AlbumSyncResult {
                synced_count: 1,
                album_name: "Other".into(),
            },
        );

        let outcome = engine.sync_album("Z9").await.unwrap();

        assert!(outcome.context_preserved);
        assert!(outcome.album.is_none());
    }

    #[tokio::test]
    async fn failed_reload_falls_back_to_root() {
        let (api, engine, bus) = at_italy().await;
        api.set_sync_result(
            "A123",
            AlbumSyncResult {
                synced_count: 3,
                album_name: "Rome".into(),
            },
        );
        api.fail_path("/Trips/Italy");
        let mut rx = bus.subscribe();

        let outcome = engine.sync_album("A123").await.unwrap();

        assert!(!outcome.context_preserved);
        assert!(outcome.album.is_none());
        assert!(engine.current_path().is_root());
        assert!(engine.history().is_empty());
        assert_eq!(engine.cached_paths(), vec![FolderPath::root()]);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::ContextRefreshFailed { path, .. } if path.as_str() == "/Trips/Italy")));
    }

    #[tokio::test]
    async fn failed_sync_leaves_navigation_alone() {
        let (api, engine, bus) = at_italy().await;
        api.fail_next_sync("service down");
        let before = engine.navigation();
        let mut rx = bus.subscribe();

        let err = engine.sync_album("A123").await.unwrap_err();

        assert!(matches!(err, EngineError::Api(_)));
        assert_eq!(engine.navigation(), before);
        assert_eq!(topics(&drain(&mut rx)), vec!["sync:start", "sync:error"]);
        assert_eq!(api.sync_calls(), vec!["A123".to_string()]);
    }
}
