//! Photo service API seam.
//!
//! The sync engine depends on [`PhotoApi`] rather than on HTTP directly, so
//! it can run against [`HttpPhotoApi`] in production and [`MockPhotoApi`]
//! in tests and demos.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use albumsync_types::{AlbumSyncResult, FolderListing, FolderPath, TypesError};

use crate::http::{ErrorKind, HttpClient, HttpError};

/// Errors from the photo service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The response arrived but its body did not decode.
    #[error("response carried no usable payload")]
    EmptyPayload,

    /// The payload decoded but is not a valid value.
    #[error("invalid response: {0}")]
    Invalid(#[from] TypesError),
}

impl ApiError {
    /// HTTP failure category, when the failure came from the transport.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Http(e) => Some(e.kind()),
            Self::EmptyPayload | Self::Invalid(_) => None,
        }
    }
}

/// Operations the sync engine needs from the photo service.
#[async_trait]
pub trait PhotoApi: Send + Sync + 'static {
    /// List the nodes and breadcrumb trail of one folder.
    async fn folder_contents(&self, path: &FolderPath) -> Result<FolderListing, ApiError>;

    /// Ask the service to resynchronize one album from the photo host.
    async fn sync_album(&self, album_id: &str) -> Result<AlbumSyncResult, ApiError>;
}

/// [`PhotoApi`] over the service's REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpPhotoApi {
    http: HttpClient,
}

impl HttpPhotoApi {
    /// Use `http` for every call.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// The underlying client.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

fn check_album_id(album_id: &str) -> Result<(), ApiError> {
    if album_id.is_empty() || album_id.chars().any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace()) {
        return Err(ApiError::Invalid(TypesError::InvalidId {
            value: album_id.to_string(),
            reason: "album id must be a single URL path segment",
        }));
    }
    Ok(())
}

#[async_trait]
impl PhotoApi for HttpPhotoApi {
    async fn folder_contents(&self, path: &FolderPath) -> Result<FolderListing, ApiError> {
        let listing = self
            .http
            .get_json::<FolderListing>("/api/folders", &[("path", path.as_str())])
            .await?
            .into_data()
            .ok_or(ApiError::EmptyPayload)?;
        listing.validate()?;
        Ok(listing)
    }

    async fn sync_album(&self, album_id: &str) -> Result<AlbumSyncResult, ApiError> {
        check_album_id(album_id)?;
        self.http
            .post_json::<AlbumSyncResult, _>(
                &format!("/api/albums/{album_id}/sync"),
                &serde_json::json!({}),
            )
            .await?
            .into_data()
            .ok_or(ApiError::EmptyPayload)
    }
}

#[derive(Debug, Default)]
struct MockPhotoApiInner {
    listings: HashMap<FolderPath, FolderListing>,
    sync_results: HashMap<String, AlbumSyncResult>,
    folder_calls: Vec<FolderPath>,
    sync_calls: Vec<String>,
    fail_next_folder: Option<String>,
    failing_paths: HashSet<FolderPath>,
    fail_next_sync: Option<String>,
    delays: HashMap<FolderPath, Duration>,
}

/// In-memory [`PhotoApi`] for testing.
///
/// Serves scripted listings, records every call and can be told to fail or
/// stall. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MockPhotoApi {
    inner: Arc<Mutex<MockPhotoApiInner>>,
}

impl MockPhotoApi {
    /// Create an API with no listings.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockPhotoApiInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve `listing` for `path` from now on.
    pub fn set_listing(&self, path: impl Into<FolderPath>, listing: FolderListing) {
        self.lock().listings.insert(path.into(), listing);
    }

    /// Answer `sync_album(album_id)` with `result`.
    pub fn set_sync_result(&self, album_id: &str, result: AlbumSyncResult) {
        self.lock().sync_results.insert(album_id.to_string(), result);
    }

    /// Fail the next `folder_contents` call, whatever the path.
    pub fn fail_next_folder(&self, error: &str) {
        self.lock().fail_next_folder = Some(error.to_string());
    }

    /// Fail every `folder_contents` call for `path` until cleared.
    pub fn fail_path(&self, path: impl Into<FolderPath>) {
        self.lock().failing_paths.insert(path.into());
    }

    /// Stop failing calls for `path`.
    pub fn clear_failure(&self, path: &FolderPath) {
        self.lock().failing_paths.remove(path);
    }

    /// Fail the next `sync_album` call.
    pub fn fail_next_sync(&self, error: &str) {
        self.lock().fail_next_sync = Some(error.to_string());
    }

    /// Delay every `folder_contents` call for `path`.
    pub fn set_delay(&self, path: impl Into<FolderPath>, delay: Duration) {
        self.lock().delays.insert(path.into(), delay);
    }

    /// Total `folder_contents` calls.
    pub fn folder_calls(&self) -> usize {
        self.lock().folder_calls.len()
    }

    /// `folder_contents` calls for one path.
    pub fn folder_calls_for(&self, path: &FolderPath) -> usize {
        self.lock().folder_calls.iter().filter(|p| *p == path).count()
    }

    /// Album ids passed to `sync_album`, in order.
    pub fn sync_calls(&self) -> Vec<String> {
        self.lock().sync_calls.clone()
    }
}

fn network(message: String) -> ApiError {
    ApiError::Http(HttpError::Network(message))
}

#[async_trait]
impl PhotoApi for MockPhotoApi {
    async fn folder_contents(&self, path: &FolderPath) -> Result<FolderListing, ApiError> {
        let delay = {
            let mut inner = self.lock();
            inner.folder_calls.push(path.clone());
            inner.delays.get(path).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_folder.take() {
            return Err(network(error));
        }
        if inner.failing_paths.contains(path) {
            return Err(network(format!("{path} unavailable")));
        }
        inner
            .listings
            .get(path)
            .cloned()
            .ok_or_else(|| {
                ApiError::Http(HttpError::Status {
                    status: 404,
                    body: format!("no folder at {path}"),
                })
            })
    }

    async fn sync_album(&self, album_id: &str) -> Result<AlbumSyncResult, ApiError> {
        let mut inner = self.lock();
        inner.sync_calls.push(album_id.to_string());
        if let Some(error) = inner.fail_next_sync.take() {
            return Err(network(error));
        }
        inner
            .sync_results
            .get(album_id)
            .cloned()
            .ok_or_else(|| {
                ApiError::Http(HttpError::Status {
                    status: 404,
                    body: format!("no album {album_id}"),
                })
            })
    }
}
