//! HTTP access layer.
//!
//! Wraps `reqwest` with a per-request deadline and a chain of
//! [`Interceptor`]s that observe every request. Failures are classified so
//! callers can tell a timeout from a network failure from a non-2xx status.
//! A body that does not decode is not an error: the response simply carries
//! no payload.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::bus::{AppEvent, EventBus};

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure category of an [`HttpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request never produced a response.
    Network,
    /// The deadline expired before a response arrived.
    Timeout,
    /// The service answered with a non-2xx status.
    Status,
    /// The request could not be built.
    Build,
}

/// HTTP errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Connection refused, reset, DNS failure and the like.
    #[error("network error: {0}")]
    Network(String),

    /// The request was aborted after its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Invalid URL or body.
    #[error("invalid request: {0}")]
    Build(String),
}

impl HttpError {
    /// Failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Status { .. } => ErrorKind::Status,
            Self::Build(_) => ErrorKind::Build,
        }
    }

    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Network(_) | Self::Build(_) => false,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            HttpError::Build(e.to_string())
        } else {
            HttpError::Network(e.to_string())
        }
    }
}

/// A completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    /// Response status code.
    pub status: u16,
    /// Decoded body; `None` when the body did not decode.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Take the payload.
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// What interceptors get to see about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: String,
    /// Full URL including the query string.
    pub url: String,
}

/// Observer of the request lifecycle.
///
/// Interceptors run in registration order. They observe; they cannot
/// change or cancel a request.
pub trait Interceptor: Send + Sync {
    /// Called before the request is sent.
    fn on_request(&self, _request: &RequestInfo) {}

    /// Called when a response arrives, whatever its status.
    fn on_response(&self, _request: &RequestInfo, _status: u16, _elapsed: Duration) {}

    /// Called when the request fails.
    fn on_error(&self, _request: &RequestInfo, _error: &HttpError) {}
}

/// Interceptor that publishes `api:*` events on the bus.
#[derive(Debug, Clone)]
pub struct BusInterceptor {
    bus: EventBus,
}

impl BusInterceptor {
    /// Publish to `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl Interceptor for BusInterceptor {
    fn on_request(&self, request: &RequestInfo) {
        self.bus.publish(AppEvent::ApiRequestStarted {
            method: request.method.clone(),
            url: request.url.clone(),
        });
    }

    fn on_response(&self, request: &RequestInfo, status: u16, elapsed: Duration) {
        self.bus.publish(AppEvent::ApiRequestFinished {
            method: request.method.clone(),
            url: request.url.clone(),
            status,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }

    fn on_error(&self, request: &RequestInfo, error: &HttpError) {
        self.bus.publish(AppEvent::ApiError {
            method: request.method.clone(),
            url: request.url.clone(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

/// JSON-over-HTTP client bound to one base URL.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl HttpClient {
    /// Create a client for `base_url` with the given per-request deadline.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            interceptors: Vec::new(),
        })
    }

    /// Append an interceptor to the chain.
    pub fn with_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET` a JSON resource.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<T>, HttpError> {
        let url = self.url(path);
        let builder = self.client.get(&url).query(query);
        self.execute("GET", url, builder).await
    }

    /// `POST` a JSON body and decode a JSON response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, HttpError> {
        let url = self.url(path);
        let builder = self.client.post(&url).json(body);
        self.execute("POST", url, builder).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &str,
        url: String,
        builder: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, HttpError> {
        let request = match builder.build() {
            Ok(request) => request,
            Err(e) => {
                // Never sent, so interceptors only hear about the failure
                let info = RequestInfo {
                    method: method.to_string(),
                    url,
                };
                return Err(self.fail(&info, HttpError::from(e)));
            }
        };
        let info = RequestInfo {
            method: request.method().to_string(),
            url: request.url().to_string(),
        };

        for interceptor in &self.interceptors {
            interceptor.on_request(&info);
        }
        tracing::debug!(method = %info.method, url = %info.url, "sending request");

        let started = Instant::now();
        let client = self.client.clone();
        let outcome = tokio::time::timeout(self.timeout, async move {
            let response = client.execute(request).await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        })
        .await;

        let (status, body) = match outcome {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(self.fail(&info, HttpError::from(e))),
            Err(_) => return Err(self.fail(&info, HttpError::Timeout(self.timeout))),
        };

        let elapsed = started.elapsed();
        for interceptor in &self.interceptors {
            interceptor.on_response(&info, status, elapsed);
        }

        if !(200..300).contains(&status) {
            return Err(self.fail(&info, HttpError::Status { status, body }));
        }

        let data = match serde_json::from_str::<T>(&body) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(url = %info.url, error = %e, "response body did not decode");
                None
            }
        };
        Ok(ApiResponse { status, data })
    }

    fn fail(&self, info: &RequestInfo, error: HttpError) -> HttpError {
        tracing::warn!(method = %info.method, url = %info.url, error = %error, "request failed");
        for interceptor in &self.interceptors {
            interceptor.on_error(info, &error);
        }
        error
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
