//! # sync-client
//!
//! Client library for albumsync: a cached, navigable mirror of a remote
//! photo album tree plus an auto-reconnecting realtime message channel.
//!
//! This is the main library that applications use.
//!
//! ## Features
//!
//! - **Stale-while-revalidate**: cached folders show instantly and refresh in the background
//! - **Context-preserving sync**: resyncing an album reloads the current folder in place
//! - **Resilient channel**: idempotent connect, exponential backoff, isolated handlers
//! - **Typed event bus**: every component reports through [`EventBus`]
//! - **Pure state machines**: uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use albumsync_client::{EventBus, HttpClient, HttpPhotoApi, SyncEngine};
//!
//! let bus = EventBus::new();
//! let http = HttpClient::new("http://localhost:8000", DEFAULT_TIMEOUT)?
//!     .with_interceptor(BusInterceptor::new(bus.clone()));
//! let engine = SyncEngine::new(HttpPhotoApi::new(http), bus.clone());
//!
//! let outcome = engine.load_path(FolderPath::root()).await?;
//! engine.descend("2024").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bus;
pub mod channel;
pub mod config;
pub mod engine;
pub mod http;
pub mod transport;

pub use api::{ApiError, HttpPhotoApi, MockPhotoApi, PhotoApi};
pub use bus::{AppEvent, BusEvent, EventBus, LoadSource};
pub use channel::{
    ChannelConfig, ChannelError, ChannelManager, HandlerError, HandlerId, RealtimeSession,
};
pub use config::{ApiConfig, ClientConfig, ConfigError, RealtimeConfig};
pub use engine::{
    EngineError, LoadOutcome, Revalidation, RevalidationOutcome, SyncEngine, SyncOutcome,
};
pub use http::{
    ApiResponse, BusInterceptor, ErrorKind, HttpClient, HttpError, Interceptor, RequestInfo,
    DEFAULT_TIMEOUT,
};
pub use transport::{
    Connection, FrameSink, FrameStream, MockTransport, Transport, TransportError,
    WebSocketTransport,
};
