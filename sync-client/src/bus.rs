//! In-process event bus.
//!
//! Components never hold references to each other's UI consumers; they
//! publish [`AppEvent`]s here and subscribers (UI, logging, metrics) react.
//! Topics are a typed contract: every variant maps to a fixed topic string
//! via [`AppEvent::topic`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use albumsync_core::CloseReason;
use albumsync_types::{Breadcrumb, ClientId, FolderPath, TreeNode};

use crate::http::ErrorKind;

const BUS_CAPACITY: usize = 1024;

/// Where a loaded listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    /// Served from the local cache without a network call.
    Cache,
    /// Fetched from the service.
    Fresh,
}

/// Every event that can travel over the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// An HTTP request is about to be sent.
    ApiRequestStarted {
        /// HTTP method.
        method: String,
        /// Full request URL.
        url: String,
    },
    /// An HTTP response arrived (any status).
    ApiRequestFinished {
        /// HTTP method.
        method: String,
        /// Full request URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Time from send to response.
        elapsed_ms: u64,
    },
    /// An HTTP request failed.
    ApiError {
        /// HTTP method.
        method: String,
        /// Full request URL.
        url: String,
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
    },

    /// A folder fetch started with nothing cached to show.
    LoadingStarted {
        /// Folder being fetched.
        path: FolderPath,
    },
    /// The loading indicator for a folder can be hidden.
    LoadingFinished {
        /// Folder that was fetched.
        path: FolderPath,
    },
    /// A folder listing is ready to display.
    FolderLoaded {
        /// Folder that loaded.
        path: FolderPath,
        /// Its nodes.
        nodes: Vec<TreeNode>,
        /// Its breadcrumb trail.
        breadcrumbs: Vec<Breadcrumb>,
        /// Cache or network.
        source: LoadSource,
    },
    /// Background revalidation found a changed listing for the current folder.
    FolderUpdated {
        /// Folder that changed.
        path: FolderPath,
        /// The new nodes.
        nodes: Vec<TreeNode>,
        /// The new breadcrumb trail.
        breadcrumbs: Vec<Breadcrumb>,
    },
    /// An explicit folder load failed.
    FolderError {
        /// Folder that failed.
        path: FolderPath,
        /// Human-readable message.
        message: String,
    },

    /// An album resync was requested.
    SyncStarted {
        /// Album being synced.
        album_id: String,
    },
    /// The service resynced an album.
    SyncSucceeded {
        /// Album that was synced.
        album_id: String,
        /// Photos resynced.
        synced_count: u64,
        /// Album display name.
        album_name: String,
    },
    /// An album resync failed.
    SyncFailed {
        /// Album that failed.
        album_id: String,
        /// Human-readable message.
        message: String,
    },
    /// The current folder was reloaded after a sync without losing position.
    ContextRefreshed {
        /// Folder that was reloaded.
        path: FolderPath,
        /// The synced album as found in the fresh listing.
        album: Option<TreeNode>,
    },
    /// Reloading the current folder failed; navigation fell back to the root.
    ContextRefreshFailed {
        /// Folder that could not be reloaded.
        path: FolderPath,
        /// Human-readable message.
        message: String,
    },

    /// The realtime channel opened.
    ChannelOpened {
        /// Client the channel belongs to.
        client_id: ClientId,
    },
    /// The realtime channel closed.
    ChannelClosed {
        /// Client the channel belongs to.
        client_id: ClientId,
        /// Why it closed.
        reason: CloseReason,
    },
    /// A reconnect was scheduled.
    ReconnectScheduled {
        /// Which reconnect (1-based).
        attempt: u32,
        /// Delay before the attempt.
        delay_ms: u64,
    },
    /// Reconnect attempts ran out; only a manual connect retries.
    ReconnectExhausted {
        /// Number of reconnects attempted.
        attempts: u32,
    },
}

impl AppEvent {
    /// Topic string of this event.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::ApiRequestStarted { .. } => "api:request:start",
            Self::ApiRequestFinished { .. } => "api:request:end",
            Self::ApiError { .. } => "api:error",
            Self::LoadingStarted { .. } => "folder:loading:start",
            Self::LoadingFinished { .. } => "folder:loading:hide",
            Self::FolderLoaded { .. } => "folder:loaded",
            Self::FolderUpdated { .. } => "folder:updated",
            Self::FolderError { .. } => "folder:error",
            Self::SyncStarted { .. } => "sync:start",
            Self::SyncSucceeded { .. } => "sync:success",
            Self::SyncFailed { .. } => "sync:error",
            Self::ContextRefreshed { .. } => "context:refreshed",
            Self::ContextRefreshFailed { .. } => "context:refresh:error",
            Self::ChannelOpened { .. } => "channel:open",
            Self::ChannelClosed { .. } => "channel:closed",
            Self::ReconnectScheduled { .. } => "channel:reconnect:scheduled",
            Self::ReconnectExhausted { .. } => "channel:reconnect:exhausted",
        }
    }
}

/// An event as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct BusEvent {
    /// Unique event id.
    pub id: String,
    /// Publish order, starting at 0.
    pub seq: u64,
    /// RFC 3339 publish time.
    pub created_at: String,
    /// Topic of `event`.
    pub topic: &'static str,
    /// The event itself.
    pub event: AppEvent,
}

/// Publish/subscribe hub. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
    seq: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: AppEvent) -> BusEvent {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let envelope = BusEvent {
            id: Uuid::new_v4().to_string(),
            seq,
            created_at: Utc::now().to_rfc3339(),
            topic: event.topic(),
            event,
        };
        if self.tx.send(envelope.clone()).is_err() {
            tracing::trace!(topic = envelope.topic, "event published with no subscribers");
        }
        envelope
    }

    /// Get a new receiver for this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .field("published", &self.seq.load(Ordering::Relaxed))
            .finish()
    }
}

/// Drain every event currently queued on a receiver.
///
/// Useful in tests and in UIs that render once per tick.
pub fn drain(rx: &mut broadcast::Receiver<BusEvent>) -> Vec<AppEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(envelope) => events.push(envelope.event),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                tracing::warn!("bus receiver lagged, dropped {n} events");
            }
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_ok() {
        let bus = EventBus::new();
        let envelope = bus.publish(AppEvent::SyncStarted {
            album_id: "A1".into(),
        });
        assert_eq!(envelope.seq, 0);
        assert_eq!(envelope.topic, "sync:start");
    }

    #[test]
    fn subscribers_receive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(AppEvent::LoadingStarted {
            path: FolderPath::root(),
        });
        bus.publish(AppEvent::LoadingFinished {
            path: FolderPath::root(),
        });

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].topic(), "folder:loading:start");
        assert_eq!(events[1].topic(), "folder:loading:hide");
    }

    #[test]
    fn clones_share_sequence() {
        let bus = EventBus::new();
        let other = bus.clone();
        let mut rx = bus.subscribe();

        bus.publish(AppEvent::SyncStarted { album_id: "a".into() });
        let second = other.publish(AppEvent::SyncStarted { album_id: "b".into() });

        assert_eq!(second.seq, 1);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = AppEvent::ReconnectScheduled {
            attempt: 2,
            delay_ms: 2000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reconnect_scheduled");
        assert_eq!(json["delay_ms"], 2000);
    }

    #[test]
    fn every_topic_is_namespaced() {
        let samples = [
            AppEvent::FolderError {
                path: FolderPath::root(),
                message: "x".into(),
            },
            AppEvent::ContextRefreshFailed {
                path: FolderPath::root(),
                message: "x".into(),
            },
            AppEvent::ReconnectExhausted { attempts: 5 },
        ];
        for event in samples {
            assert!(event.topic().contains(':'), "{}", event.topic());
        }
    }
}
