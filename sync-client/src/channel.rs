//! Realtime channel manager.
//!
//! Drives [`ChannelMachine`] with real I/O: opens sockets through a
//! [`Transport`], arms the reconnect timer, reads inbound frames and fans
//! them out to registered handlers.
//!
//! # Design
//!
//! All mutable state sits in one `std::sync::Mutex` that is never held
//! across an await. Socket opens, reads, closes and timers run as spawned
//! tasks that report back into the state machine. Each opened socket
//! and each armed timer is tagged with an epoch; anything reporting with an
//! old epoch belongs to a connection that was superseded and is ignored.
//! Background tasks hold a `Weak` reference so dropping every manager
//! handle ends them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use albumsync_core::{
    BackoffPolicy, ChannelAction, ChannelEvent, ChannelMachine, ChannelNotice, ChannelState,
    CloseReason,
};
use albumsync_types::{ClientId, OutboundMessage, SessionId, TypesError};

use crate::bus::{AppEvent, EventBus};
use crate::transport::{FrameSink, FrameStream, Transport, TransportError};

/// Channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A send was attempted while the channel is not open.
    #[error("channel is not connected")]
    NotConnected,

    /// The socket could not be opened.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// A disconnect or a connect for another client overtook this connect.
    #[error("connect superseded")]
    Superseded,

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The outbound message could not be encoded.
    #[error("failed to encode message: {0}")]
    Serialization(#[from] TypesError),
}

/// Error returned by a message handler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Create a handler error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Identifies a registered handler for [`ChannelManager::remove_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&Value) -> Result<(), HandlerError> + Send + Sync>;

/// Where and how persistently to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Base realtime endpoint; the client id is appended as a path segment.
    pub url: String,
    /// Reconnect schedule.
    pub backoff: BackoffPolicy,
}

impl ChannelConfig {
    /// Config for `url` with the default backoff.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Replace the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new("ws://localhost:8000/ws")
    }
}

/// Identity a connection is opened with; reused for every reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeSession {
    /// This client.
    pub client_id: ClientId,
    /// Conversation to resume, if any.
    pub session_id: Option<SessionId>,
}

impl RealtimeSession {
    /// Socket address for this session under `base_url`.
    pub fn address(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match &self.session_id {
            Some(session) => format!("{base}/{}?session_id={session}", self.client_id),
            None => format!("{base}/{}", self.client_id),
        }
    }
}

type SharedSink = Arc<tokio::sync::Mutex<Box<dyn FrameSink>>>;

struct Inner {
    session: Option<RealtimeSession>,
    machine: ChannelMachine,
    epoch: u64,
    sink: Option<SharedSink>,
    reader: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever a connection is dropped for a different client.
    switches: u64,
}

struct Shared<T> {
    transport: T,
    config: ChannelConfig,
    bus: EventBus,
    inner: Mutex<Inner>,
    handlers: Mutex<Vec<(HandlerId, Handler)>>,
    next_handler: AtomicU64,
    state_tx: watch::Sender<ChannelState>,
}

/// Auto-reconnecting duplex message channel.
///
/// Cloning is cheap and every clone drives the same connection.
pub struct ChannelManager<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for ChannelManager<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> ChannelManager<T> {
    /// Create an idle manager.
    pub fn new(transport: T, config: ChannelConfig, bus: EventBus) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Idle);
        let machine = ChannelMachine::new(config.backoff);
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                bus,
                inner: Mutex::new(Inner {
                    session: None,
                    machine,
                    epoch: 0,
                    sink: None,
                    reader: None,
                    timer: None,
                    switches: 0,
                }),
                handlers: Mutex::new(Vec::new()),
                next_handler: AtomicU64::new(1),
                state_tx,
            }),
        }
    }

    /// Open the channel for `client_id`, resuming `session_id` if given.
    ///
    /// Idempotent: while a connection for the same client is connecting this
    /// waits for it, and while it is open this returns at once. A connection
    /// for another client is closed intentionally first. Without a
    /// `session_id` the previously retained one is kept for the same client.
    /// A wait that is overtaken by a connect for another client fails with
    /// [`ChannelError::Superseded`].
    pub async fn connect(
        &self,
        client_id: ClientId,
        session_id: Option<SessionId>,
    ) -> Result<(), ChannelError> {
        let mut state_rx = self.shared.state_tx.subscribe();
        let switches = {
            let mut inner = self.shared.lock();
            let retained = match inner.session.take() {
                Some(old) if old.client_id == client_id => old.session_id,
                Some(old) => {
                    self.shared.close_for_switch(&mut inner, old);
                    None
                }
                None => None,
            };
            inner.session = Some(RealtimeSession {
                client_id,
                session_id: session_id.or(retained),
            });

            let state = inner.machine.state().clone();
            match state {
                ChannelState::Open => return Ok(()),
                ChannelState::Connecting => {
                    tracing::debug!("connect already in flight, waiting");
                }
                _ => self
                    .shared
                    .dispatch(&mut inner, ChannelEvent::ConnectRequested),
            }
            inner.switches
        };

        loop {
            if self.shared.lock().switches != switches {
                return Err(ChannelError::Superseded);
            }
            let state = state_rx.borrow_and_update().clone();
            match state {
                ChannelState::Open => return Ok(()),
                ChannelState::Connecting => {}
                ChannelState::Closed(CloseReason::Lost(reason)) => {
                    return Err(ChannelError::ConnectFailed(reason))
                }
                ChannelState::Closed(CloseReason::Exhausted { attempts }) => {
                    return Err(ChannelError::ConnectFailed(format!(
                        "gave up after {attempts} reconnect attempts"
                    )))
                }
                ChannelState::Idle | ChannelState::Closed(CloseReason::Intentional) => {
                    return Err(ChannelError::Superseded)
                }
            }
            if state_rx.changed().await.is_err() {
                return Err(ChannelError::Superseded);
            }
        }
    }

    /// Send `content` as an outbound message.
    ///
    /// Without a `session_id` the retained conversation id is used. When the
    /// channel is not open this logs and fails with
    /// [`ChannelError::NotConnected`]; the message is not queued. A send from
    /// rest may open the retained session early, but it never resets the
    /// reconnect counter or preempts an armed timer. A channel that was
    /// disconnected or gave up stays closed.
    pub async fn send(&self, content: &str, session_id: Option<SessionId>) -> Result<(), ChannelError> {
        let (sink, message) = {
            let mut inner = self.shared.lock();
            let open_sink = if inner.machine.state().is_open() {
                inner.sink.clone()
            } else {
                None
            };
            let sink = match open_sink {
                Some(sink) => sink,
                None => {
                    tracing::warn!(state = ?inner.machine.state(), "send while channel not open");
                    if inner.session.is_some() {
                        self.shared
                            .dispatch(&mut inner, ChannelEvent::SendWhileClosed);
                    }
                    return Err(ChannelError::NotConnected);
                }
            };
            let session_id = session_id
                .or_else(|| inner.session.as_ref().and_then(|s| s.session_id.clone()));
            (sink, OutboundMessage::new(content, session_id))
        };

        let text = message.to_json()?;
        let mut sink = sink.lock().await;
        sink.send(text).await.map_err(|e| {
            tracing::warn!(error = %e, "send failed");
            ChannelError::from(e)
        })
    }

    /// Register a handler that receives every inbound message.
    pub fn on_message<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = HandlerId(self.shared.next_handler.fetch_add(1, Ordering::Relaxed));
        self.shared.handlers().push((id, Arc::new(handler)));
        id
    }

    /// Unregister a handler. Returns whether it was registered.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.shared.handlers();
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        handlers.len() != before
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.shared.handlers().len()
    }

    /// Close the channel on purpose.
    ///
    /// No reconnect follows, a pending reconnect is cancelled, every handler
    /// is dropped and the attempt counter resets.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        self.shared
            .dispatch(&mut inner, ChannelEvent::DisconnectRequested);
        // Invalidate anything still in flight, even from a state with no socket
        inner.epoch += 1;
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.shared.state_tx.borrow().clone()
    }

    /// Whether messages can be sent.
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Consecutive reconnects since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.shared.lock().machine.attempts()
    }

    /// Whether a reconnect timer is armed.
    pub fn reconnect_pending(&self) -> bool {
        self.shared.lock().timer.is_some()
    }

    /// Identity used for the current and future connections.
    pub fn session(&self) -> Option<RealtimeSession> {
        self.shared.lock().session.clone()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    /// Channel settings.
    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }
}

impl<T: Transport> std::fmt::Debug for ChannelManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("state", &self.state())
            .field("url", &self.shared.config.url)
            .finish()
    }
}

impl<T: Transport> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handlers(&self) -> MutexGuard<'_, Vec<(HandlerId, Handler)>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Feed an event to the machine and carry out its actions.
    fn dispatch(self: &Arc<Self>, inner: &mut Inner, event: ChannelEvent) {
        tracing::trace!(?event, state = ?inner.machine.state(), "channel event");
        let (machine, actions) = inner.machine.clone().on_event(event);
        inner.machine = machine;
        for action in actions {
            self.execute(inner, action);
        }
        self.state_tx.send_replace(inner.machine.state().clone());
    }

    fn execute(self: &Arc<Self>, inner: &mut Inner, action: ChannelAction) {
        match action {
            ChannelAction::OpenSocket => {
                inner.epoch += 1;
                match &inner.session {
                    Some(session) => {
                        let address = session.address(&self.config.url);
                        tracing::info!(%address, "opening realtime channel");
                        self.spawn_open(inner.epoch, address);
                    }
                    None => tracing::warn!("open requested without a session"),
                }
            }
            ChannelAction::CloseSocket => {
                inner.epoch += 1;
                if let Some(reader) = inner.reader.take() {
                    reader.abort();
                }
                if let Some(sink) = inner.sink.take() {
                    close_sink(sink);
                }
            }
            ChannelAction::ScheduleReconnect { attempt, delay } => {
                if let Some(stale) = inner.timer.take() {
                    stale.abort();
                }
                tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                inner.timer = Some(self.spawn_timer(inner.epoch, delay));
                self.bus.publish(AppEvent::ReconnectScheduled {
                    attempt,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                });
            }
            ChannelAction::CancelReconnect => {
                if let Some(timer) = inner.timer.take() {
                    tracing::debug!("reconnect cancelled");
                    timer.abort();
                }
            }
            ChannelAction::ClearHandlers => self.handlers().clear(),
            ChannelAction::Emit(notice) => self.emit(inner, notice),
        }
    }

    fn emit(&self, inner: &Inner, notice: ChannelNotice) {
        let Some(client_id) = inner.session.as_ref().map(|s| s.client_id.clone()) else {
            return;
        };
        let event = match notice {
            ChannelNotice::Opened => {
                tracing::info!(%client_id, "realtime channel open");
                AppEvent::ChannelOpened { client_id }
            }
            ChannelNotice::Lost { reason } => {
                tracing::warn!(%client_id, %reason, "realtime channel lost");
                AppEvent::ChannelClosed {
                    client_id,
                    reason: CloseReason::Lost(reason),
                }
            }
            ChannelNotice::Disconnected => {
                tracing::info!(%client_id, "realtime channel disconnected");
                AppEvent::ChannelClosed {
                    client_id,
                    reason: CloseReason::Intentional,
                }
            }
            ChannelNotice::Exhausted { attempts } => {
                tracing::error!(%client_id, attempts, "giving up on realtime channel");
                AppEvent::ReconnectExhausted { attempts }
            }
        };
        self.bus.publish(event);
    }

    /// Close the current connection as intentional before switching clients.
    ///
    /// Handlers survive the switch.
    fn close_for_switch(&self, inner: &mut Inner, old: RealtimeSession) {
        let was_active = !matches!(inner.machine.state(), ChannelState::Idle | ChannelState::Closed(_))
            || inner.timer.is_some();
        inner.epoch += 1;
        inner.switches += 1;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        if let Some(sink) = inner.sink.take() {
            close_sink(sink);
        }
        inner.machine = ChannelMachine::new(self.config.backoff);
        if was_active {
            tracing::info!(old = %old.client_id, "switching client, closing previous channel");
            self.bus.publish(AppEvent::ChannelClosed {
                client_id: old.client_id,
                reason: CloseReason::Intentional,
            });
        }
    }

    fn spawn_open(self: &Arc<Self>, epoch: u64, address: String) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let result = shared.transport.connect(&address).await;

            let mut inner = shared.lock();
            if inner.epoch != epoch {
                tracing::debug!(%address, "discarding superseded connection attempt");
                if let Ok(conn) = result {
                    close_sink(Arc::new(tokio::sync::Mutex::new(conn.sink)));
                }
                return;
            }
            match result {
                Ok(conn) => {
                    inner.sink = Some(Arc::new(tokio::sync::Mutex::new(conn.sink)));
                    inner.reader = Some(spawn_reader(Arc::downgrade(&shared), epoch, conn.stream));
                    shared.dispatch(&mut inner, ChannelEvent::OpenSucceeded);
                }
                Err(e) => {
                    shared.dispatch(&mut inner, ChannelEvent::OpenFailed {
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    fn spawn_timer(self: &Arc<Self>, epoch: u64, delay: std::time::Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut inner = shared.lock();
            if inner.epoch != epoch {
                return;
            }
            inner.timer = None;
            shared.dispatch(&mut inner, ChannelEvent::ReconnectTimerFired);
        })
    }

    fn connection_lost(self: &Arc<Self>, epoch: u64, reason: String) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        inner.sink = None;
        inner.reader = None;
        self.dispatch(&mut inner, ChannelEvent::ConnectionLost { reason });
    }

    /// Decode one frame and hand it to every handler in registration order.
    fn deliver(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, len = text.len(), "dropping malformed inbound frame");
                return;
            }
        };

        // Snapshot so handlers may register or remove handlers themselves
        let handlers: Vec<(HandlerId, Handler)> = self
            .handlers()
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();

        for (id, handler) in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&value))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(handler = id.0, error = %e, "message handler failed"),
                Err(_) => tracing::warn!(handler = id.0, "message handler panicked"),
            }
        }
    }
}

fn spawn_reader<T: Transport>(
    weak: Weak<Shared<T>>,
    epoch: u64,
    mut stream: Box<dyn FrameStream>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let frame = stream.recv().await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match frame {
                Ok(Some(text)) => {
                    if shared.lock().epoch != epoch {
                        return;
                    }
                    shared.deliver(&text);
                }
                Ok(None) => {
                    shared.connection_lost(epoch, "closed by remote".to_string());
                    return;
                }
                Err(e) => {
                    shared.connection_lost(epoch, e.to_string());
                    return;
                }
            }
        }
    })
}

fn close_sink(sink: SharedSink) {
    tokio::spawn(async move {
        let mut sink = sink.lock().await;
        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "error closing socket");
        }
    });
}
