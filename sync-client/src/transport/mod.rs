//! Transport abstraction for the realtime channel.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying socket (WebSocket, mock for testing).
//!
//! # Design
//!
//! A transport only knows how to open a duplex text connection:
//! - `connect()` opens a socket and returns its two halves
//! - [`FrameSink`] writes text frames and closes the socket
//! - [`FrameStream`] yields inbound text frames until the socket closes
//!
//! Splitting the halves lets the channel manager run a reader task while
//! sends go through the sink concurrently. Reconnect policy, handler fan-out
//! and session bookkeeping live in [`crate::channel`], not here.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! let mut conn = transport.connect("ws://host/ws/client_1").await?;
//! conn.sink.send(r#"{"content":"hi"}"#.into()).await?;
//! let frame = conn.stream.recv().await?;
//! ```

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Write half of an open connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of an open connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Receive the next text frame.
    ///
    /// Returns `Ok(None)` once the remote side closed the connection.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

/// An open connection, split into its halves.
pub struct Connection {
    /// Outbound half.
    pub sink: Box<dyn FrameSink>,
    /// Inbound half.
    pub stream: Box<dyn FrameStream>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Transport trait for opening realtime connections.
///
/// Implementations handle the underlying socket mechanism
/// (WebSocket, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to the given address.
    async fn connect(&self, address: &str) -> Result<Connection, TransportError>;
}
