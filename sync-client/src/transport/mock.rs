//! Mock transport for testing.
//!
//! Allows scripting connect failures, injecting inbound frames and
//! simulating remote closes, while capturing sent frames for verification.

use super::{Connection, FrameSink, FrameStream, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
enum MockFrame {
    Text(String),
    Close,
    Error(String),
}

#[derive(Debug)]
struct MockLink {
    address: String,
    inbound: mpsc::UnboundedSender<MockFrame>,
    open: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connect_attempts: usize,
    addresses: Vec<String>,
    links: Vec<MockLink>,
    sent_frames: Vec<String>,
    close_calls: usize,
    fail_connects: VecDeque<String>,
    refuse_all: Option<String>,
    connect_delay: Option<Duration>,
    echo: bool,
}

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while the channel
/// manager owns another.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `connect()` calls, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    /// Number of connections that actually opened.
    pub fn connections_opened(&self) -> usize {
        self.lock().links.len()
    }

    /// Every address passed to `connect()`, in order.
    pub fn addresses(&self) -> Vec<String> {
        self.lock().addresses.clone()
    }

    /// Address of the most recently opened connection.
    pub fn last_address(&self) -> Option<String> {
        self.lock().links.last().map(|l| l.address.clone())
    }

    /// Whether the most recently opened connection is still open.
    pub fn is_open(&self) -> bool {
        self.lock()
            .links
            .last()
            .is_some_and(|l| l.open.load(Ordering::SeqCst))
    }

    /// Frames written through any sink, in order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.lock().sent_frames.clone()
    }

    /// How many times a sink was closed by the client.
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    /// Cause the next `connect()` to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_connects.push_back(error.to_string());
    }

    /// Make every `connect()` fail until called again with `None`.
    pub fn refuse_connections(&self, error: Option<&str>) {
        self.lock().refuse_all = error.map(str::to_string);
    }

    /// Delay every `connect()` by `delay` before it resolves.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.lock().connect_delay = delay;
    }

    /// Loop every sent frame back to the sender's inbound stream.
    pub fn set_echo(&self, echo: bool) {
        self.lock().echo = echo;
    }

    /// Deliver a text frame on the most recent connection.
    ///
    /// Returns `false` when there is no open connection to deliver on.
    pub fn push_inbound(&self, text: &str) -> bool {
        self.send_frame(MockFrame::Text(text.to_string()))
    }

    /// Make the most recent connection fail with a receive error.
    pub fn fail_inbound(&self, error: &str) -> bool {
        self.send_frame(MockFrame::Error(error.to_string()))
    }

    /// Simulate the remote side closing the most recent connection.
    pub fn drop_connection(&self) -> bool {
        let inner = self.lock();
        let dropped = match inner.links.last() {
            Some(link) if link.open.swap(false, Ordering::SeqCst) => {
                link.inbound.send(MockFrame::Close).is_ok()
            }
            _ => false,
        };
        dropped
    }

    fn send_frame(&self, frame: MockFrame) -> bool {
        let inner = self.lock();
        let delivered = match inner.links.last() {
            Some(link) if link.open.load(Ordering::SeqCst) => link.inbound.send(frame).is_ok(),
            _ => false,
        };
        delivered
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<Connection, TransportError> {
        let delay = {
            let mut inner = self.lock();
            inner.connect_attempts += 1;
            inner.addresses.push(address.to_string());
            inner.connect_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();

        // Check for forced failure
        let failure = match inner.fail_connects.pop_front() {
            Some(error) => Some(error),
            None => inner.refuse_all.clone(),
        };
        if let Some(error) = failure {
            return Err(TransportError::ConnectionFailed(error));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        inner.links.push(MockLink {
            address: address.to_string(),
            inbound: tx.clone(),
            open: Arc::clone(&open),
        });

        Ok(Connection {
            sink: Box::new(MockSink {
                shared: Arc::clone(&self.inner),
                inbound: tx,
                open: Arc::clone(&open),
            }),
            stream: Box::new(MockStream { rx, open }),
        })
    }
}

struct MockSink {
    shared: Arc<Mutex<MockTransportInner>>,
    inbound: mpsc::UnboundedSender<MockFrame>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        let echo = {
            let mut inner = self.shared.lock().unwrap_or_else(|e| e.into_inner());
            inner.sent_frames.push(text.clone());
            inner.echo
        };
        if echo {
            let _ = self.inbound.send(MockFrame::Text(text));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        {
            let mut inner = self.shared.lock().unwrap_or_else(|e| e.into_inner());
            inner.close_calls += 1;
        }
        if self.open.swap(false, Ordering::SeqCst) {
            // Echo the close to the reader like a real socket would
            let _ = self.inbound.send(MockFrame::Close);
        }
        Ok(())
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<MockFrame>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.rx.recv().await {
            Some(MockFrame::Text(text)) => Ok(Some(text)),
            Some(MockFrame::Error(error)) => {
                self.open.store(false, Ordering::SeqCst);
                Err(TransportError::ReceiveFailed(error))
            }
            Some(MockFrame::Close) | None => {
                self.open.store(false, Ordering::SeqCst);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_connects() {
        let transport = MockTransport::new();
        assert!(!transport.is_open());

        transport.connect("ws://test/client_1").await.unwrap();

        assert!(transport.is_open());
        assert_eq!(transport.connections_opened(), 1);
        assert_eq!(
            transport.last_address(),
            Some("ws://test/client_1".to_string())
        );
    }

    #[tokio::test]
    async fn mock_transport_records_sent_frames() {
        let transport = MockTransport::new();
        let mut conn = transport.connect("addr").await.unwrap();

        conn.sink.send("one".into()).await.unwrap();
        conn.sink.send("two".into()).await.unwrap();

        assert_eq!(transport.sent_frames(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn mock_transport_delivers_inbound_frames_in_order() {
        let transport = MockTransport::new();
        let mut conn = transport.connect("addr").await.unwrap();

        assert!(transport.push_inbound("a"));
        assert!(transport.push_inbound("b"));

        assert_eq!(conn.stream.recv().await.unwrap(), Some("a".into()));
        assert_eq!(conn.stream.recv().await.unwrap(), Some("b".into()));
    }

    // ===========================================
    // Failure Injection
    // ===========================================

    #[tokio::test]
    async fn mock_transport_fail_next_connect() {
        let transport = MockTransport::new();
        transport.fail_next_connect("refused");

        let result = transport.connect("addr").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(e)) if e == "refused"));

        // Next connect should succeed
        assert!(transport.connect("addr").await.is_ok());
        assert_eq!(transport.connect_attempts(), 2);
        assert_eq!(transport.connections_opened(), 1);
    }

    #[tokio::test]
    async fn mock_transport_refuses_until_cleared() {
        let transport = MockTransport::new();
        transport.refuse_connections(Some("down"));

        assert!(transport.connect("addr").await.is_err());
        assert!(transport.connect("addr").await.is_err());

        transport.refuse_connections(None);
        assert!(transport.connect("addr").await.is_ok());
    }

    #[tokio::test]
    async fn drop_connection_ends_stream_and_blocks_sends() {
        let transport = MockTransport::new();
        let mut conn = transport.connect("addr").await.unwrap();

        assert!(transport.drop_connection());

        assert_eq!(conn.stream.recv().await.unwrap(), None);
        assert_eq!(
            conn.sink.send("late".into()).await,
            Err(TransportError::ConnectionClosed)
        );
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn client_close_is_counted_and_echoed() {
        let transport = MockTransport::new();
        let mut conn = transport.connect("addr").await.unwrap();

        conn.sink.close().await.unwrap();

        assert_eq!(transport.close_calls(), 1);
        assert_eq!(conn.stream.recv().await.unwrap(), None);
        assert!(!transport.push_inbound("ignored"));
    }

    #[tokio::test]
    async fn echo_loops_sent_frames_back() {
        let transport = MockTransport::new();
        transport.set_echo(true);
        let mut conn = transport.connect("ws://test/client_1").await.unwrap();

        conn.sink
            .send(r#"{"content":"ping"}"#.to_string())
            .await
            .unwrap();

        assert_eq!(
            conn.stream.recv().await.unwrap().as_deref(),
            Some(r#"{"content":"ping"}"#)
        );
        assert_eq!(transport.sent_frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_delay_is_applied() {
        let transport = MockTransport::new();
        transport.set_connect_delay(Some(Duration::from_millis(500)));

        let started = tokio::time::Instant::now();
        transport.connect("addr").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
