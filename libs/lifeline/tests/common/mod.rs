//! Common test utilities for Lifeline integration tests
//!
//! Provides a scriptable in-memory transport, a local echo WebSocket server,
//! and polling helpers for the asynchronous bits.

#![allow(dead_code)]

use async_trait::async_trait;
use crossbeam_channel::Receiver;
use lifeline::{
    ConnectionEvent, EventSink, LifelineError, Result, Transport, TransportFactory, WsMessage,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

// ============================================================================
// Scripted transport
// ============================================================================

const PHASE_NEW: u8 = 0;
const PHASE_CONNECTING: u8 = 1;
const PHASE_OPEN: u8 = 2;
const PHASE_CLOSED: u8 = 3;

/// Shared knobs and counters for every transport a [`MockFactory`] creates
#[derive(Default)]
pub struct Script {
    /// The next N connect calls fail
    pub fail_connects: AtomicUsize,
    /// Handshake duration
    pub connect_delay_ms: AtomicU64,
    /// Outbound text that triggers an inbound reply
    pub auto_reply: Mutex<Option<(String, String)>>,
    transports: Mutex<Vec<Arc<MockTransport>>>,
    connect_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_connects.store(n, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn reply(&self, trigger: &str, response: &str) {
        *self.auto_reply.lock() = Some((trigger.to_string(), response.to_string()));
    }

    /// Number of transports created so far
    pub fn created(&self) -> usize {
        self.transports.lock().len()
    }

    pub fn transport(&self, index: usize) -> Arc<MockTransport> {
        Arc::clone(&self.transports.lock()[index])
    }

    pub fn latest(&self) -> Arc<MockTransport> {
        let transports = self.transports.lock();
        Arc::clone(transports.last().expect("no transport created yet"))
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.fail_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// In-memory transport driven by a [`Script`]
pub struct MockTransport {
    events: EventSink,
    script: Arc<Script>,
    phase: AtomicU8,
    sent: Mutex<Vec<WsMessage>>,
}

impl MockTransport {
    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    pub fn sent(&self) -> Vec<WsMessage> {
        self.sent.lock().clone()
    }

    /// Peer closes the socket
    pub fn remote_close(&self, code: u16, reason: &str) {
        self.phase.store(PHASE_CLOSED, Ordering::SeqCst);
        self.events.close(code, reason, true);
    }

    /// Socket fails
    pub fn fail(&self, error: &str) {
        self.phase.store(PHASE_CLOSED, Ordering::SeqCst);
        self.events.error(error);
    }

    /// Inbound message from the peer
    pub fn deliver(&self, message: impl Into<WsMessage>) {
        self.events.message(message.into());
    }

    /// Socket dies without anyone noticing
    pub fn silently_die(&self) {
        self.phase.store(PHASE_CLOSED, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<()> {
        if self
            .phase
            .compare_exchange(PHASE_NEW, PHASE_CONNECTING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LifelineError::InvalidReuse);
        }

        self.script.connect_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.script.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.script.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.script.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.script.take_failure() {
            self.phase.store(PHASE_CLOSED, Ordering::SeqCst);
            return Err(LifelineError::Connect("connection refused".to_string()));
        }

        if self
            .phase
            .compare_exchange(PHASE_CONNECTING, PHASE_OPEN, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LifelineError::Connect("closed during handshake".to_string()));
        }

        self.events.open();
        Ok(())
    }

    fn send(&self, message: WsMessage) -> Result<()> {
        if self.phase.load(Ordering::SeqCst) != PHASE_OPEN {
            return Err(LifelineError::NotConnected);
        }

        let reply = self
            .script
            .auto_reply
            .lock()
            .as_ref()
            .filter(|(trigger, _)| message.as_text() == Some(trigger.as_str()))
            .map(|(_, response)| response.clone());

        self.sent.lock().push(message);
        if let Some(response) = reply {
            self.events.message(WsMessage::Text(response));
        }
        Ok(())
    }

    fn close(&self) {
        let previous = self.phase.swap(PHASE_CLOSED, Ordering::SeqCst);
        if previous == PHASE_OPEN {
            self.events.close(1000, "closed by client", false);
        }
    }

    fn is_open(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == PHASE_OPEN
    }

    fn is_closed(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == PHASE_CLOSED
    }
}

/// Factory handing out [`MockTransport`]s that share one [`Script`]
#[derive(Clone)]
pub struct MockFactory {
    script: Arc<Script>,
}

impl MockFactory {
    pub fn new(script: &Arc<Script>) -> Self {
        Self {
            script: Arc::clone(script),
        }
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, _endpoint: &str, events: EventSink) -> Arc<dyn Transport> {
        let transport = Arc::new(MockTransport {
            events,
            script: Arc::clone(&self.script),
            phase: AtomicU8::new(PHASE_NEW),
            sent: Mutex::new(Vec::new()),
        });
        self.script.transports.lock().push(Arc::clone(&transport));
        transport
    }
}

// ============================================================================
// Polling helpers
// ============================================================================

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Next event on `rx`, or `None` after `timeout`
pub async fn next_event(rx: &Receiver<ConnectionEvent>, timeout: Duration) -> Option<ConnectionEvent> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(event) = rx.try_recv() {
            return Some(event);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Skip events until one matches, or `None` after `timeout`
pub async fn wait_for_event<F>(
    rx: &Receiver<ConnectionEvent>,
    timeout: Duration,
    mut matches: F,
) -> Option<ConnectionEvent>
where
    F: FnMut(&ConnectionEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match next_event(rx, remaining).await {
            Some(event) if matches(&event) => return Some(event),
            Some(_) => continue,
            None => return None,
        }
    }
}

/// Everything currently queued on `rx`
pub fn drain(rx: &Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    rx.try_iter().collect()
}

// ============================================================================
// Echo server
// ============================================================================

/// A simple mock WebSocket server for testing
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    kick: Arc<Notify>,
    accepted: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let kick = Arc::new(Notify::new());
        let accepted = Arc::new(AtomicUsize::new(0));

        let shutdown_clone = shutdown.clone();
        let kick_clone = kick.clone();
        let accepted_clone = accepted.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                accepted_clone.fetch_add(1, Ordering::SeqCst);
                                let shutdown = shutdown_clone.clone();
                                let kick = kick_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown, kick).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            kick,
            accepted,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        shutdown: Arc<Notify>,
        kick: Arc<Notify>,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        use tokio_tungstenite::tungstenite::Message;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                // Echo the message back
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = kick.notified() => {
                    let frame = CloseFrame {
                        code: CloseCode::Away,
                        reason: "server restarting".into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    break;
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of WebSocket sessions accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Close every live session with 1001 "server restarting"
    pub fn kick_all(&self) {
        self.kick.notify_waiters();
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
