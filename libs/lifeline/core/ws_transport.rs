//! tokio-tungstenite transport
//!
//! One instance per connect attempt. After a successful handshake a single I/O
//! task owns the socket and multiplexes inbound frames with the outbound queue:
//!
//! ```text
//! send() ──> mpsc ──┐
//!                   ├──> I/O task ──> write half
//! read half ────────┘        │
//!                            └──> EventSink (message / close / error)
//! ```

use crate::connection_state::{CLOSE_ABNORMAL, CLOSE_NORMAL};
use crate::traits::*;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

const PHASE_NEW: u8 = 0;
const PHASE_CONNECTING: u8 = 1;
const PHASE_OPEN: u8 = 2;
const PHASE_CLOSED: u8 = 3;

/// Close code reported when the peer's close frame carried no status
const CLOSE_NO_STATUS: u16 = 1005;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug)]
enum Outbound {
    Message(WsMessage),
    Close,
}

/// WebSocket client socket backed by tokio-tungstenite
pub struct TungsteniteTransport {
    endpoint: String,
    events: EventSink,
    phase: Arc<AtomicU8>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    local_close: Arc<AtomicBool>,
}

impl TungsteniteTransport {
    pub fn new(endpoint: impl Into<String>, events: EventSink) -> Self {
        Self {
            endpoint: endpoint.into(),
            events,
            phase: Arc::new(AtomicU8::new(PHASE_NEW)),
            outbound: Mutex::new(None),
            local_close: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn phase(&self) -> u8 {
        self.phase.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self) -> Result<()> {
        if self
            .phase
            .compare_exchange(PHASE_NEW, PHASE_CONNECTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LifelineError::InvalidReuse);
        }

        debug!(
            "Opening WebSocket to {} (generation {})",
            self.endpoint,
            self.events.generation()
        );

        let mut ws_stream = match connect_async(self.endpoint.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                self.phase.store(PHASE_CLOSED, Ordering::Release);
                return Err(LifelineError::Connect(e.to_string()));
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.outbound.lock() = Some(outbound_tx);

        if self
            .phase
            .compare_exchange(PHASE_CONNECTING, PHASE_OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // close() won the race during the handshake
            self.outbound.lock().take();
            let _ = ws_stream.close(None).await;
            return Err(LifelineError::Connect(
                "transport closed during the handshake".to_string(),
            ));
        }

        info!("WebSocket open: {}", self.endpoint);
        // Open must be queued before the I/O task can emit any message
        self.events.open();

        tokio::spawn(io_loop(
            ws_stream,
            outbound_rx,
            self.events.clone(),
            Arc::clone(&self.phase),
            Arc::clone(&self.local_close),
        ));

        Ok(())
    }

    fn send(&self, message: WsMessage) -> Result<()> {
        if self.phase() != PHASE_OPEN {
            return Err(LifelineError::NotConnected);
        }

        match self.outbound.lock().as_ref() {
            Some(tx) => tx
                .send(Outbound::Message(message))
                .map_err(|_| LifelineError::NotConnected),
            None => Err(LifelineError::NotConnected),
        }
    }

    fn close(&self) {
        self.local_close.store(true, Ordering::Release);
        let previous = self.phase.swap(PHASE_CLOSED, Ordering::AcqRel);

        if previous == PHASE_OPEN {
            if let Some(tx) = self.outbound.lock().take() {
                let _ = tx.send(Outbound::Close);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.phase() == PHASE_OPEN
    }

    fn is_closed(&self) -> bool {
        self.phase() == PHASE_CLOSED
    }
}

async fn io_loop(
    ws_stream: WsStream,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    events: EventSink,
    phase: Arc<AtomicU8>,
    local_close: Arc<AtomicBool>,
) {
    let (mut write, mut read) = ws_stream.split();
    let remote = || !local_close.load(Ordering::Acquire);

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        events.message(WsMessage::Text(text));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        events.message(WsMessage::Binary(data));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or_else(
                            || (CLOSE_NO_STATUS, String::new()),
                            |f| (u16::from(f.code), f.reason.to_string()),
                        );
                        debug!("Close frame received: {} '{}'", code, reason);
                        phase.store(PHASE_CLOSED, Ordering::Release);
                        events.close(code, reason, remote());
                        break;
                    }
                    // Ping replies are handled by tungstenite
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        phase.store(PHASE_CLOSED, Ordering::Release);
                        if remote() {
                            error!("WebSocket error: {}", e);
                            events.error(e);
                        } else {
                            events.close(CLOSE_NORMAL, "closed by client", false);
                        }
                        break;
                    }
                    None => {
                        warn!("WebSocket stream closed");
                        phase.store(PHASE_CLOSED, Ordering::Release);
                        events.close(CLOSE_ABNORMAL, "stream ended", remote());
                        break;
                    }
                }
            }

            cmd = outbound_rx.recv() => {
                match cmd {
                    Some(Outbound::Message(message)) => {
                        if let Err(e) = write.send(to_tungstenite(message)).await {
                            error!("WebSocket send failed: {}", e);
                            phase.store(PHASE_CLOSED, Ordering::Release);
                            events.error(e);
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        debug!("Closing WebSocket on request");
                        let _ = write.close().await;
                        events.close(CLOSE_NORMAL, "closed by client", false);
                        break;
                    }
                }
            }
        }
    }

    debug!("WebSocket I/O task exiting (generation {})", events.generation());
}

fn to_tungstenite(message: WsMessage) -> Message {
    match message {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

/// Default factory, one [`TungsteniteTransport`] per attempt
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteFactory;

impl TransportFactory for TungsteniteFactory {
    fn create(&self, endpoint: &str, events: EventSink) -> Arc<dyn Transport> {
        Arc::new(TungsteniteTransport::new(endpoint, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> (TungsteniteTransport, crossbeam_channel::Receiver<(Generation, TransportEvent)>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        // Port 1 is never listening
        (TungsteniteTransport::new("ws://127.0.0.1:1", EventSink::new(1, tx)), rx)
    }

    #[tokio::test]
    async fn test_failed_connect_is_single_use() {
        let (transport, events) = transport();

        let first = transport.connect().await;
        assert!(matches!(first, Err(LifelineError::Connect(_))));
        assert!(transport.is_closed());
        assert!(events.try_recv().is_err(), "no Open for a failed handshake");

        let second = transport.connect().await;
        assert_eq!(second, Err(LifelineError::InvalidReuse));
    }

    #[tokio::test]
    async fn test_closed_transport_cannot_connect() {
        let (transport, _events) = transport();
        transport.close();

        assert!(transport.is_closed());
        assert_eq!(transport.connect().await, Err(LifelineError::InvalidReuse));
    }

    #[test]
    fn test_send_before_open() {
        let (transport, _events) = transport();
        assert!(!transport.is_open());
        assert_eq!(
            transport.send(WsMessage::from("ping")),
            Err(LifelineError::NotConnected)
        );
    }
}
