use crate::error::Result;
use crate::message::WsMessage;
use async_trait::async_trait;
use crossbeam_channel::Sender;
use std::sync::Arc;

/// Identity of one transport instance.
///
/// Every transport created by the manager gets a new generation; events tagged with
/// an older generation are ignored.
pub type Generation = u64;

/// Lifecycle event raised by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed
    Open,
    /// Inbound payload
    Message(WsMessage),
    /// Socket closed
    Close {
        code: u16,
        reason: String,
        /// `true` when the peer (or the network) closed the socket
        remote: bool,
    },
    /// Transport-level failure
    Error(String),
}

/// Sending half of the event queue handed to a transport when it is created.
///
/// Transports may emit from any thread; events are delivered to the manager in
/// the order they were emitted.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    tx: Sender<(Generation, TransportEvent)>,
}

impl EventSink {
    /// Create a sink that tags every event with `generation`
    pub fn new(generation: Generation, tx: Sender<(Generation, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the transport this sink belongs to
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Emit an event, returns `false` if nobody is listening anymore
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn open(&self) -> bool {
        self.emit(TransportEvent::Open)
    }

    pub fn message(&self, message: WsMessage) -> bool {
        self.emit(TransportEvent::Message(message))
    }

    pub fn close(&self, code: u16, reason: impl Into<String>, remote: bool) -> bool {
        self.emit(TransportEvent::Close {
            code,
            reason: reason.into(),
            remote,
        })
    }

    pub fn error(&self, error: impl ToString) -> bool {
        self.emit(TransportEvent::Error(error.to_string()))
    }
}

/// Socket implementation driven by the connection manager
///
/// A transport instance is single-use: once it has been connected (successfully or
/// not) or closed, calling `connect` again must fail with
/// [`LifelineError::InvalidReuse`](crate::LifelineError::InvalidReuse).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the socket and wait for the handshake result
    ///
    /// Implementations should also emit [`TransportEvent::Open`] through their sink.
    async fn connect(&self) -> Result<()>;

    /// Queue an outbound message
    ///
    /// Must return [`LifelineError::NotConnected`](crate::LifelineError::NotConnected)
    /// if the socket is not open. Must not block.
    fn send(&self, message: WsMessage) -> Result<()>;

    /// Request the socket to close. Must not block.
    fn close(&self);

    /// Best-effort view of the socket, may lag reality
    fn is_open(&self) -> bool;

    /// Best-effort view of the socket, may lag reality
    fn is_closed(&self) -> bool;
}

/// Creates a fresh transport for every connect or reconnect attempt
pub trait TransportFactory: Send + Sync + 'static {
    fn create(&self, endpoint: &str, events: EventSink) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&str, EventSink) -> Arc<dyn Transport> + Send + Sync + 'static,
{
    fn create(&self, endpoint: &str, events: EventSink) -> Arc<dyn Transport> {
        self(endpoint, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_events_with_generation() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = EventSink::new(7, tx);

        assert!(sink.open());
        assert!(sink.message(WsMessage::from("hello")));
        assert!(sink.close(1006, "abnormal", true));

        assert_eq!(rx.recv().unwrap(), (7, TransportEvent::Open));
        assert_eq!(
            rx.recv().unwrap(),
            (7, TransportEvent::Message(WsMessage::Text("hello".to_string())))
        );
        assert_eq!(
            rx.recv().unwrap(),
            (
                7,
                TransportEvent::Close {
                    code: 1006,
                    reason: "abnormal".to_string(),
                    remote: true
                }
            )
        );
    }

    #[test]
    fn test_sink_reports_dropped_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = EventSink::new(1, tx);
        drop(rx);
        assert!(!sink.error("boom"));
    }
}
