//! Event dispatcher
//!
//! Transports push [`TransportEvent`]s into an unbounded crossbeam channel from
//! whatever context they run on. A dedicated OS thread drains that channel in
//! order and applies each event to the manager under its gate:
//!
//! ```text
//! Transport (any thread) ──> crossbeam queue ──> dispatcher thread ──> gate
//!                                                       │
//!                                                       └──> subscribers (ConnectionEvent)
//! ```
//!
//! Events tagged with a generation other than the current connection's are
//! dropped, so a superseded or explicitly closed transport can never move the
//! state machine or trigger a reconnect.

use crate::connection_state::ConnectionState;
use crate::manager::manager::Shared;
use crate::traits::*;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Weak;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// How often the dispatcher wakes up to notice the manager was dropped
const DISPATCH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Notification delivered to consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection is open
    Opened,
    /// Inbound payload, forwarded unchanged
    Message(WsMessage),
    /// The connection closed (remotely, on error-free drop, or on request)
    Closed { code: u16, reason: String },
    /// A connect attempt or the live connection failed
    Error(String),
}

/// Fan-out to zero or more consumers
#[derive(Default)]
pub(crate) struct Subscribers {
    senders: Mutex<Vec<Sender<ConnectionEvent>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> Receiver<ConnectionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber, pruning the ones that hung up.
    /// Returns the number of subscribers reached.
    pub(crate) fn publish(&self, event: ConnectionEvent) -> usize {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        senders.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.lock().len()
    }
}

/// Spawn the dispatcher thread
///
/// The thread only holds a weak reference to the manager and exits once the
/// manager is gone.
pub(crate) fn spawn_dispatcher(
    events_rx: Receiver<(Generation, TransportEvent)>,
    shared: Weak<Shared>,
) -> Result<()> {
    std::thread::Builder::new()
        .name("lifeline-dispatcher".to_string())
        .spawn(move || dispatch_loop(events_rx, shared))
        .map_err(|e| {
            LifelineError::Configuration(format!("Failed to spawn dispatcher thread: {}", e))
        })?;
    Ok(())
}

fn dispatch_loop(events_rx: Receiver<(Generation, TransportEvent)>, shared: Weak<Shared>) {
    debug!("Dispatcher thread started");

    loop {
        match events_rx.recv_timeout(DISPATCH_POLL_INTERVAL) {
            Ok((generation, event)) => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.dispatch(generation, event);
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.strong_count() == 0 {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Dispatcher thread exiting");
}

impl Shared {
    /// Apply one transport event to the current connection
    pub(crate) fn dispatch(&self, generation: Generation, event: TransportEvent) {
        let mut gate = self.gate.lock();

        let Some(conn) = gate
            .connection
            .as_mut()
            .filter(|conn| conn.generation == generation)
        else {
            debug!(
                "Ignoring {:?} from stale transport (generation {})",
                event, generation
            );
            return;
        };

        match event {
            TransportEvent::Open => {
                self.apply_opened(&mut gate);
            }
            TransportEvent::Message(payload) => {
                conn.record_message();
                trace!("Received {} byte message", payload.len());
                self.subscribers.publish(ConnectionEvent::Message(payload));
            }
            TransportEvent::Close {
                code,
                reason,
                remote,
            } => {
                if conn.state.is_closed() {
                    debug!("Close event for already closed generation {}", generation);
                    return;
                }

                let was_open = conn.state.is_open();
                conn.state = ConnectionState::Closed;
                info!(
                    "Connection closed (generation {}, code {}, reason '{}', remote {})",
                    generation, code, reason, remote
                );
                self.subscribers
                    .publish(ConnectionEvent::Closed { code, reason });

                if remote && was_open {
                    self.schedule_reconnect(&mut gate, generation);
                }
            }
            TransportEvent::Error(err) => {
                if conn.state.is_closed() {
                    debug!("Error on already closed generation {}: {}", generation, err);
                    return;
                }

                let was_open = conn.state.is_open();
                conn.state = ConnectionState::Closed;
                let err = LifelineError::Transport(err);
                warn!("Transport error (generation {}): {}", generation, err);
                self.subscribers
                    .publish(ConnectionEvent::Error(err.to_string()));

                if was_open {
                    self.schedule_reconnect(&mut gate, generation);
                }
            }
        }
    }
}
