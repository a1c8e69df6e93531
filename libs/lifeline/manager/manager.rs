use crate::config::ManagerConfig;
use crate::connection_state::{ConnectionSnapshot, ConnectionState, CLOSE_ABNORMAL, CLOSE_NORMAL};
use crate::core::builder::{states, ConnectionManagerBuilder};
use crate::core::connection::Connection;
use crate::core::heartbeat::{spawn_heartbeat, HeartbeatHandle};
use crate::manager::dispatcher::{ConnectionEvent, Subscribers};
use crate::traits::*;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything guarded by the manager's gate
pub(crate) struct Gate {
    /// The single logical connection, `None` until the first connect and after close
    pub(crate) connection: Option<Connection>,
    /// Set by `close()`, cleared by `connect()`. Checked before every reconnect decision.
    pub(crate) close_requested: bool,
    pub(crate) next_generation: Generation,
    pub(crate) heartbeat: Option<HeartbeatHandle>,
    /// Open connections lost in a row without one becoming established.
    /// Feeds the reconnect strategy.
    pub(crate) consecutive_drops: u32,
}

/// A transport that has been created and registered but not yet connected
pub(crate) struct PendingAttempt {
    pub(crate) generation: Generation,
    pub(crate) transport: Arc<dyn Transport>,
}

pub(crate) struct Shared {
    pub(crate) config: ManagerConfig,
    pub(crate) factory: Box<dyn TransportFactory>,
    pub(crate) strategy: Box<dyn ReconnectionStrategy>,
    pub(crate) gate: Mutex<Gate>,
    pub(crate) subscribers: Subscribers,
    pub(crate) events_tx: Sender<(Generation, TransportEvent)>,
    pub(crate) runtime: Handle,
    pub(crate) weak_self: Weak<Shared>,
}

/// Owner of the one logical WebSocket session
///
/// The manager guarantees that at most one connect attempt is in flight and at most
/// one transport is live at any time, no matter how many callers race on
/// `connect`/`send`/`close`. Every state transition and every decision to start an
/// attempt happens under a single lock (the gate).
///
/// Recovery runs on two paths:
/// - **eager**: a remote close or transport error on an open connection triggers a
///   reconnect, delayed by the configured [`ReconnectionStrategy`]
/// - **heartbeat**: a periodic check that reconnects a closed connection, or creates
///   one if none exists. At most one attempt per interval.
///
/// `ConnectionManager` is a cheap handle; clone it to share. Dropping the last
/// handle stops the heartbeat and closes the transport.
///
/// # Example
/// ```ignore
/// let manager = ConnectionManager::builder()
///     .endpoint("ws://10.0.0.2:8282")
///     .transport(TungsteniteFactory)
///     .build()?;
///
/// let events = manager.subscribe();
/// manager.connect().await?;
/// manager.send("hello")?;
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Start building a manager; endpoint and transport factory are required
    pub fn builder() -> ConnectionManagerBuilder<states::NoEndpoint, states::NoTransport> {
        ConnectionManagerBuilder::new()
    }

    /// Called by the builder's `build()` once everything is validated
    pub(crate) fn from_parts(
        config: ManagerConfig,
        factory: Box<dyn TransportFactory>,
        strategy: Box<dyn ReconnectionStrategy>,
        runtime: Handle,
    ) -> Result<Self> {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let shared = Arc::new_cyclic(|weak_self| Shared {
            config,
            factory,
            strategy,
            gate: Mutex::new(Gate {
                connection: None,
                close_requested: false,
                next_generation: 1,
                heartbeat: None,
                consecutive_drops: 0,
            }),
            subscribers: Subscribers::default(),
            events_tx,
            runtime,
            weak_self: weak_self.clone(),
        });

        crate::manager::dispatcher::spawn_dispatcher(events_rx, Arc::downgrade(&shared))?;

        info!("Connection manager created for {}", shared.config.endpoint);
        Ok(Self { shared })
    }

    /// Open the connection, or do nothing if it is already connecting or open
    ///
    /// The handshake runs on a spawned task; this future only waits for its
    /// outcome. Dropping the future does not cancel the attempt.
    ///
    /// A failed attempt leaves the connection `Closed` and is not retried from here;
    /// the heartbeat picks it up on its next tick.
    pub async fn connect(&self) -> Result<()> {
        let (generation, task) = {
            let mut gate = self.shared.gate.lock();
            gate.close_requested = false;
            gate.consecutive_drops = 0;

            if let Some(conn) = gate.connection.as_ref() {
                if conn.state.is_active() {
                    debug!(
                        "connect() ignored, generation {} is already {}",
                        conn.generation, conn.state
                    );
                    return Ok(());
                }
            }

            let attempts = gate
                .connection
                .as_ref()
                .map_or(0, |conn| conn.reconnect_attempts);
            let attempt = self.shared.begin_attempt(&mut gate, attempts);
            info!(
                "Connecting to {} (generation {})",
                self.shared.config.endpoint, attempt.generation
            );
            (attempt.generation, self.shared.spawn_attempt(attempt))
        };

        match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Connect supervisor for generation {} failed: {}", generation, e);
                Err(LifelineError::Connect(format!("connect task failed: {e}")))
            }
        }
    }

    /// Send a payload on the open connection
    ///
    /// Fails with [`LifelineError::NotConnected`] in any state but `Open`.
    pub fn send(&self, message: impl Into<WsMessage>) -> Result<()> {
        let message = message.into();
        let transport = {
            let gate = self.shared.gate.lock();
            match gate.connection.as_ref() {
                Some(conn) if conn.state.is_open() => Arc::clone(&conn.transport),
                Some(conn) => {
                    debug!("send() rejected, connection is {}", conn.state);
                    return Err(LifelineError::NotConnected);
                }
                None => {
                    debug!("send() rejected, no connection");
                    return Err(LifelineError::NotConnected);
                }
            }
        };

        transport.send(message).map_err(|e| match e {
            LifelineError::NotConnected => LifelineError::NotConnected,
            other => LifelineError::Send(other.to_string()),
        })
    }

    /// Close the connection and stop monitoring it
    ///
    /// Valid from any state. Marks the close as requested before stopping the
    /// heartbeat and closing the transport, so no reconnect can slip in. The
    /// connection reference is cleared; the next `connect()` builds a fresh transport.
    pub fn close(&self) {
        let mut gate = self.shared.gate.lock();
        gate.close_requested = true;
        gate.consecutive_drops = 0;

        if let Some(heartbeat) = gate.heartbeat.take() {
            heartbeat.cancel();
        }

        let Some(mut conn) = gate.connection.take() else {
            debug!("close() with no live connection");
            return;
        };

        let was_live = conn.state.is_active();
        conn.state = ConnectionState::Closing;
        debug!("Closing generation {}", conn.generation);
        conn.transport.close();
        conn.state = ConnectionState::Closed;
        info!("Connection closed by request (generation {})", conn.generation);

        if was_live {
            self.shared.subscribers.publish(ConnectionEvent::Closed {
                code: CLOSE_NORMAL,
                reason: "closed by client".to_string(),
            });
        }
    }

    /// Start the heartbeat without waiting for the first successful open
    ///
    /// It also starts automatically on the first open. Idempotent.
    pub fn start_heartbeat(&self) {
        let mut gate = self.shared.gate.lock();
        self.shared.ensure_heartbeat(&mut gate);
    }

    /// Run one heartbeat check right now, independent of the timer
    pub fn check_now(&self) {
        self.shared.heartbeat_tick();
    }

    /// Current state; `Idle` when no connection instance exists
    pub fn state(&self) -> ConnectionState {
        let gate = self.shared.gate.lock();
        gate.connection
            .as_ref()
            .map_or(ConnectionState::Idle, |conn| conn.state)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    pub fn is_heartbeat_running(&self) -> bool {
        let gate = self.shared.gate.lock();
        gate.heartbeat.as_ref().is_some_and(|hb| !hb.is_finished())
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let gate = self.shared.gate.lock();
        let conn = gate.connection.as_ref();
        ConnectionSnapshot {
            state: conn.map_or(ConnectionState::Idle, |c| c.state),
            generation: conn.map(|c| c.generation),
            reconnect_attempts: conn.map_or(0, |c| c.reconnect_attempts),
            last_message_at: conn.and_then(|c| c.last_message_at),
            heartbeat_running: gate.heartbeat.as_ref().is_some_and(|hb| !hb.is_finished()),
            close_requested: gate.close_requested,
            consecutive_drops: gate.consecutive_drops,
        }
    }

    /// Register a consumer
    ///
    /// Each call returns an independent receiver. Every event is delivered to every
    /// live receiver; dropped receivers are pruned on the next event.
    pub fn subscribe(&self) -> Receiver<ConnectionEvent> {
        self.shared.subscribers.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.config.endpoint
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }
}

impl Shared {
    /// Create a fresh transport, register it as the current connection in
    /// `Connecting`, and hand it back to be connected outside the gate.
    ///
    /// Transports are single-use, so this is the only way a connection is (re)opened.
    pub(crate) fn begin_attempt(&self, gate: &mut Gate, reconnect_attempts: u32) -> PendingAttempt {
        let generation = gate.next_generation;
        gate.next_generation += 1;

        let sink = EventSink::new(generation, self.events_tx.clone());
        let transport = self.factory.create(&self.config.endpoint, sink);

        let mut conn = Connection::new(generation, Arc::clone(&transport), reconnect_attempts);
        conn.state = ConnectionState::Connecting;

        if let Some(old) = gate.connection.replace(conn) {
            if !old.transport.is_closed() {
                debug!("Closing superseded transport (generation {})", old.generation);
                old.transport.close();
            }
        }

        PendingAttempt {
            generation,
            transport,
        }
    }

    /// Run `Transport::connect` on its own task and apply the outcome under the gate.
    ///
    /// The handshake runs in an inner task so a panicking transport surfaces as a
    /// connect failure instead of leaving the connection stuck in `Connecting`.
    pub(crate) fn spawn_attempt(&self, attempt: PendingAttempt) -> JoinHandle<Result<()>> {
        let weak = self.weak_self.clone();
        let PendingAttempt {
            generation,
            transport,
        } = attempt;

        self.runtime.spawn(async move {
            let connecting = Arc::clone(&transport);
            let outcome = match tokio::spawn(async move { connecting.connect().await }).await {
                Ok(outcome) => outcome,
                Err(e) => Err(LifelineError::Connect(format!("connect task failed: {e}"))),
            };

            match weak.upgrade() {
                Some(shared) => shared.finish_attempt(generation, &transport, outcome),
                None => {
                    transport.close();
                    Err(LifelineError::Connect(
                        "connection manager was dropped".to_string(),
                    ))
                }
            }
        })
    }

    fn finish_attempt(
        &self,
        generation: Generation,
        transport: &Arc<dyn Transport>,
        outcome: Result<()>,
    ) -> Result<()> {
        let mut gate = self.gate.lock();

        let is_current = gate
            .connection
            .as_ref()
            .is_some_and(|conn| conn.generation == generation);
        if !is_current || gate.close_requested {
            drop(gate);
            debug!(
                "Discarding outcome of superseded connect attempt (generation {})",
                generation
            );
            if outcome.is_ok() {
                transport.close();
            }
            return Err(LifelineError::Connect(
                "connection was closed or superseded before the handshake completed".to_string(),
            ));
        }

        match outcome {
            Ok(()) => {
                let state = gate.connection.as_ref().map(|conn| conn.state);
                match state {
                    Some(ConnectionState::Connecting) => {
                        self.apply_opened(&mut gate);
                        Ok(())
                    }
                    Some(ConnectionState::Open) => Ok(()),
                    _ => Err(LifelineError::Connect(
                        "connection closed during the handshake".to_string(),
                    )),
                }
            }
            Err(e) => {
                let err = e.into_connect_error();
                if let Some(conn) = gate.connection.as_mut() {
                    if conn.state.is_connecting() {
                        conn.state = ConnectionState::Closed;
                        warn!(
                            "Connect attempt failed (generation {}): {}",
                            generation, err
                        );
                        self.subscribers
                            .publish(ConnectionEvent::Error(err.to_string()));
                    }
                }
                Err(err)
            }
        }
    }

    /// `Connecting -> Open` for the current connection, notify, start the heartbeat
    pub(crate) fn apply_opened(&self, gate: &mut Gate) {
        let Some(conn) = gate.connection.as_mut() else {
            return;
        };
        if !conn.mark_opened() {
            return;
        }

        info!(
            "Connected to {} (generation {})",
            self.config.endpoint, conn.generation
        );
        self.subscribers.publish(ConnectionEvent::Opened);
        self.ensure_heartbeat(gate);
    }

    pub(crate) fn ensure_heartbeat(&self, gate: &mut Gate) {
        if gate.heartbeat.as_ref().is_some_and(|hb| !hb.is_finished()) {
            return;
        }

        let weak = self.weak_self.clone();
        let heartbeat = spawn_heartbeat(&self.runtime, self.config.heartbeat_interval(), move || {
            match weak.upgrade() {
                Some(shared) => {
                    shared.heartbeat_tick();
                    true
                }
                None => false,
            }
        });
        info!("Heartbeat started ({:?} interval)", heartbeat.interval());
        gate.heartbeat = Some(heartbeat);
    }

    /// One liveness check
    ///
    /// - no connection: create one and connect
    /// - `Closed`: one reconnect attempt with a fresh transport; failure waits for the next tick
    /// - `Open` past `stale_after` without traffic: close it and reconnect
    /// - anything else: nothing
    pub(crate) fn heartbeat_tick(&self) {
        let mut gate = self.gate.lock();

        if gate.close_requested {
            debug!("Heartbeat: close requested, skipping check");
            return;
        }

        let stale_after = self.config.stale_after();
        let attempts = match gate.connection.as_mut() {
            None => {
                info!("Heartbeat: no live connection, creating one");
                Some(0)
            }
            Some(conn) if conn.state.is_closed() => {
                warn!(
                    "Heartbeat: connection closed (generation {}), reconnecting",
                    conn.generation
                );
                Some(conn.reconnect_attempts.saturating_add(1))
            }
            Some(conn) if stale_after.is_some_and(|limit| conn.is_stale(limit)) => {
                let idle = conn.idle_for();
                warn!(
                    "Heartbeat: no inbound traffic for {:?} (generation {}), treating connection as dead",
                    idle, conn.generation
                );
                conn.transport.close();
                conn.state = ConnectionState::Closed;
                self.subscribers.publish(ConnectionEvent::Closed {
                    code: CLOSE_ABNORMAL,
                    reason: format!("no inbound traffic for {}ms", idle.as_millis()),
                });
                Some(conn.reconnect_attempts.saturating_add(1))
            }
            Some(conn) => {
                debug!("Heartbeat: connection is {}, nothing to do", conn.state);
                None
            }
        };

        if let Some(attempts) = attempts {
            let attempt = self.begin_attempt(&mut gate, attempts);
            drop(gate);
            // Detached: failures are logged in finish_attempt and left for the next tick
            drop(self.spawn_attempt(attempt));
        }
    }

    /// Eager reconnect after the current open connection dropped
    ///
    /// The strategy is asked with the number of drops in a row. A connection that
    /// delivered a message or stayed open for a heartbeat interval resets the count.
    pub(crate) fn schedule_reconnect(&self, gate: &mut Gate, generation: Generation) {
        if gate.close_requested {
            debug!("Close requested, not reconnecting generation {}", generation);
            return;
        }

        let window = self.config.heartbeat_interval();
        if gate
            .connection
            .as_ref()
            .is_some_and(|conn| conn.is_established(window))
        {
            gate.consecutive_drops = 0;
        }
        let attempts = gate.consecutive_drops;
        gate.consecutive_drops = attempts.saturating_add(1);

        match self.strategy.next_delay(attempts) {
            None => {
                info!(
                    "Reconnect strategy declined after {} drops in a row, heartbeat will retry",
                    attempts.saturating_add(1)
                );
            }
            Some(delay) if delay.is_zero() => {
                if let Some(attempt) = self.reconnect_if_closed(gate, generation) {
                    self.spawn_reconnect(attempt);
                }
            }
            Some(delay) => {
                info!(
                    "Reconnecting in {:?} (attempt {})",
                    delay,
                    attempts.saturating_add(1)
                );
                let weak = self.weak_self.clone();
                self.runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let Some(shared) = weak.upgrade() else {
                        return;
                    };
                    let attempt = {
                        let mut gate = shared.gate.lock();
                        shared.reconnect_if_closed(&mut gate, generation)
                    };
                    if let Some(attempt) = attempt {
                        shared.spawn_reconnect(attempt);
                    }
                });
            }
        }
    }

    /// Start a reconnect only if `generation` is still the current, closed connection.
    /// Whoever gets here first (eager path or heartbeat) wins; the other sees a new
    /// generation and backs off.
    fn reconnect_if_closed(&self, gate: &mut Gate, generation: Generation) -> Option<PendingAttempt> {
        if gate.close_requested {
            return None;
        }

        let attempts = match gate.connection.as_ref() {
            Some(conn) if conn.generation == generation && conn.state.is_closed() => {
                conn.reconnect_attempts.saturating_add(1)
            }
            _ => {
                debug!("Generation {} already superseded, skipping reconnect", generation);
                return None;
            }
        };

        let attempt = self.begin_attempt(gate, attempts);
        info!(
            "Reconnecting to {} (attempt {}, generation {})",
            self.config.endpoint, attempts, attempt.generation
        );
        Some(attempt)
    }

    fn spawn_reconnect(&self, attempt: PendingAttempt) {
        drop(self.spawn_attempt(attempt));
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let gate = self.gate.get_mut();
        gate.close_requested = true;

        if let Some(heartbeat) = gate.heartbeat.take() {
            heartbeat.cancel();
        }
        if let Some(conn) = gate.connection.take() {
            conn.transport.close();
        }
        debug!("Connection manager dropped");
    }
}
