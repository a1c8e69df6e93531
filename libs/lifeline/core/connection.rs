//! The single logical session owned by the manager.
//!
//! Only ever touched while the manager's gate is held, so plain fields are enough.

use crate::connection_state::ConnectionState;
use crate::transport::{Generation, Transport};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) struct Connection {
    pub(crate) generation: Generation,
    pub(crate) state: ConnectionState,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) reconnect_attempts: u32,
    pub(crate) last_message_at: Option<DateTime<Utc>>,
    opened_at: Option<Instant>,
    /// Monotonic time of the last open or inbound message, drives stale detection
    last_activity: Instant,
}

impl Connection {
    pub(crate) fn new(
        generation: Generation,
        transport: Arc<dyn Transport>,
        reconnect_attempts: u32,
    ) -> Self {
        Self {
            generation,
            state: ConnectionState::Idle,
            transport,
            reconnect_attempts,
            last_message_at: None,
            opened_at: None,
            last_activity: Instant::now(),
        }
    }

    /// `Connecting -> Open`. Returns `false` if the connection was not connecting,
    /// so duplicate open notifications are harmless.
    pub(crate) fn mark_opened(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        self.reconnect_attempts = 0;
        self.opened_at = Some(Instant::now());
        self.last_activity = Instant::now();
        true
    }

    pub(crate) fn record_message(&mut self) {
        self.last_message_at = Some(Utc::now());
        self.last_activity = Instant::now();
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// The session proved healthy: it delivered a message, or stayed open for `window`
    pub(crate) fn is_established(&self, window: Duration) -> bool {
        self.last_message_at.is_some() || self.opened_at.is_some_and(|at| at.elapsed() >= window)
    }

    /// Open, but nothing received for at least `stale_after`
    pub(crate) fn is_stale(&self, stale_after: Duration) -> bool {
        self.state == ConnectionState::Open && self.idle_for() >= stale_after
    }
}
