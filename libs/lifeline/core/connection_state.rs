use crate::transport::Generation;
use chrono::{DateTime, Utc};
use std::fmt;

/// Normal closure, used when the client closes on request
pub const CLOSE_NORMAL: u16 = 1000;
/// No close frame was received (dropped socket, stale connection)
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Lifecycle state of the managed connection
///
/// `Idle` means no transport instance exists. `Closed` is terminal for one
/// instance; the next connect starts over with a fresh transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    #[inline]
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }

    #[inline]
    pub fn is_connecting(self) -> bool {
        self == ConnectionState::Connecting
    }

    #[inline]
    pub fn is_closed(self) -> bool {
        self == ConnectionState::Closed
    }

    /// `Connecting` or `Open`: a new connect request must be a no-op
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the manager, taken under its lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    /// Generation of the current transport, `None` when idle
    pub generation: Option<Generation>,
    pub reconnect_attempts: u32,
    pub last_message_at: Option<DateTime<Utc>>,
    pub heartbeat_running: bool,
    pub close_requested: bool,
    /// Open connections lost in a row, as seen by the reconnect strategy
    pub consecutive_drops: u32,
}
