//! # Lifeline core
//!
//! Building blocks of the connection manager: configuration, the connection
//! state machine, the heartbeat timer, the builder, and the tokio-tungstenite
//! transport.

pub mod builder;
pub mod config;
pub(crate) mod connection;
pub mod connection_state;
pub mod heartbeat;
pub mod ws_transport;

// Re-export main types
pub use builder::{states, ConnectionManagerBuilder};
pub use config::{ConfigError, ManagerConfig, DEFAULT_HEARTBEAT_INTERVAL_MS};
pub use connection_state::{ConnectionSnapshot, ConnectionState, CLOSE_ABNORMAL, CLOSE_NORMAL};
pub use heartbeat::HeartbeatHandle;
pub use ws_transport::{TungsteniteFactory, TungsteniteTransport};
