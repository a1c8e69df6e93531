//! # Lifeline
//!
//! Keeps exactly one WebSocket session to a fixed endpoint alive for the lifetime
//! of a process.
//!
//! ## Features
//!
//! - **Single gate**: every state transition and connect decision happens under one lock
//! - **Type-state builder**: endpoint and transport are required at compile time
//! - **Eager recovery**: remote closes and errors on an open connection reconnect right away
//! - **Heartbeat backstop**: a periodic check repairs a closed or missing connection
//! - **Generation checks**: events from superseded transports are dropped
//! - **Pluggable transport**: tokio-tungstenite by default, any [`Transport`] in tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use lifeline::{ConnectionEvent, ConnectionManager, TungsteniteFactory};
//!
//! #[tokio::main]
//! async fn main() -> lifeline::Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .endpoint("ws://10.0.0.2:8282")
//!         .transport(TungsteniteFactory)
//!         .build()?;
//!
//!     let events = manager.subscribe();
//!     manager.connect().await?;
//!     manager.send("ping")?;
//!
//!     while let Ok(event) = events.recv() {
//!         if let ConnectionEvent::Message(msg) = event {
//!             println!("Got: {:?}", msg);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod traits;
pub mod core;
pub mod manager;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    builder, config, connection_state, heartbeat, ws_transport,
    builder::{states, ConnectionManagerBuilder},
    config::{ConfigError, ManagerConfig, DEFAULT_HEARTBEAT_INTERVAL_MS},
    connection_state::{ConnectionSnapshot, ConnectionState, CLOSE_ABNORMAL, CLOSE_NORMAL},
    ws_transport::{TungsteniteFactory, TungsteniteTransport},
};

// Re-export manager
pub use manager::{ConnectionEvent, ConnectionManager};
