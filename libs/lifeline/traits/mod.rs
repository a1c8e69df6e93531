//! # Lifeline Traits
//!
//! Core traits and types shared by the connection manager and transports:
//!
//! - **Transport** / **TransportFactory**: the socket seam the manager drives
//! - **EventSink**: how a transport reports lifecycle events back
//! - **ReconnectionStrategy**: delay policy for eager reconnects
//! - **LifelineError**: the error taxonomy
//!
//! ## Example
//!
//! ```rust,ignore
//! use lifeline::traits::*;
//!
//! struct MyTransport { events: EventSink }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn connect(&self) -> Result<()> {
//!         // handshake...
//!         self.events.open();
//!         Ok(())
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod message;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{LifelineError, Result};
pub use message::WsMessage;
pub use reconnect::{ExponentialBackoff, FixedDelay, Immediate, NeverReconnect, ReconnectionStrategy};
pub use transport::{EventSink, Generation, Transport, TransportEvent, TransportFactory};
