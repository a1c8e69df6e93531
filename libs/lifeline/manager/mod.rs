//! # Lifeline manager
//!
//! The process-wide owner of the single WebSocket session and the dispatcher
//! that turns transport callbacks into state transitions and consumer events.

pub mod dispatcher;
pub mod manager;

pub use dispatcher::ConnectionEvent;
pub use manager::ConnectionManager;
