//! Lifeline WebSocket service - main library
//!
//! Thin service layer around the `lifeline` connection manager.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, logging, runners, shutdown)
//! - **lifeline**: Connection manager library (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use lifeline_service::bin_common::{load_config_from_env, ConfigType};
//! use lifeline_service::lifeline::ConnectionManager;
//! ```

// Re-export workspace libraries for convenience
pub use lifeline;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod runner;
    pub mod shutdown;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use logging::init_tracing;
    pub use runner::{BinaryRunner, RunConfig};
    pub use shutdown::ShutdownManager;
}
