use thiserror::Error;

/// Main error type for lifeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifelineError {
    /// Handshake, DNS or socket failure while connecting or reconnecting
    #[error("Connect error: {0}")]
    Connect(String),

    /// `send` was called while the connection was not open
    #[error("Not connected")]
    NotConnected,

    /// Error raised by the transport on a live connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// A transport handle was connected a second time.
    ///
    /// Transport handles are single-use; a fresh one must be created instead.
    #[error("Transport handle was already used and cannot be reconnected")]
    InvalidReuse,

    /// The transport failed to queue or write an outbound message
    #[error("Send error: {0}")]
    Send(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LifelineError {
    /// Normalize an error returned from a connect attempt into the connect taxonomy.
    ///
    /// `Connect` and `InvalidReuse` are kept as-is, anything else is wrapped.
    pub fn into_connect_error(self) -> Self {
        match self {
            LifelineError::Connect(_) | LifelineError::InvalidReuse => self,
            other => LifelineError::Connect(other.to_string()),
        }
    }
}

/// Result type for lifeline operations
pub type Result<T> = std::result::Result<T, LifelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_connect_error_wraps_foreign_variants() {
        let err = LifelineError::Transport("reset by peer".to_string()).into_connect_error();
        assert_eq!(
            err,
            LifelineError::Connect("Transport error: reset by peer".to_string())
        );
    }

    #[test]
    fn test_into_connect_error_keeps_connect_and_reuse() {
        let err = LifelineError::Connect("refused".to_string());
        assert_eq!(err.clone().into_connect_error(), err);
        assert_eq!(
            LifelineError::InvalidReuse.into_connect_error(),
            LifelineError::InvalidReuse
        );
    }
}
