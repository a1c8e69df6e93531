use std::time::Duration;

/// Trait for defining eager reconnection strategies
///
/// Consulted when a live connection drops (remote close or transport error).
/// Returning `None` leaves recovery to the heartbeat, which retries at most once
/// per interval.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next eager reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Reconnect attempts made since the last successful open (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long, then reconnect
    /// * `None` - Do not reconnect eagerly
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Check if we should reconnect eagerly at all for this attempt
    fn should_reconnect(&self, attempt: u32) -> bool;
}

/// Reconnect as soon as the drop is observed
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl ReconnectionStrategy for Immediate {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    fn should_reconnect(&self, _attempt: u32) -> bool {
        true
    }
}

/// Exponential backoff reconnection strategy
///
/// Delays between reconnection attempts grow exponentially:
/// initial_delay * 2^attempt, capped at max_delay
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - The initial delay before first reconnect
    /// * `max_delay` - The maximum delay between reconnects
    /// * `max_attempts` - Maximum number of eager attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        Some(Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms)))
    }

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Maximum number of eager attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Never reconnect eagerly
///
/// Dropped connections are only recovered by the heartbeat's passive detection.
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _attempt: u32) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_is_always_zero() {
        for attempt in [0, 1, 10, u32::MAX] {
            assert_eq!(Immediate.next_delay(attempt), Some(Duration::ZERO));
        }
    }

    #[test]
    fn test_exponential_backoff_does_not_overflow() {
        let strategy = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30), None);
        assert_eq!(strategy.next_delay(63), Some(Duration::from_secs(30)));
        assert_eq!(strategy.next_delay(64), Some(Duration::from_secs(30)));
        assert_eq!(strategy.next_delay(u32::MAX), Some(Duration::from_secs(30)));
    }
}
