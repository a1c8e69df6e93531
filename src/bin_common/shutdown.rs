//! Graceful shutdown management
//!
//! One watch channel carries the "stop" flag. Signals, the service itself, or a
//! background thread can raise it; async code awaits it with [`ShutdownManager::wait`].

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Shared stop flag for a long-running process. Clones observe the same flag.
#[derive(Clone)]
pub struct ShutdownManager {
    stop: Arc<watch::Sender<bool>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop: Arc::new(stop),
        }
    }

    /// Spawn a handler that triggers shutdown on Ctrl+C (and SIGTERM on unix)
    pub fn spawn_signal_handler(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if wait_for_signal().await {
                this.trigger("received shutdown signal");
            }
        });
    }

    /// Check if the process should continue running
    pub fn is_running(&self) -> bool {
        !*self.stop.borrow()
    }

    /// Request shutdown. Safe to call from any thread, repeatedly.
    pub fn trigger(&self, reason: &str) {
        if self.stop.send_replace(true) {
            return;
        }
        info!("");
        info!("Shutting down gracefully: {}", reason);
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        let mut rx = self.stop.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let Ok(mut terminate) = unix_signal(SignalKind::terminate()) else {
        return signal::ctrl_c().await.is_ok();
    };
    tokio::select! {
        result = signal::ctrl_c() => result.is_ok(),
        _ = terminate.recv() => true,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    signal::ctrl_c().await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_from_another_thread_wakes_waiters() {
        let shutdown = ShutdownManager::new();
        assert!(shutdown.is_running());

        let remote = shutdown.clone();
        std::thread::spawn(move || remote.trigger("event stream ended"));

        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("wait() did not resolve");
        assert!(!shutdown.is_running());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let shutdown = ShutdownManager::new();
        shutdown.trigger("test");
        shutdown.trigger("again");

        tokio::time::timeout(Duration::from_millis(100), shutdown.wait())
            .await
            .expect("already stopped");
    }
}
