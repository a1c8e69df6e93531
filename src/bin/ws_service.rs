//! Lifeline WebSocket service
//!
//! Keeps one WebSocket session to the configured endpoint alive until Ctrl+C,
//! logging every connection event.
//!
//! Usage:
//!   cargo run --bin ws_service [config-path]
//!
//! The config path defaults to `$LIFELINE_CONFIG_PATH`, then `config/lifeline.yaml`.
//! `RUST_LOG` overrides the configured log level.

use anyhow::{Context, Result};
use lifeline_service::bin_common::{
    init_tracing, load_config_from_env, parse_args, BinaryRunner, ConfigType, RunConfig,
    ShutdownManager,
};
use lifeline_service::lifeline::{
    ConnectionEvent, ConnectionManager, ManagerConfig, TungsteniteFactory,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

struct WsService {
    manager: ConnectionManager,
    shutdown: ShutdownManager,
    run_config: RunConfig,
    received: Arc<AtomicU64>,
}

impl WsService {
    fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            shutdown: ShutdownManager::new(),
            run_config: RunConfig::new("Lifeline WebSocket service").with_status_interval(60),
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Log every event on a dedicated thread. If the event stream ends the
    /// manager is gone, so the service stops too.
    fn spawn_event_logger(&self) {
        let events = self.manager.subscribe();
        let received = Arc::clone(&self.received);
        let shutdown = self.shutdown.clone();

        std::thread::spawn(move || {
            while let Ok(event) = events.recv() {
                match event {
                    ConnectionEvent::Opened => info!("[event] opened"),
                    ConnectionEvent::Message(msg) => {
                        received.fetch_add(1, Ordering::Relaxed);
                        match msg.as_text() {
                            Some(text) => info!("[event] message: {}", text),
                            None => info!("[event] binary message ({} bytes)", msg.len()),
                        }
                    }
                    ConnectionEvent::Closed { code, reason } => {
                        warn!("[event] closed: {} {}", code, reason)
                    }
                    ConnectionEvent::Error(err) => warn!("[event] error: {}", err),
                }
            }
            shutdown.trigger("connection event stream ended");
        });
    }
}

impl BinaryRunner for WsService {
    async fn run(&mut self) -> Result<()> {
        self.shutdown.spawn_signal_handler();
        self.spawn_event_logger();

        self.manager.start_heartbeat();
        if let Err(e) = self.manager.connect().await {
            warn!("Initial connect failed: {} (heartbeat will retry)", e);
        }

        let mut status = tokio::time::interval(Duration::from_secs(
            self.run_config.status_interval_secs,
        ));
        // First tick is immediate
        status.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.wait() => break,
                _ = status.tick() => {
                    let snapshot = self.manager.snapshot();
                    info!(
                        "Status: {} (generation {:?}, reconnect attempts {}, drops in a row {}, messages {})",
                        snapshot.state,
                        snapshot.generation,
                        snapshot.reconnect_attempts,
                        snapshot.consecutive_drops,
                        self.received.load(Ordering::Relaxed)
                    );
                }
            }
        }

        self.manager.close();
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        Some(format!(
            "Messages received: {}",
            self.received.load(Ordering::Relaxed)
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv::dotenv().ok();

    let config_type = match parse_args().into_iter().next() {
        Some(path) => ConfigType::Custom(path),
        None => ConfigType::Service,
    };
    let config_path = load_config_from_env(config_type);
    let config = ManagerConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_tracing(&config.log_level);
    config.log();

    let manager = ConnectionManager::builder()
        .config(config)
        .transport(TungsteniteFactory)
        .build()?;

    let mut service = WsService::new(manager);
    service.execute().await
}
