//! Heartbeat timer for the managed connection
//!
//! # Architecture
//!
//! The heartbeat is a dedicated Tokio task that runs independently of any
//! particular transport instance:
//!
//! ```text
//! ┌─────────────────────┐
//! │  Heartbeat Task     │
//! │  (Tokio spawn)      │
//! │                     │
//! │  Every X interval:  │
//! │  1. Wait for tick   │
//! │  2. Run the check ──┼──> ConnectionManager (under its gate)
//! │  3. Repeat          │        no instance -> create + connect
//! └─────────────────────┘        Closed      -> one reconnect attempt
//!                                otherwise   -> nothing
//! ```
//!
//! The task is started once and survives reconnects. It stops when cancelled
//! (explicit close), when the check reports the manager is gone, or when its
//! shutdown channel disconnects.

use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Heartbeat loop
///
/// The check closure returns `false` once there is nothing left to monitor,
/// which ends the task.
///
/// The task will:
/// 1. Wait for the first interval (skips immediate first tick)
/// 2. On each tick, run the check
/// 3. Continue until shutdown signal received or the check asks to stop
pub async fn heartbeat_task<F>(interval: Duration, mut check: F, shutdown_rx: Receiver<()>)
where
    F: FnMut() -> bool + Send + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick - wait for the first interval
    ticker.tick().await;
    // A slow check must not cause a burst of catch-up ticks
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("Heartbeat task started with interval: {:?}", interval);

    loop {
        ticker.tick().await;

        match shutdown_rx.try_recv() {
            Ok(()) => {
                debug!("Heartbeat task received shutdown signal");
                break;
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                debug!("Heartbeat shutdown channel disconnected");
                break;
            }
            Err(crossbeam_channel::TryRecvError::Empty) => {}
        }

        debug!("Heartbeat tick - checking connection");
        if !check() {
            debug!("Nothing left to monitor, shutting down heartbeat task");
            break;
        }
    }

    debug!("Heartbeat task exiting");
}

/// Handle to a running heartbeat task
pub struct HeartbeatHandle {
    handle: JoinHandle<()>,
    shutdown_tx: Sender<()>,
    interval: Duration,
}

impl HeartbeatHandle {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task. No tick runs after this returns unless one was already executing.
    pub fn cancel(self) {
        let _ = self.shutdown_tx.try_send(());
        self.handle.abort();
        debug!("Heartbeat cancelled");
    }
}

/// Spawn a heartbeat task on `runtime`
pub fn spawn_heartbeat<F>(runtime: &Handle, interval: Duration, check: F) -> HeartbeatHandle
where
    F: FnMut() -> bool + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

    let handle = runtime.spawn(async move {
        heartbeat_task(interval, check, shutdown_rx).await;
    });

    HeartbeatHandle {
        handle,
        shutdown_tx,
        interval,
    }
}
