//! Background sweep tasks.
//!
//! Two independent tokio tasks cooperate with the engine only through
//! its public API: the hibernation sweep drains candidate batches, the
//! cleanup sweep purges stale bookkeeping. Both stop on shutdown.

use crate::engine::VirtEngine;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Floor for sweep periods.
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

/// Handle to the running sweep tasks.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal both sweeps to stop and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("sweep tasks stopped");
    }
}

/// Spawn the hibernation and cleanup sweep tasks for `engine`.
pub(crate) fn spawn_sweepers(engine: VirtEngine) -> SweeperHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let hibernate_task = {
        let engine = engine.clone();
        let mut shutdown = shutdown_rx.clone();
        // tokio intervals reject a zero period
        let period = engine.config().hibernation_delay.max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            debug!(?period, "hibernation sweep started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.run_hibernation_sweep().await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("hibernation sweep stopped");
        })
    };

    let cleanup_task = {
        let engine = engine.clone();
        let mut shutdown = shutdown_rx;
        let period = engine.config().cleanup_interval.max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            debug!(?period, "cleanup sweep started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.run_cleanup_sweep();
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("cleanup sweep stopped");
        })
    };

    SweeperHandle {
        shutdown: shutdown_tx,
        tasks: vec![hibernate_task, cleanup_task],
    }
}
