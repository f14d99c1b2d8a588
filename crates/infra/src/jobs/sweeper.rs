//! Background eviction of old job records.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::registry::JobRegistry;

/// Shortest tick the loop will run at; a zero period would panic in `interval`.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Sweep configuration.
#[derive(Debug, Clone)]
pub struct Sweeper {
    /// Records not updated for this long are evicted.
    pub retention: Duration,
    /// How often to sweep.
    pub interval: Duration,
}

impl Default for Sweeper {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(24 * 60 * 60),
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Handle to stop a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop sweeping and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.join.await {
            warn!(error = %e, "job sweeper did not stop cleanly");
        }
    }
}

impl Sweeper {
    pub fn new(retention: Duration, interval: Duration) -> Self {
        Self { retention, interval }
    }

    /// Spawn the sweep loop on the current tokio runtime. The first sweep runs immediately.
    pub fn spawn<R: JobRegistry + 'static>(&self, registry: R) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let retention = self.retention;
        let mut ticker = tokio::time::interval(self.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let join = tokio::spawn(async move {
            info!(retention_secs = retention.as_secs(), "job sweeper started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let evicted = registry.sweep(retention);
                        if evicted > 0 {
                            info!(evicted, "swept expired jobs");
                        }
                    }
                }
            }
            info!("job sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}
