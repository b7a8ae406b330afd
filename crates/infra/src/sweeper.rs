//! Recurring background sweep of expired cart reservations.
//!
//! The 15-minute window is soft: a request arriving after expiry but before
//! the sweep observes stale-but-optimistic state. The sweep bounds that
//! window by running every few seconds to minutes; overlapping sweeps are
//! safe because the per-line hold CAS picks exactly one releaser.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::reservation::ReservationService;

pub const MIN_SWEEP_INTERVAL_SECS: u64 = 1;
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Periodic task that releases reservations whose window has lapsed.
#[derive(Debug, Clone, Copy)]
pub struct ReservationSweeper {
    interval: Duration,
}

impl ReservationSweeper {
    /// Create a sweeper, clamping the interval into the supported bounds.
    pub fn new(interval_secs: u64) -> Self {
        let secs = interval_secs.clamp(MIN_SWEEP_INTERVAL_SECS, MAX_SWEEP_INTERVAL_SECS);
        Self {
            interval: Duration::from_secs(secs),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the recurring sweep on the current tokio runtime.
    pub fn spawn(self, service: Arc<ReservationService>) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let interval = self.interval;

        let join = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "reservation sweeper started");
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; consume it so the sweep
            // cadence starts one full interval after boot.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match service.sweep_expired(Utc::now()).await {
                            Ok(0) => {}
                            Ok(released) => {
                                info!(released, "sweep released expired reservations");
                            }
                            Err(err) => warn!(error = %err, "reservation sweep failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            info!("reservation sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

impl Default for ReservationSweeper {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_INTERVAL_SECS)
    }
}

/// Handle to control a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Request graceful shutdown and wait for the task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(()).await;
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        // Backstop for handles dropped without an explicit shutdown.
        if let Some(join) = &self.join {
            join.abort();
        }
    }
}
