//! Interval scheduler for monitor cycles

use crate::monitor::DefaultMonitor;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Runs [`DefaultMonitor::run_cycle`] on a fixed interval until shut down
#[derive(Debug, Clone)]
pub struct MonitorScheduler {
    monitor: Arc<DefaultMonitor>,
    interval: Duration,
}

impl MonitorScheduler {
    /// Create new scheduler
    pub fn new(monitor: Arc<DefaultMonitor>, interval: Duration) -> Self {
        Self { monitor, interval }
    }

    /// Verify the oracle, then cycle until `shutdown` turns true or its sender drops.
    ///
    /// The first cycle runs immediately. A slow cycle delays the next tick
    /// instead of bunching missed ticks. Returns the number of cycles run.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<u64> {
        self.monitor.verify_oracle_authority().await?;

        info!(
            oracle = %self.monitor.oracle().short(),
            interval_secs = self.interval.as_secs(),
            "Starting default monitor scheduler"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    self.monitor.run_cycle().await;
                    cycles += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cycles, "Default monitor scheduler stopped");
        Ok(cycles)
    }
}
