//! Periodic hygiene for the source-state table.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::core::KnockGateService;

impl KnockGateService {
    /// Run one garbage-collection pass.
    ///
    /// Evicts sources idle past the grace period that hold no live
    /// grant, plus their per-address locks. Returns the number of
    /// evicted sources.
    pub fn gc(&self) -> usize {
        let evicted = self.tracker().gc(self.now(), self.idle_grace_ms());
        self.evict_idle_locks();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle knock sources");
        }
        evicted
    }

    /// Periodic gc loop; exits when the shutdown signal flips.
    pub async fn run_maintenance(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately; skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.gc();
                }
                changed = shutdown_rx.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
