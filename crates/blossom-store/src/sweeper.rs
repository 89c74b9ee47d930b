//! Background retention sweeper.
//!
//! Periodically scans the object store and deletes every blob whose last
//! write is older than the retention window. The sweeper keeps no state of
//! its own; staleness is derived from file mtimes on each pass.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::store::ObjectStore;

/// Outcome of a single sweep pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct SweepStats {
    /// Blobs examined
    pub scanned: usize,
    /// Stale blobs deleted
    pub removed: usize,
    /// Deletions that failed (logged, not retried until the next pass)
    pub failed: usize,
}

/// Deletes blobs older than the configured retention window.
pub struct Sweeper {
    store: Arc<ObjectStore>,
    config: StorageConfig,
}

impl Sweeper {
    /// Create a sweeper over `store` with the retention policy in `config`.
    pub fn new(store: Arc<ObjectStore>, config: StorageConfig) -> Self {
        Self { store, config }
    }

    /// Run one sweep pass against the current wall clock.
    pub async fn sweep_once(&self) -> SweepStats {
        self.sweep_once_at(SystemTime::now()).await
    }

    /// Run one sweep pass as if the clock read `now`. Tests use this to
    /// exercise retention without waiting on a real clock.
    pub async fn sweep_once_at(&self, now: SystemTime) -> SweepStats {
        let window = self.config.retention_window();
        let mut stats = SweepStats::default();

        let snapshot = match self.store.stat_all().await {
            Ok(s) => s,
            Err(e) => {
                warn!("Sweep aborted, could not list store: {}", e);
                return stats;
            }
        };

        for stat in snapshot {
            stats.scanned += 1;

            // An mtime in the future (clock skew) is never stale.
            let age = match now.duration_since(stat.mtime) {
                Ok(age) => age,
                Err(_) => continue,
            };
            if age <= window {
                continue;
            }

            match self.store.delete(&stat.digest).await {
                Ok(true) => {
                    debug!("Swept stale blob {} (age {}s)", stat.digest, age.as_secs());
                    stats.removed += 1;
                }
                // Already gone, deleted by a concurrent actor.
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to sweep blob {}: {}", stat.digest, e);
                    stats.failed += 1;
                }
            }
        }

        if stats.removed > 0 || stats.failed > 0 {
            info!(
                "Sweep complete: {} scanned, {} removed, {} failed",
                stats.scanned, stats.removed, stats.failed
            );
        }

        stats
    }

    /// Spawn the sweep loop: one pass immediately, then one per interval
    /// until `token` is cancelled.
    ///
    /// Passes run strictly one at a time on this task; a pass that overruns
    /// the interval skips the missed ticks instead of bursting.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately: that is the startup pass.
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Sweeper stopped");
                        return;
                    }
                    _ = interval.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
        })
    }
}
