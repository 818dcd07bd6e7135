//! Periodic scan loops: hourly deep discovery, per-minute fast sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::feed::CursorWalker;
use crate::store::{CursorStore, LiveStateStore};
use crate::sync::LiveSyncOrchestrator;

/// Drives the two scan loops until cancelled.
///
/// Deep scans are exclusive with each other; fast cycles guard themselves
/// against overlap inside the orchestrator. An empty discovery result keeps
/// the previous cursor list so a transient feed outage does not blind the
/// fast scan.
pub struct ScanScheduler {
    walker: CursorWalker,
    cursors: Arc<dyn CursorStore>,
    live_state: Arc<dyn LiveStateStore>,
    orchestrator: Arc<LiveSyncOrchestrator>,
    deep_scan_interval: Duration,
    fast_scan_interval: Duration,
    deep_lock: tokio::sync::Mutex<()>,
}

impl ScanScheduler {
    pub fn new(
        walker: CursorWalker,
        cursors: Arc<dyn CursorStore>,
        live_state: Arc<dyn LiveStateStore>,
        orchestrator: Arc<LiveSyncOrchestrator>,
        config: &AppConfig,
    ) -> Self {
        Self {
            walker,
            cursors,
            live_state,
            orchestrator,
            deep_scan_interval: config.deep_scan_interval,
            fast_scan_interval: config.fast_scan_interval,
            deep_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run both loops until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        tokio::join!(self.deep_loop(&cancel), self.fast_loop(&cancel));
        tracing::info!("scan scheduler stopped");
    }

    async fn deep_loop(&self, cancel: &CancellationToken) {
        let mut ticker = tokio::time::interval(self.deep_scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.run_deep_scan(cancel).await,
            }
        }
    }

    async fn fast_loop(&self, cancel: &CancellationToken) {
        let mut ticker = tokio::time::interval(self.fast_scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.orchestrator.run_cycle().await {
                        tracing::error!(error = %e, "sync cycle failed");
                    }
                }
            }
        }
    }

    async fn run_deep_scan(&self, cancel: &CancellationToken) {
        let _guard = self.deep_lock.lock().await;
        tracing::info!("starting deep discovery scan");

        match self.walker.discover(cancel).await {
            Ok(entries) if entries.is_empty() => {
                tracing::warn!("discovery found no relevant pages, keeping previous cursors");
            }
            Ok(entries) => {
                let count = entries.len();
                let staged = async {
                    self.cursors.stage_entries(&entries).await?;
                    self.cursors.promote_staged().await
                };
                match staged.await {
                    Ok(()) => tracing::info!(entries = count, "entry cursors refreshed"),
                    Err(e) => tracing::error!(error = %e, "failed to persist entry cursors"),
                }
            }
            Err(e) => tracing::error!(error = %e, "discovery walk failed"),
        }

        match self.live_state.prune_expired().await {
            Ok(0) => {}
            Ok(pruned) => tracing::debug!(pruned, "expired snapshots pruned"),
            Err(e) => tracing::warn!(error = %e, "snapshot pruning failed"),
        }
    }
}
