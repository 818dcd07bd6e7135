//! Fast-cycle live sync: observe, diff, react.

pub mod handler;
pub mod snapshot;

pub use handler::TransitionHandler;
pub use snapshot::BroadcastSnapshot;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;

use crate::Result;
use crate::config::AppConfig;
use crate::feed::{ListingClient, LiveItem};
use crate::store::{CursorStore, LiveStateStore};

/// Runs one fast scan per tick: fetch one page per stored entry cursor,
/// diff the observed channel set against the known-live set, and hand each
/// transition to the handler.
///
/// Cycles never overlap: a tick arriving while the previous cycle is still
/// running is skipped. The first cycle after startup persists everything it
/// sees but does not notify, so a restart does not replay live broadcasts
/// as fresh starts.
pub struct LiveSyncOrchestrator {
    client: Arc<dyn ListingClient>,
    cursors: Arc<dyn CursorStore>,
    live_state: Arc<dyn LiveStateStore>,
    handler: Arc<TransitionHandler>,
    viewer_threshold: i64,
    handler_concurrency: usize,
    cycle_lock: tokio::sync::Mutex<()>,
    first_cycle: AtomicBool,
}

impl LiveSyncOrchestrator {
    pub fn new(
        client: Arc<dyn ListingClient>,
        cursors: Arc<dyn CursorStore>,
        live_state: Arc<dyn LiveStateStore>,
        handler: Arc<TransitionHandler>,
        config: &AppConfig,
    ) -> Self {
        Self {
            client,
            cursors,
            live_state,
            handler,
            viewer_threshold: config.viewer_threshold,
            handler_concurrency: config.handler_concurrency.max(1),
            cycle_lock: tokio::sync::Mutex::new(()),
            first_cycle: AtomicBool::new(true),
        }
    }

    pub async fn run_cycle(&self) -> Result<()> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            tracing::debug!("previous sync cycle still running, skipping tick");
            return Ok(());
        };

        let entries = self.cursors.load_entries().await?;
        if entries.is_empty() {
            tracing::info!("no entry cursors yet, skipping sync cycle");
            return Ok(());
        }

        let observed = self.observe(&entries).await;
        let previous = self.live_state.live_ids().await?;
        let current: HashSet<String> = observed.keys().cloned().collect();

        let started: Vec<&LiveItem> = observed
            .values()
            .filter(|item| !previous.contains(&item.channel_id))
            .collect();
        let continuing: Vec<&LiveItem> = observed
            .values()
            .filter(|item| previous.contains(&item.channel_id))
            .collect();
        let ended: Vec<String> = previous.difference(&current).cloned().collect();

        let suppress = self.first_cycle.load(Ordering::SeqCst);

        futures::stream::iter(&started)
            .for_each_concurrent(self.handler_concurrency, |item| async move {
                if let Err(e) = self.handler.handle_start(item, suppress).await {
                    tracing::error!(channel_id = %item.channel_id, error = %e, "start handling failed");
                }
            })
            .await;

        futures::stream::iter(&continuing)
            .for_each_concurrent(self.handler_concurrency, |item| async move {
                if let Err(e) = self.handler.handle_continuing(item, suppress).await {
                    tracing::error!(channel_id = %item.channel_id, error = %e, "continuing handling failed");
                }
            })
            .await;

        futures::stream::iter(&ended)
            .for_each_concurrent(self.handler_concurrency, |channel_id| async move {
                if let Err(e) = self.handler.handle_end(channel_id, suppress).await {
                    tracing::error!(channel_id = %channel_id, error = %e, "end handling failed");
                }
            })
            .await;

        let started_ids: Vec<String> = started
            .iter()
            .map(|item| item.channel_id.clone())
            .collect();
        self.live_state.apply_diff(&started_ids, &ended).await?;

        self.first_cycle.store(false, Ordering::SeqCst);
        tracing::info!(
            observed = observed.len(),
            started = started.len(),
            ended = ended.len(),
            continuing = continuing.len(),
            "sync cycle complete"
        );
        Ok(())
    }

    /// Fetch one page per entry cursor, in walk order. Channels seen on an
    /// earlier page win over later duplicates. The feed sorts by viewers, so
    /// each page's tail below the viewer threshold is dropped; later entry
    /// pages are still fetched since the feed may have shifted since the
    /// walk. A failed page fetch skips that branch only.
    async fn observe(&self, entries: &[String]) -> HashMap<String, LiveItem> {
        let mut observed: HashMap<String, LiveItem> = HashMap::new();
        for cursor in entries {
            let cursor = (!cursor.is_empty()).then_some(cursor.as_str());
            let page = match self.client.fetch_page(cursor).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        cursor = cursor.unwrap_or("<first>"),
                        error = %e,
                        "entry cursor fetch failed, skipping branch"
                    );
                    continue;
                }
            };
            for item in page.items {
                if item.concurrent_user_count < self.viewer_threshold {
                    break;
                }
                observed.entry(item.channel_id.clone()).or_insert(item);
            }
        }
        observed
    }
}
