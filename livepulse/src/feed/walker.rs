//! Cursor discovery over a mutating paginated feed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::feed::{FeedPage, ListingClient};

/// Upper bound on catch-up retries against a single ancestor page.
const MAX_CATCHUP_RETRIES: u32 = 30;

struct PathNode {
    cursor: String,
    parent: Option<usize>,
}

/// Walks the listing feed from the first page, following `next` cursors and
/// recording each visited page's entry cursor until the frontier turns
/// irrelevant (first item below the viewer threshold, or no items).
///
/// The feed reorders while we walk it, so cursors go stale: a fetch can fail
/// outright, or a page's `next` can point at a cursor already consumed. Both
/// cases backtrack to the nearest live ancestor and re-fetch it until it
/// hands out a fresh cursor.
pub struct CursorWalker {
    client: Arc<dyn ListingClient>,
    viewer_threshold: i64,
    retry_interval: Duration,
}

impl CursorWalker {
    pub fn new(
        client: Arc<dyn ListingClient>,
        viewer_threshold: i64,
        retry_interval: Duration,
    ) -> Self {
        Self {
            client,
            viewer_threshold,
            retry_interval,
        }
    }

    /// Run one full discovery walk. Returns the ordered entry cursors, one
    /// per relevant page, with the empty string standing for the first page.
    ///
    /// Cancellation and unrecoverable branches end the walk early with the
    /// entries collected so far.
    pub async fn discover(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let mut path = vec![PathNode {
            cursor: String::new(),
            parent: None,
        }];
        let mut visited: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut entries: Vec<String> = Vec::new();
        let mut current = 0usize;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let cursor = path[current].cursor.clone();
            visited.insert(cursor.clone());

            let page = match self.fetch(&cursor).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        cursor = display_cursor(&cursor),
                        error = %e,
                        "page fetch failed, backtracking"
                    );
                    failed.insert(cursor.clone());
                    let parent = path[current].parent;
                    match self
                        .recover(&mut path, parent, cursor, &visited, &mut failed, cancel)
                        .await?
                    {
                        Some(idx) => {
                            current = idx;
                            continue;
                        }
                        None => break,
                    }
                }
            };

            if !self.is_relevant(&page) {
                break;
            }
            entries.push(cursor);

            let Some(next) = page.next else {
                break;
            };
            if visited.contains(&next) || failed.contains(&next) {
                tracing::debug!(
                    cursor = display_cursor(&next),
                    "next cursor already consumed, waiting for branch to move"
                );
                match self
                    .recover(&mut path, Some(current), next, &visited, &mut failed, cancel)
                    .await?
                {
                    Some(idx) => {
                        current = idx;
                        continue;
                    }
                    None => break,
                }
            } else {
                path.push(PathNode {
                    cursor: next,
                    parent: Some(current),
                });
                current = path.len() - 1;
            }
        }

        tracing::info!(entries = entries.len(), "discovery walk finished");
        Ok(entries)
    }

    /// Backtrack from a dead cursor: re-fetch the given ancestor until its
    /// `next` stops pointing at the dead branch, climbing further up when an
    /// ancestor itself fails. Returns the index of the freshly pushed node,
    /// or None when the walk cannot continue.
    async fn recover(
        &self,
        path: &mut Vec<PathNode>,
        mut node: Option<usize>,
        mut dead: String,
        visited: &HashSet<String>,
        failed: &mut HashSet<String>,
        cancel: &CancellationToken,
    ) -> Result<Option<usize>> {
        while let Some(idx) = node {
            let cursor = path[idx].cursor.clone();
            let mut attempts = 0u32;

            loop {
                if cancel.is_cancelled() {
                    return Ok(None);
                }

                let page = match self.fetch(&cursor).await {
                    Ok(page) => page,
                    Err(e) => {
                        tracing::warn!(
                            cursor = display_cursor(&cursor),
                            error = %e,
                            "ancestor fetch failed, climbing up"
                        );
                        failed.insert(cursor.clone());
                        dead = cursor;
                        node = path[idx].parent;
                        break;
                    }
                };

                // The frontier can shrink past this ancestor while we wait.
                if !self.is_relevant(&page) {
                    return Ok(None);
                }
                let Some(next) = page.next else {
                    return Ok(None);
                };

                if next != dead && !visited.contains(&next) && !failed.contains(&next) {
                    path.push(PathNode {
                        cursor: next,
                        parent: Some(idx),
                    });
                    return Ok(Some(path.len() - 1));
                }

                attempts += 1;
                if attempts >= MAX_CATCHUP_RETRIES {
                    tracing::warn!(
                        cursor = display_cursor(&cursor),
                        attempts,
                        "branch did not move, giving up on this walk"
                    );
                    return Ok(None);
                }

                tokio::select! {
                    _ = cancel.cancelled() => return Ok(None),
                    _ = tokio::time::sleep(self.retry_interval) => {}
                }
            }
        }

        Ok(None)
    }

    async fn fetch(&self, cursor: &str) -> Result<FeedPage> {
        let cursor = (!cursor.is_empty()).then_some(cursor);
        self.client.fetch_page(cursor).await
    }

    fn is_relevant(&self, page: &FeedPage) -> bool {
        page.items
            .first()
            .is_some_and(|item| item.concurrent_user_count >= self.viewer_threshold)
    }
}

fn display_cursor(cursor: &str) -> &str {
    if cursor.is_empty() { "<first>" } else { cursor }
}
