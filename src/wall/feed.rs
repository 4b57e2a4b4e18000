use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{Post, RowStore};

/// Last fetched copy of the wall, newest first.
///
/// Every refresh replaces the snapshot wholesale. A failed fetch keeps the previous
/// snapshot. Refreshes are not coordinated, so whichever response lands last wins.
#[derive(Clone)]
pub struct FeedSynchronizer {
    rows: Arc<dyn RowStore>,
    snapshot: Arc<RwLock<Vec<Post>>>,
}

impl FeedSynchronizer {
    pub fn new(rows: Arc<dyn RowStore>) -> Self {
        Self {
            rows,
            snapshot: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn snapshot(&self) -> Vec<Post> {
        self.snapshot.read().await.clone()
    }

    /// Fetches all posts and swaps them in. Returns whether the snapshot was replaced.
    pub async fn refresh(&self) -> bool {
        match self.rows.list_posts().await {
            Ok(mut posts) => {
                posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                debug!(count = posts.len(), "feed refreshed");
                *self.snapshot.write().await = posts;
                true
            }
            Err(e) => {
                warn!(error = %e, "feed refresh failed; keeping previous snapshot");
                false
            }
        }
    }

    /// Refreshes now and then every `every` until the handle is stopped or dropped.
    /// A zero period starts no task; the returned handle is idle.
    pub fn spawn(&self, every: Duration) -> FeedHandle {
        let token = CancellationToken::new();
        if every.is_zero() {
            warn!("feed poll interval is zero; polling disabled");
            return FeedHandle { token, task: None };
        }
        let feed = self.clone();
        let stop = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    // a refresh that has started runs to completion
                    _ = ticker.tick() => {
                        feed.refresh().await;
                    }
                }
            }
            debug!("feed polling stopped");
        });

        FeedHandle {
            token,
            task: Some(task),
        }
    }
}

/// Owner of the polling task. Dropping it stops polling too.
pub struct FeedHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// Stops polling and waits for an in-flight refresh to land.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "feed poller ended abnormally");
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
