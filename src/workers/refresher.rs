use std::sync::Weak;
use std::time::Duration;

use tokio::time;
use tracing::{error, info, warn};

use crate::feed::aggregator::{CycleKind, FeedInner};

/// Worker that periodically refreshes the contest feed
pub struct RefreshWorker {
    feed: Weak<FeedInner>,
    refresh_interval: Duration,
}

impl RefreshWorker {
    /// Create a new refresh worker
    pub(crate) fn new(feed: Weak<FeedInner>, refresh_interval: Duration) -> Self {
        Self {
            feed,
            refresh_interval,
        }
    }

    /// Run the worker loop until the feed goes away or the task is aborted
    pub async fn run(self) {
        info!(
            "Contest refresher started (interval: {:?})",
            self.refresh_interval
        );

        // Run initial fetch immediately
        if !self.refresh().await {
            return;
        }

        if self.refresh_interval.is_zero() {
            warn!("Refresh interval is zero, background refresh disabled");
            return;
        }

        // Then refresh on interval
        let mut interval = time::interval(self.refresh_interval);
        interval.tick().await; // Skip first tick (already ran)

        loop {
            interval.tick().await;
            if !self.refresh().await {
                break;
            }
        }
    }

    /// Run one background cycle. Returns false once the feed is gone.
    async fn refresh(&self) -> bool {
        let Some(feed) = self.feed.upgrade() else {
            info!("Contest feed dropped, refresher exiting");
            return false;
        };

        feed.begin_cycle(CycleKind::Background);
        let cycle = feed.spawn_cycle(CycleKind::Background);
        drop(feed);

        // Aborting this worker only detaches the cycle, it still completes.
        if let Err(e) = cycle.await {
            error!("Background refresh failed: {}", e);
        }

        true
    }
}
