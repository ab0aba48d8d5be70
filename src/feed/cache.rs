use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::FetchError;
use crate::models::{Contest, FeedSnapshot};

/// Results and in-flight bookkeeping of one provider
#[derive(Debug, Default)]
pub(crate) struct ProviderSlot {
    pub contests: Vec<Contest>,
    /// Requests still outstanding for this provider
    pub pending: usize,
    /// Whether any request of this provider has completed
    pub settled: bool,
}

/// Shared feed state. Only fetch cycles write it, always through the watch
/// channel, and the merged list is replaced wholesale.
#[derive(Debug, Default)]
pub(crate) struct FeedCache {
    pub slots: Vec<ProviderSlot>,
    pub merged: Arc<Vec<Contest>>,
    /// Manual refresh cycles in progress
    pub manual_cycles: usize,
    pub error: Option<Arc<FetchError>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub refreshed_at: Option<Instant>,
}

impl FeedCache {
    pub fn new(provider_count: usize) -> Self {
        Self {
            slots: (0..provider_count).map(|_| ProviderSlot::default()).collect(),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            contests: Arc::clone(&self.merged),
            is_loading: self.is_loading(),
            is_refetching: self.manual_cycles > 0,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
        }
    }

    /// A first request is outstanding and nothing has been merged yet
    fn is_loading(&self) -> bool {
        self.merged.is_empty() && self.slots.iter().any(|s| s.pending > 0 && !s.settled)
    }

    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(|s| s.pending == 0)
    }

    pub fn is_stale(&self, stale_after: Duration, now: Instant) -> bool {
        match self.refreshed_at {
            Some(at) => now.saturating_duration_since(at) >= stale_after,
            None => true,
        }
    }

    /// Rebuild the merged list: provider order, then a stable sort by start
    pub fn remerge(&mut self) {
        let mut merged: Vec<Contest> = self
            .slots
            .iter()
            .flat_map(|slot| slot.contests.iter().cloned())
            .collect();
        merged.sort_by_key(|c| c.start_time);
        self.merged = Arc::new(merged);
    }
}
