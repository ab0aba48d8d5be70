use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api::{
    build_client, ClistClient, CodeChefClient, CodeforcesClient, ContestProvider, FailurePolicy,
    LeetCodeClient,
};
use crate::config::{Config, FeedSource};
use crate::error::FetchError;
use crate::feed::cache::FeedCache;
use crate::models::{Contest, FeedSnapshot};
use crate::workers::RefreshWorker;

/// Timing policy of the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    /// Age after which cached data is refreshed on read
    pub stale_after: Duration,
    /// Interval of the background refresh
    pub refresh_interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(10 * 60),
            refresh_interval: Duration::from_secs(30 * 60),
        }
    }
}

impl FeedSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stale_after: config.stale_after(),
            refresh_interval: config.refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleKind {
    Background,
    Manual,
}

/// Build the provider set selected by the configuration
pub fn providers_from_config(config: &Config) -> Vec<Box<dyn ContestProvider>> {
    let client = build_client(config.request_timeout());

    match config.feed_source {
        FeedSource::Providers => vec![
            Box::new(CodeforcesClient::new(
                client.clone(),
                &config.codeforces_api_url,
            )),
            Box::new(
                LeetCodeClient::new(client.clone(), &config.leetcode_graphql_url)
                    .with_relay(config.leetcode_relay_url.clone()),
            ),
            Box::new(
                CodeChefClient::new(client, &config.codechef_api_url)
                    .with_relay(config.codechef_relay_url.clone()),
            ),
        ],
        FeedSource::Clist => vec![Box::new(ClistClient::new(
            client,
            &config.clist_api_url,
            config.clist_credentials.clone(),
            config.clist_resource_ids.clone(),
            config.clist_limit,
        ))],
    }
}

/// Aggregated, cache-backed feed of upcoming contests.
///
/// Cheap to clone; clones share the same cache and refresh worker.
#[derive(Clone)]
pub struct ContestFeed {
    inner: Arc<FeedInner>,
}

pub(crate) struct FeedInner {
    providers: Vec<Box<dyn ContestProvider>>,
    settings: FeedSettings,
    state: watch::Sender<FeedCache>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    worker: Option<JoinHandle<()>>,
    subscribers: usize,
}

/// Live view of the feed. The first subscription starts the background
/// refresh and dropping the last one stops it.
pub struct FeedSubscription {
    feed: ContestFeed,
    receiver: watch::Receiver<FeedCache>,
}

impl ContestFeed {
    /// Create a feed over the given providers
    pub fn new(providers: Vec<Box<dyn ContestProvider>>, settings: FeedSettings) -> Self {
        let (state, _) = watch::channel(FeedCache::new(providers.len()));

        Self {
            inner: Arc::new(FeedInner {
                providers,
                settings,
                state,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Create a feed from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(providers_from_config(config), FeedSettings::from_config(config))
    }

    pub fn settings(&self) -> FeedSettings {
        self.inner.settings
    }

    /// Current state without triggering any fetch
    pub fn snapshot(&self) -> FeedSnapshot {
        self.inner.state.borrow().snapshot()
    }

    /// Current state. Stale or missing data starts a background refresh
    /// while the cached contests are returned right away.
    pub fn read(&self) -> FeedSnapshot {
        if Handle::try_current().is_ok() && self.inner.begin_if_stale() {
            debug!("Cached contests are stale, refreshing in background");
            self.inner.spawn_cycle(CycleKind::Background);
        }

        self.snapshot()
    }

    /// Refetch every provider now and wait for the new result.
    ///
    /// Dropping the returned future does not cancel the refresh.
    pub async fn refetch(&self) -> FeedSnapshot {
        info!("Manual refresh requested");

        self.inner.begin_cycle(CycleKind::Manual);
        if let Err(e) = self.inner.spawn_cycle(CycleKind::Manual).await {
            error!("Refresh task failed: {}", e);
        }

        self.snapshot()
    }

    /// Start the background refresh worker. Does nothing if already running.
    pub fn start(&self) {
        let mut lifecycle = self.inner.lock_lifecycle();
        self.start_locked(&mut lifecycle);
    }

    /// Stop the background refresh worker. Requests already in flight finish.
    pub fn stop(&self) {
        let mut lifecycle = self.inner.lock_lifecycle();
        Self::stop_locked(&mut lifecycle);
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock_lifecycle()
            .worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Subscribe to feed updates
    pub fn subscribe(&self) -> FeedSubscription {
        let mut lifecycle = self.inner.lock_lifecycle();
        lifecycle.subscribers += 1;
        if lifecycle.subscribers == 1 {
            self.start_locked(&mut lifecycle);
        }

        FeedSubscription {
            feed: self.clone(),
            receiver: self.inner.state.subscribe(),
        }
    }

    fn unsubscribe(&self) {
        let mut lifecycle = self.inner.lock_lifecycle();
        lifecycle.subscribers = lifecycle.subscribers.saturating_sub(1);
        if lifecycle.subscribers == 0 {
            Self::stop_locked(&mut lifecycle);
        }
    }

    fn start_locked(&self, lifecycle: &mut Lifecycle) {
        if lifecycle
            .worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
        {
            return;
        }

        if Handle::try_current().is_err() {
            warn!("No async runtime available, contest feed not started");
            return;
        }

        let worker = RefreshWorker::new(
            Arc::downgrade(&self.inner),
            self.inner.settings.refresh_interval,
        );
        lifecycle.worker = Some(tokio::spawn(worker.run()));

        info!(
            "Contest feed started with {} providers",
            self.inner.providers.len()
        );
    }

    fn stop_locked(lifecycle: &mut Lifecycle) {
        if let Some(worker) = lifecycle.worker.take() {
            worker.abort();
            info!("Contest feed stopped");
        }
    }
}

impl FeedInner {
    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark every provider as having a request outstanding
    pub(crate) fn begin_cycle(&self, kind: CycleKind) {
        self.state.send_modify(|cache| {
            for slot in &mut cache.slots {
                slot.pending += 1;
            }
            if kind == CycleKind::Manual {
                cache.manual_cycles += 1;
            }
        });
    }

    /// Begin a background cycle if the data is stale and nothing is in flight
    fn begin_if_stale(&self) -> bool {
        let stale_after = self.settings.stale_after;

        self.state.send_if_modified(|cache| {
            if !cache.is_idle() || !cache.is_stale(stale_after, Instant::now()) {
                return false;
            }
            for slot in &mut cache.slots {
                slot.pending += 1;
            }
            true
        })
    }

    /// Run a begun cycle on its own task so that callers going away does not
    /// leave providers marked as pending
    pub(crate) fn spawn_cycle(self: &Arc<Self>, kind: CycleKind) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.run_cycle(kind).await })
    }

    /// Fetch all providers concurrently and publish the merged result
    async fn run_cycle(&self, kind: CycleKind) {
        let started = Instant::now();

        let mut fetches: FuturesUnordered<_> = self
            .providers
            .iter()
            .enumerate()
            .map(|(index, provider)| async move {
                // A panicking provider counts as a failed fetch.
                let result = AssertUnwindSafe(provider.fetch_contests())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(FetchError::Panicked {
                            provider: provider.name(),
                        })
                    });
                (index, result)
            })
            .collect();

        let mut staged: Vec<Vec<Contest>> = vec![Vec::new(); self.providers.len()];
        let mut cycle_error: Option<Arc<FetchError>> = None;

        while let Some((index, result)) = fetches.next().await {
            let provider = &self.providers[index];

            let contests = match result {
                Ok(contests) => {
                    debug!("{} returned {} contests", provider.name(), contests.len());
                    contests
                }
                Err(e) => match provider.failure_policy() {
                    FailurePolicy::Isolate => {
                        warn!("{} fetch failed, continuing without it: {}", provider.name(), e);
                        Vec::new()
                    }
                    FailurePolicy::Propagate => {
                        error!("{} fetch failed: {}", provider.name(), e);
                        cycle_error = Some(Arc::new(e));
                        Vec::new()
                    }
                },
            };

            self.state.send_modify(|cache| {
                let slot = &mut cache.slots[index];
                slot.pending = slot.pending.saturating_sub(1);
                slot.settled = true;

                // Nothing shown yet: publish as results arrive.
                if cache.merged.is_empty() && !contests.is_empty() {
                    cache.slots[index].contests = contests.clone();
                    cache.remerge();
                }
            });

            staged[index] = contests;
        }

        self.state.send_modify(|cache| {
            for (slot, contests) in cache.slots.iter_mut().zip(staged) {
                slot.contests = contests;
            }
            cache.remerge();
            cache.error = cycle_error;
            cache.fetched_at = Some(Utc::now());
            cache.refreshed_at = Some(Instant::now());
            if kind == CycleKind::Manual {
                cache.manual_cycles = cache.manual_cycles.saturating_sub(1);
            }

            info!(
                "Contest feed updated: {} contests from {} providers in {:?}",
                cache.merged.len(),
                cache.slots.len(),
                started.elapsed()
            );
        });
    }
}

impl FeedSubscription {
    /// Latest published state
    pub fn snapshot(&self) -> FeedSnapshot {
        self.receiver.borrow().snapshot()
    }

    /// Wait for the next published state
    pub async fn changed(&mut self) -> Option<FeedSnapshot> {
        self.receiver.changed().await.ok()?;
        let snapshot = self.receiver.borrow_and_update().snapshot();
        Some(snapshot)
    }

    /// The feed this subscription belongs to
    pub fn feed(&self) -> &ContestFeed {
        &self.feed
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.feed.unsubscribe();
    }
}
