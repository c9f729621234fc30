//! Player statistics cache.
//!
//! Entries are keyed by player name. A key has at most one fetch in flight;
//! the entry remembers the single-flight token issued when it went pending,
//! and a completion is only applied if its token still matches.

use super::worker::{FetchJob, FetchPool};
use super::{ProviderError, StatsProvider, StatsRecord};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lobbyscope_types::{CacheSettings, StalePolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Immediate answer of [`StatsCache::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Fresh(Arc<StatsRecord>),
    /// An older value, served while a refresh is pending or backing off
    Stale(Arc<StatsRecord>),
    Pending,
    Failed(ProviderError),
}

impl CacheLookup {
    pub fn record(&self) -> Option<&Arc<StatsRecord>> {
        match self {
            CacheLookup::Fresh(r) | CacheLookup::Stale(r) => Some(r),
            CacheLookup::Pending | CacheLookup::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
enum EntryState {
    Pending { token: u64 },
    Ready(Arc<StatsRecord>),
    Failed(ProviderError),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    state: EntryState,
    /// Most recent successful value, kept across refreshes
    last_good: Option<Arc<StatsRecord>>,
    /// Meaningless while pending
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        !matches!(self.state, EntryState::Pending { .. }) && now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy)]
struct Timings {
    fresh_ttl: Duration,
    failure_backoff: Duration,
    stale_policy: StalePolicy,
}

struct CacheInner {
    entries: DashMap<String, CacheEntry>,
    timings: Timings,
    next_token: AtomicU64,
    jobs: mpsc::UnboundedSender<FetchJob>,
    changes: watch::Sender<u64>,
    cancel: CancellationToken,
}

/// TTL cache in front of a [`StatsProvider`], with background fetches.
///
/// Cheap to clone; all clones share the same entries.
#[derive(Clone)]
pub struct StatsCache {
    inner: Arc<CacheInner>,
}

impl StatsCache {
    /// Create the cache and spawn its fetch pool on the current runtime.
    pub fn start(
        provider: Arc<dyn StatsProvider>,
        settings: &CacheSettings,
        cancel: CancellationToken,
    ) -> (Self, FetchPool) {
        let (cache, jobs) = Self::with_queue(settings, cancel.clone());
        let pool = FetchPool::spawn(
            cache.clone(),
            jobs,
            provider,
            settings.workers,
            settings.fetch_timeout(),
            cancel,
        );
        (cache, pool)
    }

    /// Cache whose fetch jobs are delivered to the returned queue.
    pub(crate) fn with_queue(
        settings: &CacheSettings,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<FetchJob>) {
        let (jobs, rx) = mpsc::unbounded_channel();
        let (changes, _) = watch::channel(0);
        let cache = Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                timings: Timings {
                    fresh_ttl: settings.fresh_ttl(),
                    failure_backoff: settings.failure_backoff(),
                    stale_policy: settings.stale_policy,
                },
                next_token: AtomicU64::new(1),
                jobs,
                changes,
                cancel,
            }),
        };
        (cache, rx)
    }

    /// Look up a player, starting a background fetch if the entry is missing
    /// or expired. Never waits for the fetch.
    pub fn get(&self, key: &str) -> CacheLookup {
        let now = Instant::now();
        let mut enqueue = None;

        let lookup = match self.inner.entries.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                let token = self.next_token();
                vacant.insert(CacheEntry {
                    state: EntryState::Pending { token },
                    last_good: None,
                    expires_at: now,
                });
                enqueue = Some(token);
                CacheLookup::Pending
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    let token = self.next_token();
                    entry.state = EntryState::Pending { token };
                    enqueue = Some(token);
                }
                self.read(entry, now)
            }
        };

        // Entry lock is released; the pool may complete the job right away
        if let Some(token) = enqueue {
            self.submit(key, token);
        }
        lookup
    }

    /// Current state without side effects. `None` if nothing servable is cached.
    pub fn peek(&self, key: &str) -> Option<CacheLookup> {
        let now = Instant::now();
        let entry = self.inner.entries.get(key)?;
        if entry.is_expired(now) {
            return match (self.inner.timings.stale_policy, &entry.last_good) {
                (StalePolicy::ServeStale, Some(value)) => Some(CacheLookup::Stale(value.clone())),
                _ => None,
            };
        }
        Some(self.read(&entry, now))
    }

    /// Like [`get`](Self::get), but waits for an in-flight fetch to finish.
    pub async fn resolve(&self, key: &str) -> CacheLookup {
        let mut changes = self.inner.changes.subscribe();
        let mut lookup = self.get(key);

        while self.is_in_flight(key) {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(current) = self.peek(key) {
            lookup = current;
        }
        lookup
    }

    /// Drop one entry; an in-flight fetch for it will be discarded.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.inner.entries.remove(key).is_some();
        if removed {
            tracing::debug!(player = %key, "Invalidated cached stats");
            self.notify_change();
        }
        removed
    }

    pub fn clear(&self) {
        let count = self.inner.entries.len();
        self.inner.entries.clear();
        tracing::debug!(count, "Cleared stats cache");
        self.notify_change();
    }

    /// Keep only entries whose key satisfies `keep`. Returns the number evicted.
    pub fn retain<F>(&self, keep: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let before = self.inner.entries.len();
        self.inner.entries.retain(|key, _| keep(key));
        before.saturating_sub(self.inner.entries.len())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner
            .entries
            .get(key)
            .is_some_and(|e| matches!(e.state, EntryState::Pending { .. }))
    }

    /// Counter bumped after every applied completion or removal.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Apply the outcome of the fetch identified by `token`.
    ///
    /// Returns false (and changes nothing) if the entry was removed or
    /// re-requested since the job was issued.
    pub(crate) fn complete(
        &self,
        key: &str,
        token: u64,
        result: Result<StatsRecord, ProviderError>,
    ) -> bool {
        let now = Instant::now();
        let timings = self.inner.timings;

        let applied = match self.inner.entries.get_mut(key) {
            Some(mut entry)
                if matches!(entry.state, EntryState::Pending { token: current } if current == token) =>
            {
                match result {
                    Ok(record) => {
                        let record = Arc::new(record);
                        entry.state = EntryState::Ready(record.clone());
                        entry.last_good = Some(record);
                        entry.expires_at = now + timings.fresh_ttl;
                    }
                    Err(error) => {
                        entry.state = EntryState::Failed(error);
                        entry.expires_at = now + timings.failure_backoff;
                    }
                }
                true
            }
            _ => false,
        };

        if applied {
            self.notify_change();
        } else {
            tracing::debug!(player = %key, token, "Discarding completion for superseded fetch");
        }
        applied
    }

    fn read(&self, entry: &CacheEntry, now: Instant) -> CacheLookup {
        let serve_stale = self.inner.timings.stale_policy == StalePolicy::ServeStale;
        match &entry.state {
            EntryState::Ready(value) if now < entry.expires_at => CacheLookup::Fresh(value.clone()),
            EntryState::Ready(value) => CacheLookup::Stale(value.clone()),
            EntryState::Pending { .. } => match &entry.last_good {
                Some(value) if serve_stale => CacheLookup::Stale(value.clone()),
                _ => CacheLookup::Pending,
            },
            EntryState::Failed(error) => match &entry.last_good {
                Some(value) if serve_stale => CacheLookup::Stale(value.clone()),
                _ => CacheLookup::Failed(error.clone()),
            },
        }
    }

    fn submit(&self, key: &str, token: u64) {
        tracing::debug!(player = %key, token, "Queueing stats fetch");
        let job = FetchJob {
            key: key.to_string(),
            token,
        };
        if self.inner.jobs.send(job).is_err() {
            tracing::debug!(player = %key, "Fetch pool stopped, job dropped");
        }
    }

    fn next_token(&self) -> u64 {
        self.inner.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn notify_change(&self) {
        self.inner.changes.send_modify(|n| *n = n.wrapping_add(1));
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
