use super::*;
use crate::stats::GameStats;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use tokio::time::{advance, sleep};

#[derive(Default)]
struct MockProvider {
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fail: AtomicBool,
    panic: AtomicBool,
    delay: Duration,
}

impl MockProvider {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn set_panicking(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatsProvider for MockProvider {
    async fn fetch(&self, player: &str, _timeout: Duration) -> Result<StatsRecord, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic.load(Ordering::SeqCst) {
            panic!("provider blew up fetching {player}");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Status { status: 500 });
        }
        Ok(record(player))
    }
}

fn record(player: &str) -> StatsRecord {
    StatsRecord::new(
        player,
        GameStats {
            level: 150.0,
            kdr: 2.5,
            wlr: 1.2,
            winstreak: Some(3),
        },
    )
}

fn start(provider: &Arc<MockProvider>, settings: CacheSettings) -> (StatsCache, FetchPool) {
    StatsCache::start(provider.clone(), &settings, CancellationToken::new())
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_gets_fetch_once() {
    let provider = Arc::new(MockProvider::with_delay(Duration::from_secs(1)));
    let (cache, _pool) = start(&provider, CacheSettings::default());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("PlayerA") })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), CacheLookup::Pending);
    }

    assert!(matches!(cache.resolve("PlayerA").await, CacheLookup::Fresh(_)));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_single_job_queued_per_key() {
    let (cache, mut jobs) = StatsCache::with_queue(&CacheSettings::default(), CancellationToken::new());

    for _ in 0..5 {
        assert_eq!(cache.get("PlayerA"), CacheLookup::Pending);
    }
    cache.get("PlayerB");

    assert_eq!(jobs.try_recv().unwrap().key, "PlayerA");
    assert_eq!(jobs.try_recv().unwrap().key, "PlayerB");
    assert!(jobs.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_fresh_until_ttl_then_single_refetch() {
    let provider = Arc::new(MockProvider::default());
    let (cache, _pool) = start(&provider, CacheSettings::default());

    assert_eq!(cache.get("PlayerA"), CacheLookup::Pending);
    assert!(matches!(cache.resolve("PlayerA").await, CacheLookup::Fresh(_)));

    advance(Duration::from_secs(119)).await;
    assert!(matches!(cache.get("PlayerA"), CacheLookup::Fresh(_)));
    assert_eq!(provider.calls(), 1);

    advance(Duration::from_secs(2)).await;
    assert!(matches!(cache.get("PlayerA"), CacheLookup::Stale(_)));
    assert!(matches!(cache.get("PlayerA"), CacheLookup::Stale(_)));
    assert!(matches!(cache.resolve("PlayerA").await, CacheLookup::Fresh(_)));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failure_not_retried_before_backoff() {
    let provider = Arc::new(MockProvider::default());
    provider.set_failing(true);
    let (cache, _pool) = start(&provider, CacheSettings::default());

    cache.get("PlayerA");
    assert_eq!(
        cache.resolve("PlayerA").await,
        CacheLookup::Failed(ProviderError::Status { status: 500 })
    );

    advance(Duration::from_secs(14)).await;
    assert!(matches!(cache.get("PlayerA"), CacheLookup::Failed(_)));
    assert!(!cache.is_in_flight("PlayerA"));
    assert_eq!(provider.calls(), 1);

    provider.set_failing(false);
    advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get("PlayerA"), CacheLookup::Pending);
    assert!(matches!(cache.resolve("PlayerA").await, CacheLookup::Fresh(_)));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_panicked_fetch_fails_and_retries_after_backoff() {
    let provider = Arc::new(MockProvider::default());
    provider.set_panicking(true);
    let (cache, _pool) = start(&provider, CacheSettings::default());

    assert_eq!(cache.get("PlayerA"), CacheLookup::Pending);
    let lookup = tokio::time::timeout(Duration::from_secs(60), cache.resolve("PlayerA"))
        .await
        .expect("resolve hung on a panicked fetch");
    assert!(matches!(lookup, CacheLookup::Failed(ProviderError::Request(_))));
    assert!(!cache.is_in_flight("PlayerA"));

    provider.set_panicking(false);
    advance(Duration::from_secs(16)).await;
    assert_eq!(cache.get("PlayerA"), CacheLookup::Pending);
    assert!(matches!(cache.resolve("PlayerA").await, CacheLookup::Fresh(_)));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_serve_stale_keeps_last_value_on_failure() {
    let provider = Arc::new(MockProvider::default());
    let (cache, _pool) = start(&provider, CacheSettings::default());

    let first = match cache.resolve("PlayerA").await {
        CacheLookup::Fresh(record) => record,
        other => panic!("expected fresh, got {other:?}"),
    };

    provider.set_failing(true);
    advance(Duration::from_secs(121)).await;

    assert_eq!(cache.get("PlayerA"), CacheLookup::Stale(first.clone()));
    assert_eq!(cache.resolve("PlayerA").await, CacheLookup::Stale(first.clone()));
    assert_eq!(cache.peek("PlayerA"), Some(CacheLookup::Stale(first)));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_withhold_stale_reports_pending_then_failed() {
    let provider = Arc::new(MockProvider::default());
    let settings = CacheSettings {
        stale_policy: StalePolicy::WithholdStale,
        ..Default::default()
    };
    let (cache, _pool) = start(&provider, settings);

    assert!(matches!(cache.resolve("PlayerA").await, CacheLookup::Fresh(_)));

    provider.set_failing(true);
    advance(Duration::from_secs(121)).await;

    assert_eq!(cache.get("PlayerA"), CacheLookup::Pending);
    assert!(matches!(cache.resolve("PlayerA").await, CacheLookup::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out() {
    let provider = Arc::new(MockProvider::with_delay(Duration::from_secs(30)));
    let (cache, _pool) = start(&provider, CacheSettings::default());

    assert_eq!(
        cache.resolve("PlayerA").await,
        CacheLookup::Failed(ProviderError::Timeout(Duration::from_secs(10)))
    );
}

#[tokio::test(start_paused = true)]
async fn test_pool_bounds_concurrent_fetches() {
    let provider = Arc::new(MockProvider::with_delay(Duration::from_secs(1)));
    let settings = CacheSettings {
        workers: 2,
        ..Default::default()
    };
    let (cache, _pool) = start(&provider, settings);

    let players: Vec<String> = (0..6).map(|i| format!("Player{i}")).collect();
    for player in &players {
        cache.get(player);
    }
    for player in &players {
        assert!(matches!(cache.resolve(player).await, CacheLookup::Fresh(_)));
    }

    assert_eq!(provider.calls(), 6);
    assert!(provider.max_active.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_superseded_completion_is_discarded() {
    let (cache, mut jobs) = StatsCache::with_queue(&CacheSettings::default(), CancellationToken::new());

    cache.get("PlayerA");
    let first = jobs.try_recv().unwrap();
    assert!(cache.invalidate("PlayerA"));
    cache.get("PlayerA");
    let second = jobs.try_recv().unwrap();
    assert_ne!(first.token, second.token);

    assert!(!cache.complete("PlayerA", first.token, Ok(record("PlayerA"))));
    assert!(cache.is_in_flight("PlayerA"));

    assert!(cache.complete("PlayerA", second.token, Ok(record("PlayerA"))));
    assert!(matches!(cache.peek("PlayerA"), Some(CacheLookup::Fresh(_))));
}

#[tokio::test]
async fn test_completion_after_invalidate_is_dropped() {
    let (cache, mut jobs) = StatsCache::with_queue(&CacheSettings::default(), CancellationToken::new());

    cache.get("PlayerA");
    let job = jobs.try_recv().unwrap();
    cache.invalidate("PlayerA");

    assert!(!cache.complete("PlayerA", job.token, Ok(record("PlayerA"))));
    assert_eq!(cache.peek("PlayerA"), None);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_completion_bumps_change_counter() {
    let (cache, mut jobs) = StatsCache::with_queue(&CacheSettings::default(), CancellationToken::new());
    let mut changes = cache.subscribe();

    cache.get("PlayerA");
    assert!(!changes.has_changed().unwrap());

    let job = jobs.try_recv().unwrap();
    cache.complete("PlayerA", job.token, Err(ProviderError::RateLimited));
    assert!(changes.has_changed().unwrap());
    assert_eq!(*changes.borrow_and_update(), 1);
}

#[tokio::test]
async fn test_retain_and_clear() {
    let (cache, _jobs) = StatsCache::with_queue(&CacheSettings::default(), CancellationToken::new());
    for player in ["A", "B", "C"] {
        cache.get(player);
    }

    assert_eq!(cache.retain(|key| key == "B"), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.peek("A").is_none());

    cache.clear();
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_pool() {
    let provider = Arc::new(MockProvider::with_delay(Duration::from_secs(60)));
    let cancel = CancellationToken::new();
    let (cache, pool) = StatsCache::start(provider.clone(), &CacheSettings::default(), cancel.clone());

    cache.get("PlayerA");
    tokio::task::yield_now().await;
    pool.shutdown();
    tokio::time::timeout(Duration::from_secs(5), pool.join())
        .await
        .expect("pool did not stop");

    // Resolve gives up once the pool is gone instead of waiting forever
    assert_eq!(cache.resolve("PlayerA").await, CacheLookup::Pending);
}
