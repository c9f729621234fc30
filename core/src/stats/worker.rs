use super::{ProviderError, StatsCache, StatsProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// One queued provider call for a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub key: String,
    /// Single-flight token of the pending entry
    pub token: u64,
}

/// Bounded pool running fetch jobs against the provider.
///
/// Jobs wait in the queue until one of `workers` slots frees up.
pub struct FetchPool {
    dispatcher: JoinHandle<()>,
    cancel: CancellationToken,
}

impl FetchPool {
    pub(crate) fn spawn(
        cache: StatsCache,
        jobs: mpsc::UnboundedReceiver<FetchJob>,
        provider: Arc<dyn StatsProvider>,
        workers: usize,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(workers.max(1)));
        let dispatcher = tokio::spawn(dispatch(
            cache,
            jobs,
            provider,
            slots,
            timeout,
            cancel.clone(),
        ));
        Self { dispatcher, cancel }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the dispatcher and all in-flight fetches to stop.
    pub async fn join(self) {
        if let Err(e) = self.dispatcher.await
            && e.is_panic()
        {
            tracing::error!(error = %e, "Fetch dispatcher panicked");
        }
    }
}

async fn dispatch(
    cache: StatsCache,
    mut jobs: mpsc::UnboundedReceiver<FetchJob>,
    provider: Arc<dyn StatsProvider>,
    slots: Arc<Semaphore>,
    timeout: Duration,
    cancel: CancellationToken,
) {
    let mut running = JoinSet::new();
    // Jobs of fetch tasks still running, so a panicked task can still complete its entry
    let mut jobs_by_task: HashMap<task::Id, FetchJob> = HashMap::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(done) = running.join_next_with_id(), if !running.is_empty() => {
                match done {
                    Ok((id, ())) => {
                        jobs_by_task.remove(&id);
                    }
                    Err(e) => fail_task(&cache, &mut jobs_by_task, e),
                }
            }
            job = jobs.recv() => {
                let Some(job) = job else { break };

                let permit = tokio::select! {
                    _ = cancel.cancelled() => break,
                    permit = slots.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let tracked = job.clone();
                let cache = cache.clone();
                let provider = provider.clone();
                let handle = running.spawn(async move {
                    let result = fetch_with_timeout(provider.as_ref(), &job.key, timeout).await;
                    match &result {
                        Ok(record) => tracing::debug!(player = %job.key, hidden = record.is_hidden(), "Fetched stats"),
                        Err(e) => tracing::warn!(player = %job.key, error = %e, "Stats fetch failed"),
                    }
                    cache.complete(&job.key, job.token, result);
                    drop(permit);
                });
                jobs_by_task.insert(handle.id(), tracked);
            }
        }
    }

    let aborted = running.len();
    running.abort_all();
    while running.join_next().await.is_some() {}
    tracing::debug!(aborted, "Fetch pool stopped");
}

/// Settle the entry of a fetch task that died without completing it.
fn fail_task(cache: &StatsCache, jobs_by_task: &mut HashMap<task::Id, FetchJob>, error: JoinError) {
    let Some(job) = jobs_by_task.remove(&error.id()) else {
        return;
    };
    if error.is_panic() {
        tracing::error!(player = %job.key, error = %error, "Stats fetch task panicked");
    }
    cache.complete(
        &job.key,
        job.token,
        Err(ProviderError::Request("fetch task panicked".to_string())),
    );
}

async fn fetch_with_timeout(
    provider: &dyn StatsProvider,
    key: &str,
    timeout: Duration,
) -> Result<super::StatsRecord, ProviderError> {
    match tokio::time::timeout(timeout, provider.fetch(key, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}
