use crate::log_tail::TailError;
use crate::stats::FetchPool;
use tokio::task::JoinHandle;

/// Tasks owned by a running tracker besides its orchestrator loop.
#[derive(Default)]
pub struct BackgroundTasks {
    pub log_tail: Option<JoinHandle<Result<(), TailError>>>,
    pub fetch_pool: Option<FetchPool>,
}

impl BackgroundTasks {
    /// Wait for both tasks to stop after cancellation and return how the tail ended.
    pub async fn join_all(&mut self) -> Result<(), TailError> {
        let mut outcome = Ok(());
        if let Some(handle) = self.log_tail.take() {
            match handle.await {
                Ok(result) => outcome = result,
                Err(e) if e.is_panic() => tracing::error!(error = %e, "Log tail task panicked"),
                Err(_) => {}
            }
        }
        if let Some(pool) = self.fetch_pool.take() {
            pool.join().await;
        }
        outcome
    }
}
