use super::StatsRecord;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider responded with status {status}")]
    Status { status: u16 },

    #[error("invalid provider response: {0}")]
    Decode(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited by provider")]
    RateLimited,
}

/// Remote source of player statistics.
///
/// Implementations should give up after `timeout`; the fetch pool also
/// enforces it and reports [`ProviderError::Timeout`].
#[async_trait]
pub trait StatsProvider: Send + Sync + 'static {
    async fn fetch(&self, player: &str, timeout: Duration) -> Result<StatsRecord, ProviderError>;

    /// Switch to a new API key for subsequent fetches. Returns false if the
    /// provider does not use keys.
    fn set_api_key(&self, _key: &str) -> bool {
        false
    }
}
