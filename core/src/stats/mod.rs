//! Player statistics: the provider boundary, the TTL cache and its fetch pool.

mod cache;
mod provider;
mod rate_limit;
mod record;
mod worker;

pub use cache::{CacheLookup, StatsCache};
pub use provider::{ProviderError, StatsProvider};
pub use rate_limit::RateLimiter;
pub use record::{GameStats, StatsRecord};
pub use worker::{FetchJob, FetchPool};
