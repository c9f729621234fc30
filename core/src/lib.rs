pub mod context;
pub mod log_tail;
pub mod session;
pub mod stats;
pub mod tracker;

// Re-exports for convenience
pub use context::{AppConfig, AppConfigExt, ConfigError, TrackerConfig, TrackerError};
pub use log_tail::{LogPosition, LogTailer, TailError, TailItem, TailOptions};
pub use session::{
    NickMap, Party, PatternSet, Player, SessionEvent, SessionPhase, SessionStateMachine,
};
pub use stats::{
    CacheLookup, GameStats, ProviderError, RateLimiter, StatsCache, StatsProvider, StatsRecord,
};
pub use tracker::{PlayerView, SessionTracker, StatsStatus, TrackerHandle, ViewModel};
