mod background_tasks;
mod config;
mod error;

pub use background_tasks::BackgroundTasks;
pub use config::{
    AppConfig, AppConfigExt, CacheSettings, GrammarKind, LineRuleConfig, LogEncoding,
    ProviderSettings, StalePolicy, TailerSettings, TrackerConfig, default_log_path,
};
pub use error::{ConfigError, TrackerError};
