//! Application configuration
//!
//! Re-exports the shared types from lobbyscope-types and adds persistence,
//! platform defaults and the conversion into a runnable [`TrackerConfig`].

use super::ConfigError;
use crate::log_tail::TailOptions;
use crate::session::{NickMap, PatternSet};
use std::path::{Path, PathBuf};

pub use lobbyscope_types::{
    AppConfig, CacheSettings, GrammarKind, LineRuleConfig, LogEncoding, ProviderSettings,
    StalePolicy, TailerSettings,
};

const APP_NAME: &str = "lobbyscope";
const CONFIG_NAME: &str = "config";

// ─────────────────────────────────────────────────────────────────────────────
// Platform-Specific Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// The vanilla launcher's `latest.log` location.
pub fn default_log_path() -> String {
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir()
            .map(|p| p.join(".minecraft/logs/latest.log"))
            .and_then(|p| p.to_str().map(String::from))
            .unwrap_or_default()
    }
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|p| p.join("minecraft/logs/latest.log"))
            .and_then(|p| p.to_str().map(String::from))
            .unwrap_or_default()
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        dirs::home_dir()
            .map(|p| p.join(".minecraft/logs/latest.log"))
            .and_then(|p| p.to_str().map(String::from))
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AppConfig Extensions
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for AppConfig persistence
pub trait AppConfigExt: Sized {
    /// Load the user's config, falling back to defaults if it is missing or unreadable.
    fn load() -> Self;
    fn load_from(path: &Path) -> Result<Self, ConfigError>;
    fn load_with_defaults() -> Self;
    fn save(&self) -> Result<(), ConfigError>;
    fn save_to(&self, path: &Path) -> Result<(), ConfigError>;
    fn config_path() -> Result<PathBuf, ConfigError>;
}

impl AppConfigExt for AppConfig {
    fn load() -> Self {
        match confy::load::<AppConfig>(APP_NAME, CONFIG_NAME) {
            Ok(config) => with_default_log_path(config),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load config, using defaults");
                Self::load_with_defaults()
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = confy::load_path(path)?;
        Ok(with_default_log_path(config))
    }

    /// Load with platform-specific defaults (used when no config file exists)
    fn load_with_defaults() -> Self {
        AppConfig::with_log_path(default_log_path())
    }

    fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, CONFIG_NAME, self.clone()).map_err(ConfigError::Save)
    }

    fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        confy::store_path(path, self.clone()).map_err(ConfigError::Save)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME).map_err(ConfigError::Load)
    }
}

fn with_default_log_path(mut config: AppConfig) -> AppConfig {
    if config.log_path.is_empty() {
        config.log_path = default_log_path();
    }
    config
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracker Config
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the session tracker needs, with patterns already compiled.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub log_path: PathBuf,
    pub patterns: PatternSet,
    pub tail: TailOptions,
    pub cache: CacheSettings,
    /// Fast-forward through the existing log before tailing
    pub replay_existing: bool,
    pub known_nicks: NickMap,
}

impl TrackerConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        if config.log_path.trim().is_empty() {
            return Err(ConfigError::MissingLogPath);
        }

        let patterns =
            PatternSet::builtin(config.grammar)?.with_late_join_rules(&config.late_join_rules)?;

        Ok(Self {
            log_path: PathBuf::from(&config.log_path),
            patterns,
            tail: TailOptions::from_settings(&config.tailer, config.encoding),
            cache: config.cache.clone(),
            replay_existing: config.replay_existing,
            known_nicks: NickMap::from_known(config.known_nicks.clone()),
        })
    }
}
