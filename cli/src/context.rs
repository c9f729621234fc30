use lobbyscope_core::context::AppConfig;
use lobbyscope_core::tracker::TrackerHandle;
use std::path::PathBuf;

/// Holds all shared state for the CLI application.
pub struct CliContext {
    pub config: AppConfig,
    /// Explicit `--config` file, None for the default location
    pub config_path: Option<PathBuf>,
    pub tracker: TrackerHandle,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: Option<PathBuf>, tracker: TrackerHandle) -> Self {
        Self {
            config,
            config_path,
            tracker,
        }
    }
}
