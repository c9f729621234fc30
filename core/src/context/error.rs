//! Error types for configuration and the session tracker

use crate::log_tail::TailError;
use crate::session::PatternError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),

    #[error("invalid line pattern")]
    Pattern(#[from] PatternError),

    #[error("no log file path configured")]
    MissingLogPath,
}

/// Terminal failures of a running tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("log file {path} is unavailable")]
    LogUnavailable {
        path: PathBuf,
        #[source]
        source: TailError,
    },

    #[error("tracker task failed")]
    Join(#[source] tokio::task::JoinError),
}
