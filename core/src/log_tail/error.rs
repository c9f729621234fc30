//! Error types for log tailing

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`LogTailer`](super::LogTailer) and the catch-up replay.
///
/// Transient conditions (file missing mid-rotation, short reads) never reach
/// callers; they are retried inside the tailer.
#[derive(Debug, Error)]
pub enum TailError {
    /// Deliberate shutdown: the tailer was cancelled
    #[error("log tailer closed")]
    Closed,

    #[error("log file {path} did not appear within {waited:?}")]
    NeverAppeared { path: PathBuf, waited: Duration },

    #[error("log file {path} has been unreadable for {waited:?}")]
    Unavailable {
        path: PathBuf,
        waited: Duration,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log file {path}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file {path}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
