mod error;
mod position;
mod replay;
mod tailer;

pub use error::TailError;
pub use position::{FileIdentity, LogPosition, PositionChange};
pub use replay::{Replay, read_existing};
pub use tailer::{LogTailer, TailItem, TailOptions, encoding_for};
