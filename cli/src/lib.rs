pub mod commands;
pub mod context;
pub mod logging;
pub mod provider;
pub mod render;
pub mod repl;

pub use context::CliContext;
pub use provider::HttpStatsProvider;
pub use repl::{prompt, spawn_reader};
