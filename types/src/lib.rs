//! Shared configuration types for lobbyscope
//!
//! This crate contains the serializable configuration shared between the
//! tracking backend (lobbyscope-core) and the terminal front-end (lobbyscope-cli).
//! Durations are stored as plain integers so the TOML file stays readable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Log Grammar
// ─────────────────────────────────────────────────────────────────────────────

/// Built-in log line grammar used by the session parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarKind {
    /// Bracket-tagged lines: `[Lobby] PlayerA joined`, `[Game] The game has started`
    #[default]
    Generic,
    /// Minecraft client chat lines as written by the Hypixel network
    Hypixel,
}

/// Text encoding of the game client's log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEncoding {
    #[default]
    Utf8,
    Windows1252,
}

/// A user-supplied line rule: a literal prefix followed by an anchored regex body.
///
/// Late-join rules must capture the joining player in a `name` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRuleConfig {
    pub prefix: String,
    pub body: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tailer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailerSettings {
    /// Interval between polls when no new data is available
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long to wait for the log file to appear at startup
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    /// How long the file may stay unreadable after startup (None = forever)
    #[serde(default)]
    pub max_unavailable_secs: Option<u64>,
    /// Install a filesystem watcher to wake the tailer before the next poll
    #[serde(default = "default_true")]
    pub watch_filesystem: bool,
}

impl Default for TailerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            startup_timeout_secs: default_startup_timeout_secs(),
            max_unavailable_secs: None,
            watch_filesystem: true,
        }
    }
}

impl TailerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn max_unavailable(&self) -> Option<Duration> {
        self.max_unavailable_secs.map(Duration::from_secs)
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_startup_timeout_secs() -> u64 {
    30
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats Cache
// ─────────────────────────────────────────────────────────────────────────────

/// What `get` returns for a key whose previous value is being refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Serve the previous value while a refresh is in flight or backing off
    #[default]
    ServeStale,
    /// Report `Pending` (or `Failed`) until the refresh completes
    WithholdStale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Lifetime of a successful fetch
    #[serde(default = "default_fresh_ttl_secs")]
    pub fresh_ttl_secs: u64,
    /// Delay before a failed fetch is retried
    #[serde(default = "default_failure_backoff_secs")]
    pub failure_backoff_secs: u64,
    /// Per-fetch timeout handed to the provider
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Maximum concurrent provider calls
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub stale_policy: StalePolicy,
    /// Interval of the eviction sweep / view refresh tick
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fresh_ttl_secs: default_fresh_ttl_secs(),
            failure_backoff_secs: default_failure_backoff_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            workers: default_workers(),
            stale_policy: StalePolicy::default(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheSettings {
    pub fn fresh_ttl(&self) -> Duration {
        Duration::from_secs(self.fresh_ttl_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// Entries live for 2 minutes so they expire before the next queue
fn default_fresh_ttl_secs() -> u64 {
    120
}

fn default_failure_backoff_secs() -> u64 {
    15
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_workers() -> usize {
    16
}

fn default_sweep_interval_secs() -> u64 {
    30
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats Provider
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Name -> UUID lookup endpoint, the name is appended as a path segment
    #[serde(default = "default_profile_endpoint")]
    pub profile_endpoint: String,
    /// Player data endpoint, queried with `?uuid=`
    #[serde(default = "default_player_endpoint")]
    pub player_endpoint: String,
    #[serde(default)]
    pub api_key: String,
    /// Requests allowed per rate-limit window
    #[serde(default = "default_request_limit")]
    pub request_limit: usize,
    #[serde(default = "default_request_window_secs")]
    pub request_window_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            profile_endpoint: default_profile_endpoint(),
            player_endpoint: default_player_endpoint(),
            api_key: String::new(),
            request_limit: default_request_limit(),
            request_window_secs: default_request_window_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn request_window(&self) -> Duration {
        Duration::from_secs(self.request_window_secs.max(1))
    }
}

fn default_profile_endpoint() -> String {
    "https://api.mojang.com/users/profiles/minecraft".to_string()
}

fn default_player_endpoint() -> String {
    "https://api.hypixel.net/player".to_string()
}

fn default_request_limit() -> usize {
    100
}

fn default_request_window_secs() -> u64 {
    60
}

// ─────────────────────────────────────────────────────────────────────────────
// App Config
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path of the game client's live log file
    #[serde(default)]
    pub log_path: String,
    #[serde(default)]
    pub grammar: GrammarKind,
    /// Extra rules recognizing players who join a game already in progress
    #[serde(default)]
    pub late_join_rules: Vec<LineRuleConfig>,
    #[serde(default)]
    pub encoding: LogEncoding,
    /// Fast-forward the session state from the existing log contents at startup
    #[serde(default = "default_true")]
    pub replay_existing: bool,
    #[serde(default)]
    pub tailer: TailerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Nick -> account name pairs whose stats are looked up under the account
    #[serde(default)]
    pub known_nicks: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_log_path(String::new())
    }
}

impl AppConfig {
    /// Create a new AppConfig with the specified log path.
    /// Other fields use their default values.
    pub fn with_log_path(log_path: String) -> Self {
        Self {
            log_path,
            grammar: GrammarKind::default(),
            late_join_rules: Vec::new(),
            encoding: LogEncoding::default(),
            replay_existing: true,
            tailer: TailerSettings::default(),
            cache: CacheSettings::default(),
            provider: ProviderSettings::default(),
            known_nicks: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
