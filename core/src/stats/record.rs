use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Headline statistics shown for a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub level: f64,
    /// Final kills per final death
    pub kdr: f64,
    /// Wins per loss
    pub wlr: f64,
    /// Hidden by some players through API settings
    pub winstreak: Option<u32>,
}

/// Snapshot returned by a [`StatsProvider`](super::StatsProvider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub player: String,
    pub fetched_at: DateTime<Utc>,
    /// `None` when the provider has no profile for the name (nicked player)
    pub stats: Option<GameStats>,
}

impl StatsRecord {
    pub fn new(player: impl Into<String>, stats: GameStats) -> Self {
        Self {
            player: player.into(),
            fetched_at: Utc::now(),
            stats: Some(stats),
        }
    }

    pub fn hidden(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            fetched_at: Utc::now(),
            stats: None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.stats.is_none()
    }

    pub fn level(&self) -> Option<f64> {
        self.stats.as_ref().map(|s| s.level)
    }
}
