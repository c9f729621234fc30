use crate::session::{NickMap, Party, Player, SessionPhase, SessionRoster};
use crate::stats::{CacheLookup, StatsRecord};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

/// Best known stats for one roster entry.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsStatus {
    Resolved(Arc<StatsRecord>),
    /// Older value while a refresh is pending or failing
    Stale(Arc<StatsRecord>),
    Unresolved,
    Failed(String),
}

impl From<CacheLookup> for StatsStatus {
    fn from(lookup: CacheLookup) -> Self {
        match lookup {
            CacheLookup::Fresh(record) => StatsStatus::Resolved(record),
            CacheLookup::Stale(record) => StatsStatus::Stale(record),
            CacheLookup::Pending => StatsStatus::Unresolved,
            CacheLookup::Failed(e) => StatsStatus::Failed(e.to_string()),
        }
    }
}

impl StatsStatus {
    pub fn record(&self) -> Option<&StatsRecord> {
        match self {
            StatsStatus::Resolved(r) | StatsStatus::Stale(r) => Some(r.as_ref()),
            StatsStatus::Unresolved | StatsStatus::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub name: String,
    /// Account whose stats are shown, when `name` is a known nick
    pub account: Option<String>,
    pub in_party: bool,
    pub joined_at: DateTime<Utc>,
    pub stats: StatsStatus,
}

impl PlayerView {
    pub fn new(player: &Player, stats: StatsStatus) -> Self {
        Self {
            name: player.name.clone(),
            account: None,
            in_party: false,
            joined_at: player.joined_at,
            stats,
        }
    }

    fn level(&self) -> Option<f64> {
        self.stats.record().and_then(StatsRecord::level)
    }
}

/// Render-ready snapshot of the current session.
#[derive(Debug, Clone)]
pub struct ViewModel {
    /// Bumped every time the published content changes
    pub revision: u64,
    pub phase: SessionPhase,
    pub local_player: Option<String>,
    /// Roster order (join order)
    pub players: Vec<PlayerView>,
    /// Party members, including the local player once known
    pub party: Vec<String>,
    /// False until the log is open, and again once tailing has stopped
    pub log_healthy: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            revision: 0,
            phase: SessionPhase::Idle,
            local_player: None,
            players: Vec::new(),
            party: Vec::new(),
            log_healthy: false,
            updated_at: Utc::now(),
        }
    }
}

impl ViewModel {
    /// `stats_for` is called with the stats key of each player: the account
    /// behind a known nick, otherwise the player's own name.
    pub fn build(
        phase: SessionPhase,
        local_player: Option<&str>,
        roster: &SessionRoster,
        party: &Party,
        nicks: &NickMap,
        log_healthy: bool,
        mut stats_for: impl FnMut(&str) -> StatsStatus,
    ) -> Self {
        let players = roster
            .players()
            .map(|p| {
                let key = nicks.resolve(&p.name);
                let mut view = PlayerView::new(p, stats_for(key));
                view.account = (key != p.name).then(|| key.to_string());
                // A nicked local player is still in their own party
                view.in_party = party.contains(&p.name) || party.contains(key);
                view
            })
            .collect();

        Self {
            revision: 0,
            phase,
            local_player: local_player.map(String::from),
            players,
            party: party.members().to_vec(),
            log_healthy,
            updated_at: Utc::now(),
        }
    }

    /// Same content, ignoring revision and timestamp.
    pub fn same_content(&self, other: &ViewModel) -> bool {
        self.phase == other.phase
            && self.local_player == other.local_player
            && self.log_healthy == other.log_healthy
            && self.party == other.party
            && self.players == other.players
    }

    pub fn player(&self, name: &str) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Opponents first, party members after them. Within each group by level,
    /// highest first; players without stats go last, in join order.
    pub fn ranked(&self) -> Vec<&PlayerView> {
        let mut ranked: Vec<&PlayerView> = self.players.iter().collect();
        ranked.sort_by(|a, b| {
            a.in_party
                .cmp(&b.in_party)
                .then_with(|| match (a.level(), b.level()) {
                    (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
        });
        ranked
    }
}
