use chrono::{DateTime, Utc};
use hashbrown::HashSet;
use serde::Serialize;

/// Consecutive full refreshes a player may be missing from before removal
const MAX_MISSED_REFRESHES: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(name: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            joined_at,
        }
    }
}

#[derive(Debug, Clone)]
struct RosterEntry {
    player: Player,
    missed_refreshes: u8,
}

/// Players present in the current session, in join order, unique by name.
#[derive(Debug, Clone, Default)]
pub struct SessionRoster {
    entries: Vec<RosterEntry>,
    names: HashSet<String>,
}

/// Membership changes caused by a full roster refresh.
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    pub added: Vec<Player>,
    pub removed: Vec<String>,
}

impl SessionRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.entries.iter().map(|e| &e.player)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.player.name.clone()).collect()
    }

    /// Returns false if the player was already present.
    pub fn add(&mut self, player: Player) -> bool {
        if !self.names.insert(player.name.clone()) {
            return false;
        }
        self.entries.push(RosterEntry {
            player,
            missed_refreshes: 0,
        });
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<Player> {
        if !self.names.remove(name) {
            return None;
        }
        let idx = self.entries.iter().position(|e| e.player.name == name)?;
        Some(self.entries.remove(idx).player)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.names.clear();
    }

    /// Reconcile with a full listing of present players.
    ///
    /// Listed players are added (or have their miss count reset); a player
    /// missing from two consecutive listings is removed.
    pub fn apply_refresh(&mut self, listed: &[String], now: DateTime<Utc>) -> RefreshOutcome {
        let listed_set: HashSet<&str> = listed.iter().map(String::as_str).collect();
        let mut outcome = RefreshOutcome::default();

        for entry in &mut self.entries {
            if listed_set.contains(entry.player.name.as_str()) {
                entry.missed_refreshes = 0;
            } else {
                entry.missed_refreshes += 1;
                if entry.missed_refreshes >= MAX_MISSED_REFRESHES {
                    outcome.removed.push(entry.player.name.clone());
                }
            }
        }
        for name in &outcome.removed {
            self.remove(name);
        }

        for name in listed {
            let player = Player::new(name.clone(), now);
            if self.add(player.clone()) {
                outcome.added.push(player);
            }
        }

        outcome
    }
}
