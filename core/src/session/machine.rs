use super::{
    LineEvent, NickMap, Party, PatternSet, Player, SessionEvent, SessionPhase, SessionRoster,
};
use crate::log_tail::TailItem;
use chrono::{DateTime, Utc};

/// Turns log lines into session events and keeps the current roster.
///
/// The roster, party and phase change only through [`apply`](Self::apply);
/// every change is reported in the returned events, in the order it happened.
/// The nick map is not session state and survives resets.
pub struct SessionStateMachine {
    patterns: PatternSet,
    phase: SessionPhase,
    roster: SessionRoster,
    party: Party,
    nicks: NickMap,
    local_player: Option<String>,
}

impl SessionStateMachine {
    pub fn new(patterns: PatternSet) -> Self {
        Self {
            patterns,
            phase: SessionPhase::Idle,
            roster: SessionRoster::new(),
            party: Party::new(),
            nicks: NickMap::new(),
            local_player: None,
        }
    }

    pub fn with_nicks(mut self, nicks: NickMap) -> Self {
        self.nicks = nicks;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn roster(&self) -> &SessionRoster {
        &self.roster
    }

    pub fn local_player(&self) -> Option<&str> {
        self.local_player.as_deref()
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn nicks(&self) -> &NickMap {
        &self.nicks
    }

    /// Name whose stats represent `name` (the account behind a known nick).
    pub fn stats_key<'a>(&'a self, name: &'a str) -> &'a str {
        self.nicks.resolve(name)
    }

    pub fn feed(&mut self, line: &str) -> Vec<SessionEvent> {
        match self.patterns.match_line(line) {
            Some(event) => self.apply(event, Utc::now()),
            None => Vec::new(),
        }
    }

    pub fn feed_item(&mut self, item: &TailItem) -> Vec<SessionEvent> {
        match item {
            TailItem::Line(line) => self.feed(line),
            TailItem::Rotated => self.reset(),
        }
    }

    /// The log restarted: back to Idle with an empty roster and party.
    pub fn reset(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.clear_roster(&mut events);
        self.update_party(&mut events, |party| party.clear_except(None));
        self.transition(SessionPhase::Idle, &mut events);
        events
    }

    pub fn apply(&mut self, event: LineEvent, now: DateTime<Utc>) -> Vec<SessionEvent> {
        use SessionPhase::*;

        let mut events = Vec::new();
        match (self.phase, event) {
            (_, LineEvent::LocalPlayer(name)) => {
                events = self.reset();
                tracing::info!(player = %name, "Local player identified");
                self.local_player = Some(name.clone());
                events.push(SessionEvent::LocalPlayerIdentified(name.clone()));
                self.update_party(&mut events, |party| {
                    party.add(&name);
                });
            }
            (_, LineEvent::EnteredLobby) => {
                self.clear_roster(&mut events);
                self.transition(Lobby, &mut events);
            }
            (Lobby, LineEvent::PlayerJoined(name) | LineEvent::LateJoin(name))
            | (InGame, LineEvent::LateJoin(name)) => {
                self.add(Player::new(name, now), &mut events);
            }
            (Lobby, LineEvent::PlayerLeft(name)) => {
                if self.roster.remove(&name).is_some() {
                    events.push(SessionEvent::RosterRemoved(name));
                }
            }
            (Lobby | InGame, LineEvent::RosterRefresh(names)) => {
                let outcome = self.roster.apply_refresh(&names, now);
                events.extend(outcome.removed.into_iter().map(SessionEvent::RosterRemoved));
                events.extend(outcome.added.into_iter().map(SessionEvent::RosterAdded));
            }
            (Lobby, LineEvent::GameStarted) => self.transition(InGame, &mut events),
            (InGame, LineEvent::GameEnded(outcome)) => {
                tracing::debug!(?outcome, "Game ended");
                self.transition(PostGame, &mut events);
            }
            (_, LineEvent::PartyAttached(leader)) => {
                tracing::info!(leader = %leader, "Joined party");
                let local = self.local_player.clone();
                self.update_party(&mut events, |party| {
                    party.clear_except(local.as_deref());
                    party.add(&leader);
                });
            }
            (_, LineEvent::PartyDetached | LineEvent::PartyListIncoming) => {
                let local = self.local_player.clone();
                self.update_party(&mut events, |party| party.clear_except(local.as_deref()));
            }
            (_, LineEvent::PartyJoined(names) | LineEvent::PartyListed(names)) => {
                self.update_party(&mut events, |party| {
                    for name in &names {
                        party.add(name);
                    }
                });
            }
            (_, LineEvent::PartyLeft(names)) => {
                self.update_party(&mut events, |party| {
                    for name in &names {
                        if !party.remove(name) {
                            tracing::debug!(player = %name, "Left party without being a known member");
                        }
                    }
                });
            }
            (_, LineEvent::Nicked(nick)) => {
                let local = self.local_player.as_deref();
                if local.is_none() {
                    tracing::warn!(nick = %nick, "Nicked before the local player is known");
                }
                if let Some(old) = self.nicks.set_own(&nick, local) {
                    events.push(SessionEvent::NickChanged {
                        nick: old,
                        account: None,
                    });
                }
                events.push(SessionEvent::NickChanged {
                    account: self.nicks.account(&nick).map(String::from),
                    nick,
                });
            }
            (_, LineEvent::NickAssigned { nick, account }) => {
                tracing::info!(nick = %nick, account = ?account, "Nick mapping updated");
                self.nicks.assign(&nick, account.as_deref());
                events.push(SessionEvent::NickChanged { nick, account });
            }
            (_, LineEvent::ApiKeyIssued(key)) => {
                tracing::info!("New API key seen in the log");
                events.push(SessionEvent::ApiKeyIssued(key));
            }
            (phase, event) => {
                tracing::trace!(?phase, ?event, "Event not applicable in current phase");
            }
        }
        events
    }

    fn add(&mut self, player: Player, events: &mut Vec<SessionEvent>) {
        if self.roster.add(player.clone()) {
            events.push(SessionEvent::RosterAdded(player));
        }
    }

    fn update_party(&mut self, events: &mut Vec<SessionEvent>, change: impl FnOnce(&mut Party)) {
        let before = self.party.clone();
        change(&mut self.party);
        if self.party != before {
            tracing::debug!(members = ?self.party.members(), "Party changed");
            events.push(SessionEvent::PartyChanged(self.party.members().to_vec()));
        }
    }

    fn clear_roster(&mut self, events: &mut Vec<SessionEvent>) {
        self.roster.clear();
        events.push(SessionEvent::RosterReset);
    }

    fn transition(&mut self, to: SessionPhase, events: &mut Vec<SessionEvent>) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        tracing::debug!(?from, ?to, "Session phase changed");
        events.push(SessionEvent::PhaseChanged { from, to });
    }
}
