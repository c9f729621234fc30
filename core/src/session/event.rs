use super::Player;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SessionPhase {
    #[default]
    Idle,
    Lobby,
    InGame,
    PostGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameOutcome {
    Ended,
    Victory,
    Defeat,
}

/// A recognized log line, before the state machine decides whether it applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// The client started and logged in as this player
    LocalPlayer(String),
    EnteredLobby,
    PlayerJoined(String),
    PlayerLeft(String),
    /// Full list of the players currently present (e.g. `/who`)
    RosterRefresh(Vec<String>),
    GameStarted,
    GameEnded(GameOutcome),
    /// Someone joined a game already in progress
    LateJoin(String),
    /// The local player joined this leader's party
    PartyAttached(String),
    /// The local player left, was kicked from, or lost their party
    PartyDetached,
    PartyJoined(Vec<String>),
    PartyLeft(Vec<String>),
    /// Header of a party listing; the member lines follow
    PartyListIncoming,
    PartyListed(Vec<String>),
    /// The local player is now nicked as this name
    Nicked(String),
    /// `nick` belongs to `account`; `None` forgets the nick
    NickAssigned {
        nick: String,
        account: Option<String>,
    },
    ApiKeyIssued(String),
}

/// Session changes emitted by [`SessionStateMachine`](super::SessionStateMachine).
///
/// These are the only way consumers learn about roster changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RosterAdded(Player),
    RosterRemoved(String),
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },
    RosterReset,
    LocalPlayerIdentified(String),
    /// Party membership changed; carries the current members
    PartyChanged(Vec<String>),
    /// Stats for `nick` now resolve through `account` (or through the nick itself)
    NickChanged {
        nick: String,
        account: Option<String>,
    },
    ApiKeyIssued(String),
}
