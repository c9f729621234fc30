use super::*;
use lobbyscope_types::LineRuleConfig;
use crate::log_tail::TailItem;
use std::collections::HashSet;

fn machine() -> SessionStateMachine {
    SessionStateMachine::new(PatternSet::generic().unwrap())
}

fn feed_all(m: &mut SessionStateMachine, lines: &[&str]) -> Vec<SessionEvent> {
    lines.iter().flat_map(|l| m.feed(l)).collect()
}

fn added(events: &[SessionEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::RosterAdded(p) => Some(p.name.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_lobby_then_game_start() {
    let mut m = machine();
    let events = feed_all(
        &mut m,
        &[
            "[Lobby] You joined the lobby",
            "[Lobby] PlayerA joined",
            "[Lobby] PlayerB joined",
            "[Game] The game has started",
        ],
    );

    assert_eq!(m.phase(), SessionPhase::InGame);
    assert_eq!(m.roster().names(), vec!["PlayerA", "PlayerB"]);
    assert_eq!(added(&events), vec!["PlayerA", "PlayerB"]);
    assert_eq!(events[0], SessionEvent::RosterReset);
    assert_eq!(
        events.last(),
        Some(&SessionEvent::PhaseChanged {
            from: SessionPhase::Lobby,
            to: SessionPhase::InGame
        })
    );
}

#[test]
fn test_chat_between_joins_is_ignored() {
    let mut m = machine();
    feed_all(&mut m, &["[Lobby] You joined the lobby", "[Lobby] PlayerA joined"]);

    let events = feed_all(
        &mut m,
        &["[Chat] PlayerC: hello", "[Chat] PlayerC: PlayerD joined", "garbage ][ line"],
    );
    assert!(events.is_empty());

    feed_all(&mut m, &["[Lobby] PlayerB joined"]);
    assert_eq!(m.roster().names(), vec!["PlayerA", "PlayerB"]);
}

#[test]
fn test_joins_outside_lobby_are_ignored() {
    let mut m = machine();
    assert!(m.feed("[Lobby] PlayerA joined").is_empty());
    assert_eq!(m.phase(), SessionPhase::Idle);

    feed_all(
        &mut m,
        &["[Lobby] You joined the lobby", "[Lobby] PlayerA joined", "[Game] The game has started"],
    );
    assert!(m.feed("[Lobby] PlayerB joined").is_empty());
    assert!(m.feed("[Lobby] PlayerA left").is_empty());
    assert_eq!(m.roster().names(), vec!["PlayerA"]);
}

#[test]
fn test_game_end_keeps_roster_until_next_lobby() {
    let mut m = machine();
    feed_all(
        &mut m,
        &[
            "[Lobby] You joined the lobby",
            "[Lobby] PlayerA joined",
            "[Game] The game has started",
            "[Game] Victory!",
        ],
    );
    assert_eq!(m.phase(), SessionPhase::PostGame);
    assert_eq!(m.roster().len(), 1);

    let events = m.feed("[Lobby] You joined the lobby");
    assert_eq!(
        events,
        vec![
            SessionEvent::RosterReset,
            SessionEvent::PhaseChanged {
                from: SessionPhase::PostGame,
                to: SessionPhase::Lobby
            }
        ]
    );
    assert!(m.roster().is_empty());
}

#[test]
fn test_reentering_lobby_resets_without_phase_change() {
    let mut m = machine();
    feed_all(&mut m, &["[Lobby] You joined the lobby", "[Lobby] PlayerA joined"]);

    let events = m.feed("[Lobby] You joined the lobby");
    assert_eq!(events, vec![SessionEvent::RosterReset]);
    assert!(m.roster().is_empty());
}

#[test]
fn test_rotation_clears_before_new_file() {
    let mut m = machine();
    feed_all(&mut m, &["[Lobby] You joined the lobby", "[Lobby] PlayerA joined"]);

    let mut events = m.feed_item(&TailItem::Rotated);
    assert_eq!(m.phase(), SessionPhase::Idle);
    assert!(m.roster().is_empty());

    for line in ["[Lobby] You joined the lobby", "[Lobby] PlayerB joined"] {
        events.extend(m.feed_item(&TailItem::Line(line.to_string())));
    }

    let reset_at = events
        .iter()
        .position(|e| *e == SessionEvent::RosterReset)
        .unwrap();
    let added_at = events
        .iter()
        .position(|e| matches!(e, SessionEvent::RosterAdded(_)))
        .unwrap();
    assert!(reset_at < added_at);
    assert_eq!(m.roster().names(), vec!["PlayerB"]);
}

#[test]
fn test_local_player_restarts_session() {
    let mut m = machine();
    feed_all(&mut m, &["[Lobby] You joined the lobby", "[Lobby] PlayerA joined"]);

    let events = m.feed("[Client] Setting user: Me");
    assert_eq!(m.local_player(), Some("Me"));
    assert_eq!(m.phase(), SessionPhase::Idle);
    assert!(m.roster().is_empty());
    assert!(events.contains(&SessionEvent::LocalPlayerIdentified("Me".to_string())));
    assert_eq!(m.party().members(), ["Me"]);
}

#[test]
fn test_late_join_rule_adds_during_game() {
    let patterns = PatternSet::generic()
        .unwrap()
        .with_late_join_rules(&[LineRuleConfig {
            prefix: "[Game] ".into(),
            body: r"(?P<name>\w+) joined the game".into(),
        }])
        .unwrap();
    let mut m = SessionStateMachine::new(patterns);

    feed_all(
        &mut m,
        &["[Lobby] You joined the lobby", "[Lobby] PlayerA joined", "[Game] The game has started"],
    );
    let events = m.feed("[Game] PlayerC joined the game");

    assert_eq!(added(&events), vec!["PlayerC"]);
    assert_eq!(m.roster().names(), vec!["PlayerA", "PlayerC"]);
    assert_eq!(m.phase(), SessionPhase::InGame);
}

#[test]
fn test_refresh_removes_after_two_misses() {
    let mut m = machine();
    feed_all(
        &mut m,
        &["[Lobby] You joined the lobby", "[Lobby] PlayerA joined", "[Lobby] PlayerB joined"],
    );

    let first = m.feed("[Lobby] Players: PlayerA, PlayerC");
    assert_eq!(added(&first), vec!["PlayerC"]);
    assert!(m.roster().contains("PlayerB"));

    let second = m.feed("[Lobby] Players: PlayerA, PlayerC");
    assert_eq!(second, vec![SessionEvent::RosterRemoved("PlayerB".into())]);
    assert_eq!(m.roster().names(), vec!["PlayerA", "PlayerC"]);
}

#[test]
fn test_hypixel_session() {
    let mut m = SessionStateMachine::new(PatternSet::hypixel().unwrap());
    let p = "[10:11:12] [Client thread/INFO]: ";
    let lines = [
        format!("{p}Setting user: Me"),
        format!("{p}[CHAT] Sending you to mini12C!"),
        format!("{p}[CHAT] Me has joined (1/8)!"),
        format!("{p}[CHAT] Foo has joined (2/8)!"),
        format!("{p}[CHAT] Bar has joined (3/8)!"),
        format!("{p}[CHAT] Bar has quit!"),
        format!("{p}[CHAT] Foo: gl hf"),
        format!("{p}[CHAT]                              Bed Wars"),
    ];
    for line in &lines {
        m.feed(line);
    }

    assert_eq!(m.local_player(), Some("Me"));
    assert_eq!(m.phase(), SessionPhase::InGame);
    assert_eq!(m.roster().names(), vec!["Me", "Foo"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Party and nicks
// ─────────────────────────────────────────────────────────────────────────────

fn party_events(events: &[SessionEvent]) -> Vec<Vec<String>> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::PartyChanged(members) => Some(members.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_party_tracking_across_lobbies() {
    let mut m = machine();
    feed_all(&mut m, &["[Client] Setting user: Me", "[Party] You joined Leader's party"]);
    assert_eq!(m.party().members(), ["Me", "Leader"]);

    let events = feed_all(
        &mut m,
        &[
            "[Party] Friend joined the party",
            "[Lobby] You joined the lobby",
            "[Lobby] Friend joined",
            "[Lobby] Stranger joined",
        ],
    );
    assert_eq!(
        party_events(&events),
        vec![vec!["Me".to_string(), "Leader".into(), "Friend".into()]]
    );
    // Lobby changes never touch the party
    assert_eq!(m.party().members(), ["Me", "Leader", "Friend"]);

    feed_all(&mut m, &["[Party] Leader left the party"]);
    assert_eq!(m.party().members(), ["Me", "Friend"]);

    let events = m.feed("[Party] You left the party");
    assert_eq!(party_events(&events), vec![vec!["Me".to_string()]]);

    // Already alone: no change, no event
    assert!(m.feed("[Party] You left the party").is_empty());
}

#[test]
fn test_party_listing_replaces_members() {
    let mut m = SessionStateMachine::new(PatternSet::hypixel().unwrap());
    let chat = "[10:11:12] [Client thread/INFO]: [CHAT] ";
    for line in [
        "[10:11:12] [Client thread/INFO]: Setting user: Me".to_string(),
        format!("{chat}[VIP] Old joined the party."),
        format!("{chat}Party Members (3)"),
        format!("{chat}Party Leader: [MVP++] Boss ●"),
        format!("{chat}Party Members: Me ● [VIP+] Pal ● "),
    ] {
        m.feed(&line);
    }
    assert_eq!(m.party().members(), ["Me", "Boss", "Pal"]);
}

#[test]
fn test_reset_clears_party_but_keeps_nicks() {
    let mut m = machine().with_nicks(NickMap::from_known([("Hidden", "Real")]));
    feed_all(&mut m, &["[Client] Setting user: Me", "[Party] Friend joined the party"]);

    let events = m.feed_item(&TailItem::Rotated);
    assert!(party_events(&events).contains(&Vec::new()));
    assert!(m.party().is_empty());
    assert_eq!(m.stats_key("Hidden"), "Real");
}

#[test]
fn test_own_nick_resolves_to_local_player() {
    let mut m = machine();
    m.feed("[Client] Setting user: Me");

    let events = m.feed("[Client] You are now nicked as Hidden1");
    assert_eq!(
        events,
        vec![SessionEvent::NickChanged {
            nick: "Hidden1".into(),
            account: Some("Me".into())
        }]
    );
    assert_eq!(m.stats_key("Hidden1"), "Me");

    let events = m.feed("[Client] You are now nicked as Hidden2");
    assert_eq!(
        events,
        vec![
            SessionEvent::NickChanged {
                nick: "Hidden1".into(),
                account: None
            },
            SessionEvent::NickChanged {
                nick: "Hidden2".into(),
                account: Some("Me".into())
            },
        ]
    );
    assert_eq!(m.stats_key("Hidden1"), "Hidden1");
    assert_eq!(m.stats_key("Stranger"), "Stranger");
}

#[test]
fn test_whispered_nick_assignment() {
    let mut m = SessionStateMachine::new(PatternSet::hypixel().unwrap());
    let chat = "[10:11:12] [Client thread/INFO]: [CHAT] ";

    m.feed(&format!("{chat}Can't find a player by the name of '!Sneaky=Real'"));
    assert_eq!(m.stats_key("Sneaky"), "Real");

    let events = m.feed(&format!("{chat}Can't find a player by the name of '!Sneaky='"));
    assert_eq!(
        events,
        vec![SessionEvent::NickChanged {
            nick: "Sneaky".into(),
            account: None
        }]
    );
    assert_eq!(m.stats_key("Sneaky"), "Sneaky");
}

#[test]
fn test_api_key_line_is_reported_in_any_phase() {
    let mut m = SessionStateMachine::new(PatternSet::hypixel().unwrap());
    let events = m.feed(
        "[10:11:12] [Client thread/INFO]: [CHAT] Your new API key is deadbeef-ae10-4d07-25f6-f23130b92652",
    );
    assert_eq!(
        events,
        vec![SessionEvent::ApiKeyIssued(
            "deadbeef-ae10-4d07-25f6-f23130b92652".into()
        )]
    );
    assert_eq!(m.phase(), SessionPhase::Idle);
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference simulation
// ─────────────────────────────────────────────────────────────────────────────

/// Straightforward model of the roster rules, kept independent of the machine.
#[derive(Default)]
struct Reference {
    phase: Option<&'static str>,
    roster: Vec<String>,
}

impl Reference {
    fn step(&mut self, line: &Line) {
        match (self.phase, line) {
            (_, Line::Lobby) => {
                self.roster.clear();
                self.phase = Some("lobby");
            }
            (Some("lobby"), Line::Join(n)) => {
                if !self.roster.contains(n) {
                    self.roster.push(n.clone());
                }
            }
            (Some("lobby"), Line::Leave(n)) => self.roster.retain(|p| p != n),
            (Some("lobby"), Line::Start) => self.phase = Some("game"),
            (Some("game"), Line::End) => self.phase = Some("post"),
            (_, Line::Rotate) => {
                self.roster.clear();
                self.phase = None;
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
enum Line {
    Lobby,
    Join(String),
    Leave(String),
    Start,
    End,
    Chat,
    Rotate,
}

impl Line {
    fn item(&self) -> TailItem {
        let text = match self {
            Line::Lobby => "[Lobby] You joined the lobby".to_string(),
            Line::Join(n) => format!("[Lobby] {n} joined"),
            Line::Leave(n) => format!("[Lobby] {n} left"),
            Line::Start => "[Game] The game has started".to_string(),
            Line::End => "[Game] The game has ended".to_string(),
            Line::Chat => "[Chat] P1: P2 joined".to_string(),
            Line::Rotate => return TailItem::Rotated,
        };
        TailItem::Line(text)
    }
}

/// Small deterministic generator so the sequences are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn line(&mut self) -> Line {
        let name = format!("P{}", self.next() % 6);
        match self.next() % 20 {
            0..=1 => Line::Lobby,
            2..=8 => Line::Join(name),
            9..=12 => Line::Leave(name),
            13 => Line::Start,
            14 => Line::End,
            15 => Line::Rotate,
            _ => Line::Chat,
        }
    }
}

#[test]
fn test_roster_matches_reference_simulation() {
    for seed in 0..200 {
        let mut rng = Lcg(seed);
        let mut m = machine();
        let mut reference = Reference::default();

        for _ in 0..200 {
            let line = rng.line();
            m.feed_item(&line.item());
            reference.step(&line);

            assert_eq!(m.roster().names(), reference.roster, "seed {seed} after {line:?}");
        }

        let unique: HashSet<_> = m.roster().names().into_iter().collect();
        assert_eq!(unique.len(), m.roster().len());
    }
}
