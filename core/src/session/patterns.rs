use super::{GameOutcome, LineEvent};
use lobbyscope_types::{GrammarKind, LineRuleConfig};
use regex::{Captures, Regex};
use thiserror::Error;

/// Minecraft-style account name
const NAME: &str = r"(?P<name>[A-Za-z0-9_]{1,16})";

/// Optional `[MVP+] ` style rank tag in front of a name
const RANK: &str = r"(?:\[[A-Za-z+]+\] )?";

/// A single ranked name captured as a one-element `names` list
const RANKED_NAMES: &str = r"(?P<names>(?:\[[A-Za-z+]+\] )?[A-Za-z0-9_]{1,16})";

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid pattern {pattern:?}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern {pattern:?} needs a `{group}` capture group")]
    MissingCapture {
        pattern: String,
        group: &'static str,
    },
}

/// What a matching rule turns its line into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    LocalPlayer,
    EnteredLobby,
    PlayerJoined,
    PlayerLeft,
    /// Comma separated list in the `names` group
    RosterRefresh,
    GameStarted,
    GameEnded(GameOutcome),
    LateJoin,
    /// Party leader in the `name` group
    PartyAttached,
    PartyDetached,
    PartyJoined,
    PartyLeft,
    PartyListIncoming,
    PartyListed,
    Nicked,
    /// `nick` group, optional `account` group
    NickAssigned,
    /// `key` group
    ApiKeyIssued,
}

impl RuleAction {
    fn required_group(self) -> Option<&'static str> {
        use RuleAction::*;
        match self {
            LocalPlayer | PlayerJoined | PlayerLeft | LateJoin | PartyAttached | Nicked => {
                Some("name")
            }
            RosterRefresh | PartyJoined | PartyLeft | PartyListed => Some("names"),
            NickAssigned => Some("nick"),
            ApiKeyIssued => Some("key"),
            EnteredLobby | GameStarted | GameEnded(_) | PartyDetached | PartyListIncoming => None,
        }
    }

    fn build(self, caps: &Captures<'_>) -> Option<LineEvent> {
        let group = |g: &str| caps.name(g).map(|m| m.as_str().to_string());
        let name = || group("name");
        let names = || caps.name("names").map(|m| split_names(m.as_str()));
        Some(match self {
            RuleAction::LocalPlayer => LineEvent::LocalPlayer(name()?),
            RuleAction::EnteredLobby => LineEvent::EnteredLobby,
            RuleAction::PlayerJoined => LineEvent::PlayerJoined(name()?),
            RuleAction::PlayerLeft => LineEvent::PlayerLeft(name()?),
            RuleAction::LateJoin => LineEvent::LateJoin(name()?),
            RuleAction::RosterRefresh => LineEvent::RosterRefresh(names()?),
            RuleAction::GameStarted => LineEvent::GameStarted,
            RuleAction::GameEnded(outcome) => LineEvent::GameEnded(outcome),
            RuleAction::PartyAttached => LineEvent::PartyAttached(name()?),
            RuleAction::PartyDetached => LineEvent::PartyDetached,
            RuleAction::PartyJoined => LineEvent::PartyJoined(names()?),
            RuleAction::PartyLeft => LineEvent::PartyLeft(names()?),
            RuleAction::PartyListIncoming => LineEvent::PartyListIncoming,
            RuleAction::PartyListed => LineEvent::PartyListed(names()?),
            RuleAction::Nicked => LineEvent::Nicked(name()?),
            RuleAction::NickAssigned => LineEvent::NickAssigned {
                nick: group("nick")?,
                account: group("account").filter(|a| !a.is_empty()),
            },
            RuleAction::ApiKeyIssued => LineEvent::ApiKeyIssued(group("key")?),
        })
    }
}

/// Split a player listing on commas, `●` bullets and whitespace, dropping `[RANK]` tags.
fn split_names(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c == '●' || c.is_whitespace())
        .filter(|token| !token.is_empty() && !(token.starts_with('[') && token.ends_with(']')))
        .map(String::from)
        .collect()
}

/// A literal prefix followed by a fully anchored regex body.
#[derive(Debug, Clone)]
pub struct LineRule {
    prefix: String,
    body: Regex,
    action: RuleAction,
}

impl LineRule {
    pub fn new(
        prefix: impl Into<String>,
        body: &str,
        action: RuleAction,
    ) -> Result<Self, PatternError> {
        let body = compile(&format!("^(?:{body})$"))?;

        if let Some(group) = action.required_group()
            && !body.capture_names().flatten().any(|n| n == group)
        {
            return Err(PatternError::MissingCapture {
                pattern: body.as_str().to_string(),
                group,
            });
        }

        Ok(Self {
            prefix: prefix.into(),
            body,
            action,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn action(&self) -> RuleAction {
        self.action
    }

    fn apply(&self, text: &str) -> Option<LineEvent> {
        let rest = text.strip_prefix(self.prefix.as_str())?;
        let caps = self.body.captures(rest.trim())?;
        self.action.build(&caps)
    }
}

/// Ordered line grammar: the first rule whose prefix and body match wins.
#[derive(Debug, Clone)]
pub struct PatternSet {
    header: Option<Regex>,
    rules: Vec<LineRule>,
}

impl PatternSet {
    /// An empty grammar. `header`, when given, must match at the start of
    /// every recognized line and is stripped before the rules run.
    pub fn new(header: Option<&str>) -> Result<Self, PatternError> {
        let header = header
            .map(|h| compile(&format!("^(?:{h})")))
            .transpose()?;
        Ok(Self {
            header,
            rules: Vec::new(),
        })
    }

    pub fn builtin(kind: GrammarKind) -> Result<Self, PatternError> {
        match kind {
            GrammarKind::Generic => Self::generic(),
            GrammarKind::Hypixel => Self::hypixel(),
        }
    }

    /// `[Lobby] PlayerA joined` style lines, with an optional `[hh:mm:ss] ` stamp.
    pub fn generic() -> Result<Self, PatternError> {
        use RuleAction::*;

        Self::new(Some(r"(?:\[\d{2}:\d{2}:\d{2}\] )?"))?
            .rule("[Client] ", &format!("Setting user: {NAME}"), LocalPlayer)?
            .rule("[Lobby] ", "You joined the lobby", EnteredLobby)?
            .rule("[Lobby] ", "Players: (?P<names>.+)", RosterRefresh)?
            .rule("[Lobby] ", &format!("{NAME} joined"), PlayerJoined)?
            .rule("[Lobby] ", &format!("{NAME} left"), PlayerLeft)?
            .rule("[Game] ", "The game has started", GameStarted)?
            .rule("[Game] ", "The game has ended", GameEnded(GameOutcome::Ended))?
            .rule("[Game] ", "Victory!?", GameEnded(GameOutcome::Victory))?
            .rule("[Game] ", "Defeat!?", GameEnded(GameOutcome::Defeat))?
            .rule("[Party] ", &format!("You joined {NAME}'s party"), PartyAttached)?
            .rule("[Party] ", "You left the party", PartyDetached)?
            .rule("[Party] ", "The party was disbanded", PartyDetached)?
            .rule("[Party] ", "Members: (?P<names>.+)", PartyListed)?
            .rule("[Party] ", &format!("{RANKED_NAMES} joined the party"), PartyJoined)?
            .rule("[Party] ", &format!("{RANKED_NAMES} left the party"), PartyLeft)?
            .rule("[Client] ", &format!("You are now nicked as {NAME}"), Nicked)?
            .rule("[Client] ", "API key: (?P<key>\\S+)", ApiKeyIssued)
    }

    /// Minecraft client log lines from the Hypixel network.
    ///
    /// The header skips the logger preamble up to the first client-thread
    /// marker, e.g. `[12:00:00] [Client thread/INFO]: ` or
    /// `... GuiNewChat (Client thread) Info `.
    pub fn hypixel() -> Result<Self, PatternError> {
        use RuleAction::*;

        Self::new(Some(r".*?(?:\[Client thread/INFO\]: |\(Client thread\) Info )"))?
            .rule("Setting user: ", NAME, LocalPlayer)?
            .rule("[LC] Setting user: ", NAME, LocalPlayer)?
            .rule("[CHAT] ", "Sending you to .*", EnteredLobby)?
            .rule(
                "[CHAT] ",
                "You were sent to a lobby because someone in your party left!",
                EnteredLobby,
            )?
            .rule("[CHAT] ", "ONLINE: (?P<names>.+)", RosterRefresh)?
            .rule("[CHAT] ", &format!(r"{NAME} has joined \(\d+/\d+\)!"), PlayerJoined)?
            .rule("[CHAT] ", &format!("{NAME} has quit!"), PlayerLeft)?
            .rule("[CHAT] ", "Bed Wars", GameStarted)?
            .rule("[CHAT] ", "1st Killer - .*", GameEnded(GameOutcome::Ended))?
            // Party
            .rule("[CHAT] ", "You left the party\\.", PartyDetached)?
            .rule("[CHAT] ", "You are not currently in a party\\.", PartyDetached)?
            .rule(
                "[CHAT] ",
                "The party was disbanded because all invites expired and the party was empty",
                PartyDetached,
            )?
            .rule("[CHAT] ", &format!("{RANK}{NAME} has disbanded the party!"), PartyDetached)?
            .rule("[CHAT] ", "You have been kicked from the party by .*", PartyDetached)?
            .rule("[CHAT] ", &format!("You have joined {RANK}{NAME}'s party!"), PartyAttached)?
            .rule("[CHAT] ", "You'll be partying with: (?P<names>.+)", PartyJoined)?
            .rule("[CHAT] ", &format!(r"{RANKED_NAMES} joined the party\."), PartyJoined)?
            .rule("[CHAT] ", &format!(r"{RANKED_NAMES} has left the party\."), PartyLeft)?
            .rule(
                "[CHAT] ",
                &format!(r"{RANKED_NAMES} has been removed from the party\."),
                PartyLeft,
            )?
            .rule(
                "[CHAT] ",
                &format!("{RANKED_NAMES} was removed from the party because they disconnected"),
                PartyLeft,
            )?
            .rule("[CHAT] ", r"Kicked (?P<names>.+) because they were offline\.", PartyLeft)?
            .rule(
                "[CHAT] ",
                &format!(r"The party was transferred to \S+(?: \S+)? because {RANKED_NAMES} left"),
                PartyLeft,
            )?
            .rule("[CHAT] ", r"Party Members \(\d+\)", PartyListIncoming)?
            .rule(
                "[CHAT] ",
                "Party (?:Leader|Moderators|Members): (?P<names>.+)",
                PartyListed,
            )?
            // Nicks and keys
            .rule("[CHAT] ", &format!("You are now nicked as {NAME}!"), Nicked)?
            .rule(
                "[CHAT] ",
                "Can't find a player by the name of '!(?P<nick>[A-Za-z0-9_]{1,16})=(?P<account>[A-Za-z0-9_]{0,16})'",
                NickAssigned,
            )?
            .rule("[CHAT] ", r"Your new API key is (?P<key>[0-9A-Za-z-]+)", ApiKeyIssued)
    }

    /// Prepend late-join rules so they win over a lobby rule with the same shape.
    pub fn with_late_join_rules(mut self, rules: &[LineRuleConfig]) -> Result<Self, PatternError> {
        let compiled = rules
            .iter()
            .map(|r| LineRule::new(r.prefix.clone(), &r.body, RuleAction::LateJoin))
            .collect::<Result<Vec<_>, _>>()?;
        self.rules.splice(0..0, compiled);
        Ok(self)
    }

    pub fn rule(
        mut self,
        prefix: &str,
        body: &str,
        action: RuleAction,
    ) -> Result<Self, PatternError> {
        self.rules.push(LineRule::new(prefix, body, action)?);
        Ok(self)
    }

    pub fn push(&mut self, rule: LineRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[LineRule] {
        &self.rules
    }

    /// Match one log line. Lines that no rule recognizes return `None`.
    pub fn match_line(&self, line: &str) -> Option<LineEvent> {
        let text = match &self.header {
            Some(header) => &line[header.find(line)?.end()..],
            None => line,
        };
        self.rules.iter().find_map(|rule| rule.apply(text))
    }
}

fn compile(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}
