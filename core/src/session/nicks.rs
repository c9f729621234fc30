use hashbrown::HashMap;

/// Nick -> account name mapping used to look up nicked players' stats.
///
/// Outlives session resets; entries come from configuration, from the
/// local player's own `/nick` and from whispered `!nick=account` commands.
#[derive(Debug, Clone, Default)]
pub struct NickMap {
    accounts: HashMap<String, String>,
    own_nick: Option<String>,
}

impl NickMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_known<I, K, V>(known: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            accounts: known
                .into_iter()
                .map(|(nick, account)| (nick.into(), account.into()))
                .collect(),
            own_nick: None,
        }
    }

    /// Account behind `name`, if it is a known nick.
    pub fn account(&self, name: &str) -> Option<&str> {
        self.accounts.get(name).map(String::as_str)
    }

    /// Name to fetch stats for: the account behind a known nick, else the name itself.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.account(name).unwrap_or(name)
    }

    pub fn own_nick(&self) -> Option<&str> {
        self.own_nick.as_deref()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Map `nick` to `account`, or forget it when `account` is `None`.
    ///
    /// Returns the account previously mapped to the nick.
    pub fn assign(&mut self, nick: &str, account: Option<&str>) -> Option<String> {
        match account {
            Some(account) => self.accounts.insert(nick.to_string(), account.to_string()),
            None => self.accounts.remove(nick),
        }
    }

    /// The local player took a new nick; the previous one stops resolving.
    ///
    /// Returns the replaced nick.
    pub fn set_own(&mut self, nick: &str, local_player: Option<&str>) -> Option<String> {
        let previous = self.own_nick.replace(nick.to_string());
        if let Some(old) = previous.as_deref()
            && old != nick
        {
            self.accounts.remove(old);
        }
        if let Some(account) = local_player {
            self.accounts.insert(nick.to_string(), account.to_string());
        }
        previous.filter(|old| old != nick)
    }
}
