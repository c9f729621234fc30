/// Members of the local player's party, in the order they were learned.
///
/// The local player counts as a member once known, and survives every
/// clear except a full session reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Party {
    members: Vec<String>,
}

impl Party {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    /// Returns false if already a member.
    pub fn add(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.members.push(name.to_string());
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != name);
        before != self.members.len()
    }

    /// Drop everyone except `keep` (the local player, when known).
    pub fn clear_except(&mut self, keep: Option<&str>) {
        self.members.clear();
        if let Some(name) = keep {
            self.members.push(name.to_string());
        }
    }
}
