//! Session parsing: log lines in, roster, party and phase changes out.

mod event;
mod machine;
mod nicks;
mod party;
mod patterns;
mod roster;

#[cfg(test)]
mod tests;

pub use event::{GameOutcome, LineEvent, SessionEvent, SessionPhase};
pub use machine::SessionStateMachine;
pub use nicks::NickMap;
pub use party::Party;
pub use patterns::{LineRule, PatternError, PatternSet, RuleAction};
pub use roster::{Player, RefreshOutcome, SessionRoster};
