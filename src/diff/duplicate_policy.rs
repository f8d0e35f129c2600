use std::fmt;

use serde::Deserialize;

/// How repeated keys inside one snapshot are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    #[default]
    LastWins,
    FirstWins,
    /// Capture fails for the collection. The diff itself falls back to last-wins.
    Reject,
}

impl fmt::Display for DuplicateKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastWins => write!(f, "last_wins"),
            Self::FirstWins => write!(f, "first_wins"),
            Self::Reject => write!(f, "reject"),
        }
    }
}
