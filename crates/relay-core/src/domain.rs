use std::fmt;

use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// A broadcast target: a group chat or an individual user.
///
/// Negative ids are groups and positive ids are users. That is a Telegram
/// convention, not something the store enforces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipient(pub i64);

impl Recipient {
    pub fn is_group(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Recipient {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
