//! Message object names
//!
//! A message is stored as `msg<sequence>-<author>.txt`. The sequence number is
//! derived from the parent (`parent + 1`, or 1 for the first message), so the
//! same message names itself identically in every replica. Two users replying
//! to the same parent get the same sequence number with different author
//! suffixes: the names stay unique but the number alone cannot order them.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConverseError, ConverseResult};
use crate::types::UserName;

pub const MSG_PREFIX: &str = "msg";
pub const MSG_EXTENSION: &str = "txt";

/// Glob that matches message objects inside a conversation directory.
pub const MSG_PATTERN: &str = "msg*-*.txt";

/// Name of a message object, e.g. `msg7-alice@example.com.txt`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MsgName {
    number: u64,
    user: UserName,
}

impl MsgName {
    pub fn new(user: UserName, number: u64) -> Self {
        Self { number, user }
    }

    /// Name for a message by `user` replying to `parent`.
    pub fn next(parent: Option<&MsgName>, user: &UserName) -> Self {
        let number = parent.map_or(1, |p| p.number + 1);
        Self::new(user.clone(), number)
    }

    /// Parse an object name, rejecting anything that is not
    /// `msg<digits>-<author>.txt`.
    pub fn parse(name: &str) -> ConverseResult<Self> {
        let invalid = || ConverseError::InvalidMessageName(name.to_string());

        let rest = name.strip_prefix(MSG_PREFIX).ok_or_else(invalid)?;
        let stem = rest
            .strip_suffix(MSG_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .ok_or_else(invalid)?;

        let (digits, user) = stem.split_once('-').ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || user.is_empty() {
            return Err(invalid());
        }
        let number = digits.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self::new(UserName::new(user), number))
    }

    /// Sequence number within the thread.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Author encoded in the name.
    pub fn user(&self) -> &UserName {
        &self.user
    }
}

impl fmt::Display for MsgName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}.{}", MSG_PREFIX, self.number, self.user, MSG_EXTENSION)
    }
}

impl FromStr for MsgName {
    type Err = ConverseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
