//! Access grants and participant membership
//!
//! A conversation directory may hold an `Access` object listing who may do
//! what. The format is one grant per line:
//!
//! ```text
//! *: alice@example.com
//! read,create,list: bob@example.com
//! ```
//!
//! Rights are `read`, `write`, `list`, `create`, `delete` (or their first
//! letters), or `*` for all of them. Users are comma separated; `*` or `all`
//! grants to everyone. `#` starts a comment.
//!
//! Grants are append-only text. Two replicas that each add a participant
//! produce diverging files and nothing here reconciles them.

use tracing::{debug, warn};

use super::Conversation;
use crate::error::{ConverseError, ConverseResult};
use crate::session::Session;
use crate::storage::make_dirs;
use crate::types::{DirEntry, UserName};

/// Name of the grant object inside a conversation directory.
pub const ACCESS_FILE: &str = "Access";

/// Rights appended for each new participant.
pub const PARTICIPANT_RIGHTS: &str = "read,create,list";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Right {
    Read,
    Write,
    List,
    Create,
    Delete,
}

impl Right {
    pub const ALL: [Right; 5] = [Right::Read, Right::Write, Right::List, Right::Create, Right::Delete];

    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "read" | "r" => Some(Right::Read),
            "write" | "w" => Some(Right::Write),
            "list" | "l" => Some(Right::List),
            "create" | "c" => Some(Right::Create),
            "delete" | "d" => Some(Right::Delete),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Grantee {
    Everyone,
    User(UserName),
}

#[derive(Clone, Debug)]
struct Grant {
    rights: Vec<Right>,
    users: Vec<Grantee>,
}

/// Parsed contents of an `Access` object.
#[derive(Clone, Debug, Default)]
pub struct AccessGrant {
    grants: Vec<Grant>,
}

impl AccessGrant {
    pub fn parse(data: &[u8]) -> ConverseResult<Self> {
        let text = std::str::from_utf8(data).map_err(|_| ConverseError::MalformedGrant {
            line: 0,
            reason: "grant is not valid UTF-8".to_string(),
        })?;

        let mut grants = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let malformed = |reason: &str| ConverseError::MalformedGrant {
                line,
                reason: reason.to_string(),
            };

            let content = raw.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }

            let (rights_text, users_text) = content
                .split_once(':')
                .ok_or_else(|| malformed("missing ':' between rights and users"))?;

            let mut rights = Vec::new();
            for word in split_list(rights_text) {
                if word == "*" {
                    rights.extend(Right::ALL);
                } else {
                    rights.push(Right::parse(word).ok_or_else(|| malformed("unknown right"))?);
                }
            }
            if rights.is_empty() {
                return Err(malformed("no rights listed"));
            }

            let users: Vec<Grantee> = split_list(users_text)
                .map(|u| match u {
                    "*" | "all" => Grantee::Everyone,
                    _ => Grantee::User(UserName::new(u)),
                })
                .collect();
            if users.is_empty() {
                return Err(malformed("no users listed"));
            }

            grants.push(Grant { rights, users });
        }

        Ok(Self { grants })
    }

    /// Whether `user` holds `right`, directly or through a wildcard.
    pub fn allows(&self, user: &UserName, right: Right) -> bool {
        self.grants
            .iter()
            .filter(|g| g.rights.contains(&right))
            .flat_map(|g| g.users.iter())
            .any(|u| match u {
                Grantee::Everyone => true,
                Grantee::User(name) => name == user,
            })
    }

    /// Named users holding the read right, in grant order, without duplicates.
    pub fn readers(&self) -> Vec<UserName> {
        let mut readers: Vec<UserName> = Vec::new();
        for grant in self.grants.iter().filter(|g| g.rights.contains(&Right::Read)) {
            for grantee in &grant.users {
                if let Grantee::User(name) = grantee {
                    if !readers.contains(name) {
                        readers.push(name.clone());
                    }
                }
            }
        }
        readers
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

/// Read and parse a conversation's grant, `None` if it has none.
pub fn read_access(session: &Session, conv: &Conversation) -> ConverseResult<Option<AccessGrant>> {
    let Some(path) = conv.location().map(|l| l.join(ACCESS_FILE)) else {
        return Ok(None);
    };
    match session.store().get(&path) {
        Ok(data) => AccessGrant::parse(&data).map(Some),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether `user` may read the conversation. No grant means no access.
pub fn has_access(session: &Session, conv: &Conversation, user: &UserName) -> ConverseResult<bool> {
    Ok(read_access(session, conv)?.is_some_and(|grant| grant.allows(user, Right::Read)))
}

impl Conversation {
    /// Grant `user` read, create and list rights, and record them as a
    /// participant.
    ///
    /// A user the persisted grant already lets read is left alone. Authors
    /// inferred from the thread are not granted until this appends their
    /// line. The grant starts as a full grant to the owner when none exists.
    /// The participant list is updated even when writing the grant fails.
    pub fn add_participant(
        &mut self,
        session: &Session,
        user: &UserName,
    ) -> ConverseResult<Option<DirEntry>> {
        let location = self
            .location()
            .cloned()
            .ok_or(ConverseError::UntitledConversation)?;

        let existing = read_access(session, self)?;
        if existing.as_ref().is_some_and(|g| g.allows(user, Right::Read)) {
            debug!(%user, "Already granted");
            self.record_participant(user);
            return Ok(None);
        }

        let path = location.join(ACCESS_FILE);
        let mut data = match existing {
            Some(_) => session.store().get(&path)?,
            None => format!("*: {}", self.owner).into_bytes(),
        };
        data.extend_from_slice(format!("\n{}: {}", PARTICIPANT_RIGHTS, user).as_bytes());

        self.record_participant(user);
        let written =
            make_dirs(session.store(), &location).and_then(|_| session.store().put(&path, &data));
        match &written {
            Ok(_) => debug!(%user, path = %path, "Added participant"),
            Err(e) => warn!(%user, error = %e, "Participant recorded but grant not written"),
        }
        written.map(Some)
    }

    fn record_participant(&mut self, user: &UserName) {
        if !self.participants.contains(user) {
            self.participants.push(user.clone());
        }
    }
}
