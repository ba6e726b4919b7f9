//! Core type definitions for Converse
//!
//! Users and storage paths are plain strings on the wire; the newtypes here
//! keep them from being mixed up and carry the path arithmetic the store,
//! the synchronizer and the conversation layer all share.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConverseError, ConverseResult};

/// A user identifier, usually an email-like address (`alice@example.com`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A hierarchical storage path of the form `user/elem/elem`.
///
/// The first element names the user whose tree the path lives in. Paths are
/// kept in clean form: no leading or trailing slash, no empty elements.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathName(String);

impl PathName {
    /// Build a clean path from a slash-separated string.
    ///
    /// Fails on empty paths and on `.`/`..` elements.
    pub fn parse(s: &str) -> ConverseResult<Self> {
        let elems: Vec<&str> = s.split('/').filter(|e| !e.is_empty()).collect();
        if elems.is_empty() {
            return Err(ConverseError::Storage(format!("empty path '{}'", s)));
        }
        if elems.iter().any(|e| *e == "." || *e == "..") {
            return Err(ConverseError::Storage(format!(
                "relative elements are not allowed in '{}'",
                s
            )));
        }
        Ok(Self(elems.join("/")))
    }

    /// The root path of a user's tree.
    pub fn root(user: &UserName) -> Self {
        Self(user.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn is_root(&self) -> bool {
        !self.0.contains('/')
    }

    /// Append one or more slash-separated elements.
    pub fn join(&self, rel: &str) -> Self {
        let mut out = self.0.clone();
        for elem in rel.split('/').filter(|e| !e.is_empty()) {
            out.push('/');
            out.push_str(elem);
        }
        Self(out)
    }

    /// Parent directory, or `None` for a user root.
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|i| Self(self.0[..i].to_string()))
    }

    /// Final path element.
    pub fn base(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    /// The part of this path below `prefix`, if `prefix` is a proper ancestor.
    pub fn relative_to(&self, prefix: &PathName) -> Option<&str> {
        self.0
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }
}

impl fmt::Display for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a directory entry is an object or a directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Object,
    Directory,
}

/// Metadata returned by the storage service for one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: PathName,
    pub kind: EntryKind,
    /// Object length in bytes (0 for directories)
    pub size: u64,
}

impl DirEntry {
    pub fn object(name: PathName, size: u64) -> Self {
        Self {
            name,
            kind: EntryKind::Object,
            size,
        }
    }

    pub fn directory(name: PathName) -> Self {
        Self {
            name,
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
