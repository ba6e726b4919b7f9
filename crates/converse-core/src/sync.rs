//! Replica synchronization
//!
//! Pulls every object under a source tree into the same relative place under
//! a destination tree, skipping anything the destination already has. Message
//! names are identical in every replica, so "already exists" also means
//! "already have it". Nothing is overwritten, deleted or merged, and `Access`
//! objects are never copied: they are each replica's own policy.

use std::io;

use tracing::{debug, info};

use crate::conversation::{conversation_dir, ACCESS_FILE};
use crate::error::{ConverseError, ConverseResult};
use crate::session::Session;
use crate::storage::{exists, glob_pattern, make_dirs, ObjectStore};
use crate::types::{DirEntry, PathName, UserName};

/// Outcome of a [`synchronize`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Destination paths that were written
    pub copied: Vec<PathName>,
    /// Destination paths that already existed
    pub skipped: Vec<PathName>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.copied.is_empty()
    }
}

/// Every object below `dir`, depth first, leaving out `Access` objects.
pub fn recursive_list(store: &dyn ObjectStore, dir: &PathName) -> ConverseResult<Vec<DirEntry>> {
    let mut files = Vec::new();
    for entry in store.glob(&glob_pattern(dir, "*"))? {
        if entry.name.base() == ACCESS_FILE {
            continue;
        }
        if entry.is_dir() {
            files.extend(recursive_list(store, &entry.name)?);
        } else {
            files.push(entry);
        }
    }
    Ok(files)
}

/// Copy what `dst` is missing from `src`.
///
/// Each object is written whole or not at all, but the first failure aborts
/// the pass and earlier copies stay in place.
pub fn synchronize(store: &dyn ObjectStore, src: &PathName, dst: &PathName) -> ConverseResult<SyncReport> {
    let mut report = SyncReport::default();

    for entry in recursive_list(store, src)? {
        let rel = entry.name.relative_to(src).ok_or_else(|| {
            ConverseError::Storage(format!("'{}' is not below '{}'", entry.name, src))
        })?;
        let target = dst.join(rel);

        if exists(store, &target)? {
            debug!(path = %target, "Destination exists, skipping");
            report.skipped.push(target);
            continue;
        }

        copy_object(store, &entry.name, &target)?;
        debug!(from = %entry.name, to = %target, "Copied object");
        report.copied.push(target);
    }

    info!(
        %src,
        %dst,
        copied = report.copied.len(),
        skipped = report.skipped.len(),
        "Synchronized"
    );
    Ok(report)
}

fn copy_object(store: &dyn ObjectStore, src: &PathName, dst: &PathName) -> ConverseResult<DirEntry> {
    if let Some(parent) = dst.parent() {
        make_dirs(store, &parent)?;
    }
    let mut reader = store.open(src)?;
    let mut writer = store.create(dst)?;
    io::copy(&mut reader, &mut writer)?;
    writer.commit()
}

/// Pull `peer`'s replica of a conversation into the session user's own.
pub fn sync_conversation(session: &Session, peer: &UserName, title: &str) -> ConverseResult<SyncReport> {
    let src = conversation_dir(peer, title)?;
    let dst = conversation_dir(session.user(), title)?;
    synchronize(session.store(), &src, &dst)
}
