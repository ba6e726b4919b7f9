//! Hierarchical, path-addressed object storage.
//!
//! Every component that touches persisted state goes through the
//! [`ObjectStore`] capability. Two adapters share the same surface:
//! - [`MemoryStore`]: deterministic in-process tree, used by tests
//! - [`RedbStore`]: ACID persistence in a single redb file, used by the CLI
//!
//! Paths are `user/elem/elem`. Writes require the parent directory to exist,
//! except that a user root may always be created with `make_directory`.

use std::io::{Cursor, Read, Write};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::error::{ConverseError, ConverseResult};
use crate::types::{DirEntry, PathName};

// Submodules
mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

/// The naming/storage service contract.
pub trait ObjectStore: Send + Sync {
    /// Read a whole object.
    fn get(&self, path: &PathName) -> ConverseResult<Vec<u8>>;

    /// Write (or overwrite) a whole object.
    fn put(&self, path: &PathName, data: &[u8]) -> ConverseResult<DirEntry>;

    /// Start writing an object. Nothing is stored until [`ObjectWriter::commit`].
    fn create(&self, path: &PathName) -> ConverseResult<ObjectWriter<'_>>;

    /// Stream an existing object.
    fn open(&self, path: &PathName) -> ConverseResult<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(self.get(path)?)))
    }

    /// Metadata for a path, or [`ConverseError::NotFound`].
    fn lookup(&self, path: &PathName) -> ConverseResult<DirEntry>;

    /// Create one directory. Fails with [`ConverseError::AlreadyExists`] if
    /// anything is already at `path`.
    fn make_directory(&self, path: &PathName) -> ConverseResult<DirEntry>;

    /// Entries whose path matches `pattern`, ordered by path.
    ///
    /// `*` matches any run of characters and `?` one character, both within a
    /// single path element.
    fn glob(&self, pattern: &str) -> ConverseResult<Vec<DirEntry>>;
}

/// Buffered writer returned by [`ObjectStore::create`].
///
/// The object appears in the store only when `commit` succeeds, so a copy
/// that fails midway leaves nothing behind. Dropping the writer discards it.
pub struct ObjectWriter<'a> {
    store: &'a dyn ObjectStore,
    path: PathName,
    buf: Vec<u8>,
}

impl<'a> ObjectWriter<'a> {
    pub(crate) fn new(store: &'a dyn ObjectStore, path: PathName) -> Self {
        Self {
            store,
            path,
            buf: Vec::new(),
        }
    }

    pub fn path(&self) -> &PathName {
        &self.path
    }

    /// Store the buffered bytes.
    pub fn commit(self) -> ConverseResult<DirEntry> {
        self.store.put(&self.path, &self.buf)
    }
}

impl Write for ObjectWriter<'_> {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Whether anything exists at `path`. Errors other than "not found" propagate.
pub fn exists(store: &dyn ObjectStore, path: &PathName) -> ConverseResult<bool> {
    match store.lookup(path) {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create `path` and every missing ancestor. Existing directories are fine.
pub fn make_dirs(store: &dyn ObjectStore, path: &PathName) -> ConverseResult<DirEntry> {
    if let Ok(entry) = store.lookup(path) {
        return require_dir(entry);
    }

    let mut dir: Option<PathName> = None;
    for elem in path.elements() {
        let next = match &dir {
            Some(d) => d.join(elem),
            None => PathName::parse(elem)?,
        };
        match store.make_directory(&next) {
            Ok(_) => debug!(path = %next, "Created directory"),
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e),
        }
        dir = Some(next);
    }

    require_dir(store.lookup(path)?)
}

fn require_dir(entry: DirEntry) -> ConverseResult<DirEntry> {
    if entry.is_dir() {
        Ok(entry)
    } else {
        Err(ConverseError::NotADirectory(entry.name.to_string()))
    }
}

/// Glob pattern for entries of `dir` matching `pattern`. The directory part
/// is escaped so user names and titles are matched literally.
pub fn glob_pattern(dir: &PathName, pattern: &str) -> String {
    format!("{}/{}", Pattern::escape(dir.as_str()), pattern)
}

/// Compile a store glob. `*` and `?` never cross a `/`.
pub(crate) fn compile_glob(pattern: &str) -> ConverseResult<Pattern> {
    Pattern::new(pattern)
        .map_err(|e| ConverseError::Storage(format!("bad glob pattern '{}': {}", pattern, e)))
}

pub(crate) fn glob_matches(pattern: &Pattern, path: &str) -> bool {
    pattern.matches_with(
        path,
        MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_match(pattern: &str, path: &str) -> bool {
        glob_matches(&compile_glob(pattern).unwrap(), path)
    }

    #[test]
    fn test_element_matching() {
        assert!(is_match("a/msg*-*.txt", "a/msg1-alice.txt"));
        assert!(is_match("a/msg*-*.txt", "a/msg12-bob@example.com.txt"));
        assert!(!is_match("a/msg*-*.txt", "a/msg1.txt"));
        assert!(!is_match("a/msg*-*.txt", "a/Access"));
        assert!(is_match("a/*", "a/b"));
        assert!(is_match("a/?", "a/b"));
        assert!(!is_match("a/?", "a/bc"));
    }

    #[test]
    fn test_star_does_not_cross_elements() {
        assert!(!is_match("a/*", "a/b/c"));
        assert!(is_match("a/*/*", "a/b/c"));
        assert!(!is_match("a/*", "a"));
    }

    #[test]
    fn test_directory_part_is_literal() {
        let dir = PathName::parse("alice/conversations/[draft] *").unwrap();
        let pattern = glob_pattern(&dir, "*");
        assert!(is_match(&pattern, "alice/conversations/[draft] */msg1-alice.txt"));
        assert!(!is_match(&pattern, "alice/conversations/d x/msg1-alice.txt"));
    }

    #[test]
    fn test_bad_pattern_is_storage_error() {
        let err = compile_glob("alice/[").unwrap_err();
        assert!(matches!(err, ConverseError::Storage(_)));
    }

    #[test]
    fn test_make_dirs_is_idempotent() {
        let store = MemoryStore::new();
        let dir = PathName::parse("alice/conversations/trip").unwrap();

        let first = make_dirs(&store, &dir).unwrap();
        assert!(first.is_dir());
        let second = make_dirs(&store, &dir).unwrap();
        assert_eq!(first, second);

        assert!(exists(&store, &PathName::parse("alice/conversations").unwrap()).unwrap());
    }

    #[test]
    fn test_make_dirs_rejects_object_in_the_way() {
        let store = MemoryStore::new();
        make_dirs(&store, &PathName::parse("alice").unwrap()).unwrap();
        store
            .put(&PathName::parse("alice/file").unwrap(), b"x")
            .unwrap();

        let err = make_dirs(&store, &PathName::parse("alice/file").unwrap()).unwrap_err();
        assert!(matches!(err, ConverseError::NotADirectory(_)));
    }

    #[test]
    fn test_writer_commits_only_on_commit() {
        let store = MemoryStore::new();
        let path = PathName::parse("alice/draft").unwrap();
        make_dirs(&store, &PathName::parse("alice").unwrap()).unwrap();

        {
            let mut w = store.create(&path).unwrap();
            w.write_all(b"half").unwrap();
            // dropped without commit
        }
        assert!(!exists(&store, &path).unwrap());

        let mut w = store.create(&path).unwrap();
        w.write_all(b"whole").unwrap();
        w.commit().unwrap();
        assert_eq!(store.get(&path).unwrap(), b"whole");
    }
}
