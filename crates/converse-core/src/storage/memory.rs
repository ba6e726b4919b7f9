//! In-memory object store
//!
//! A deterministic [`ObjectStore`] backed by an ordered map. Used by tests
//! and anywhere a throwaway namespace is handy.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{compile_glob, glob_matches, ObjectStore, ObjectWriter};
use crate::error::{ConverseError, ConverseResult};
use crate::types::{DirEntry, PathName};

#[derive(Clone, Debug)]
enum Node {
    Directory,
    Object(Vec<u8>),
}

/// Object store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<PathName, Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects (not directories) currently stored.
    pub fn object_count(&self) -> usize {
        self.nodes
            .read()
            .values()
            .filter(|n| matches!(n, Node::Object(_)))
            .count()
    }

    fn check_parent(nodes: &BTreeMap<PathName, Node>, path: &PathName) -> ConverseResult<()> {
        match path.parent() {
            None => Ok(()),
            Some(parent) => match nodes.get(&parent) {
                Some(Node::Directory) => Ok(()),
                Some(Node::Object(_)) => Err(ConverseError::NotADirectory(parent.to_string())),
                None => Err(ConverseError::NotFound(parent.to_string())),
            },
        }
    }

    fn entry(path: &PathName, node: &Node) -> DirEntry {
        match node {
            Node::Directory => DirEntry::directory(path.clone()),
            Node::Object(data) => DirEntry::object(path.clone(), data.len() as u64),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, path: &PathName) -> ConverseResult<Vec<u8>> {
        match self.nodes.read().get(path) {
            Some(Node::Object(data)) => Ok(data.clone()),
            Some(Node::Directory) => Err(ConverseError::Storage(format!(
                "'{}' is a directory",
                path
            ))),
            None => Err(ConverseError::NotFound(path.to_string())),
        }
    }

    fn put(&self, path: &PathName, data: &[u8]) -> ConverseResult<DirEntry> {
        if path.is_root() {
            return Err(ConverseError::Storage(format!(
                "cannot store an object at user root '{}'",
                path
            )));
        }
        let mut nodes = self.nodes.write();
        Self::check_parent(&nodes, path)?;
        if let Some(Node::Directory) = nodes.get(path) {
            return Err(ConverseError::AlreadyExists(path.to_string()));
        }
        nodes.insert(path.clone(), Node::Object(data.to_vec()));
        Ok(DirEntry::object(path.clone(), data.len() as u64))
    }

    fn create(&self, path: &PathName) -> ConverseResult<ObjectWriter<'_>> {
        Self::check_parent(&self.nodes.read(), path)?;
        Ok(ObjectWriter::new(self, path.clone()))
    }

    fn lookup(&self, path: &PathName) -> ConverseResult<DirEntry> {
        self.nodes
            .read()
            .get(path)
            .map(|node| Self::entry(path, node))
            .ok_or_else(|| ConverseError::NotFound(path.to_string()))
    }

    fn make_directory(&self, path: &PathName) -> ConverseResult<DirEntry> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(path) {
            return Err(ConverseError::AlreadyExists(path.to_string()));
        }
        Self::check_parent(&nodes, path)?;
        nodes.insert(path.clone(), Node::Directory);
        Ok(DirEntry::directory(path.clone()))
    }

    fn glob(&self, pattern: &str) -> ConverseResult<Vec<DirEntry>> {
        let pattern = compile_glob(pattern)?;
        Ok(self
            .nodes
            .read()
            .iter()
            .filter(|(path, _)| glob_matches(&pattern, path.as_str()))
            .map(|(path, node)| Self::entry(path, node))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathName {
        PathName::parse(s).unwrap()
    }

    #[test]
    fn test_put_requires_parent() {
        let store = MemoryStore::new();
        let err = store.put(&p("alice/x"), b"data").unwrap_err();
        assert!(err.is_not_found());

        store.make_directory(&p("alice")).unwrap();
        store.put(&p("alice/x"), b"data").unwrap();
        assert_eq!(store.get(&p("alice/x")).unwrap(), b"data");
    }

    #[test]
    fn test_make_directory_twice_fails() {
        let store = MemoryStore::new();
        store.make_directory(&p("alice")).unwrap();
        let err = store.make_directory(&p("alice")).unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_lookup_and_get_missing() {
        let store = MemoryStore::new();
        assert!(store.lookup(&p("bob/nothing")).unwrap_err().is_not_found());
        assert!(store.get(&p("bob/nothing")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.make_directory(&p("alice")).unwrap();
        store.put(&p("alice/Access"), b"one").unwrap();
        store.put(&p("alice/Access"), b"two").unwrap();
        assert_eq!(store.get(&p("alice/Access")).unwrap(), b"two");
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn test_glob_is_sorted_and_flags_directories() {
        let store = MemoryStore::new();
        store.make_directory(&p("alice")).unwrap();
        store.make_directory(&p("alice/sub")).unwrap();
        store.put(&p("alice/b"), b"2").unwrap();
        store.put(&p("alice/a"), b"1").unwrap();

        let ents = store.glob("alice/*").unwrap();
        let names: Vec<_> = ents.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alice/a", "alice/b", "alice/sub"]);
        assert!(ents[2].is_dir());
        assert_eq!(ents[0].size, 1);
    }

    #[test]
    fn test_open_streams_object() {
        use std::io::Read;

        let store = MemoryStore::new();
        store.make_directory(&p("alice")).unwrap();
        store.put(&p("alice/note"), b"hello").unwrap();

        let mut out = String::new();
        store
            .open(&p("alice/note"))
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello");
    }
}
