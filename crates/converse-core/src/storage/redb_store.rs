//! Persistent object store using redb.
//!
//! One database file holds the whole namespace:
//! - objects (path -> bytes)
//! - directories (path -> creation time)
//! - signing seeds for local users
//! - the public-key directory

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use super::{compile_glob, glob_matches, ObjectStore, ObjectWriter};
use crate::error::{ConverseError, ConverseResult};
use crate::identity::{KeyDirectory, PublicKey};
use crate::types::{DirEntry, PathName, UserName};

// Table definitions
const OBJECTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");
const DIRECTORIES_TABLE: TableDefinition<&str, i64> = TableDefinition::new("directories");
const IDENTITY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("identity");
const PUBLIC_KEYS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("public_keys");

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<RwLock<Database>>,
}

impl RedbStore {
    /// Open or create the database at `path`, creating parent directories
    /// and all tables as needed.
    pub fn new(path: impl AsRef<Path>) -> ConverseResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(OBJECTS_TABLE)?;
            let _ = write_txn.open_table(DIRECTORIES_TABLE)?;
            let _ = write_txn.open_table(IDENTITY_TABLE)?;
            let _ = write_txn.open_table(PUBLIC_KEYS_TABLE)?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), "Opened redb store");
        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Signing Key Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Save a local user's 32-byte signing seed.
    pub fn save_secret_key(&self, user: &UserName, seed: &[u8; 32]) -> ConverseResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(IDENTITY_TABLE)?;
            table.insert(user.as_str(), seed.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load a local user's signing seed, if one was saved.
    pub fn load_secret_key(&self, user: &UserName) -> ConverseResult<Option<[u8; 32]>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(IDENTITY_TABLE)?;

        match table.get(user.as_str())? {
            Some(v) => {
                let seed: [u8; 32] = v.value().try_into().map_err(|_| {
                    ConverseError::Identity(format!("stored key for {} is corrupt", user))
                })?;
                Ok(Some(seed))
            }
            None => Ok(None),
        }
    }
}

impl ObjectStore for RedbStore {
    fn get(&self, path: &PathName) -> ConverseResult<Vec<u8>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let objects = read_txn.open_table(OBJECTS_TABLE)?;

        if let Some(v) = objects.get(path.as_str())? {
            return Ok(v.value().to_vec());
        }
        let dirs = read_txn.open_table(DIRECTORIES_TABLE)?;
        if dirs.get(path.as_str())?.is_some() {
            return Err(ConverseError::Storage(format!("'{}' is a directory", path)));
        }
        Err(ConverseError::NotFound(path.to_string()))
    }

    fn put(&self, path: &PathName, data: &[u8]) -> ConverseResult<DirEntry> {
        if path.is_root() {
            return Err(ConverseError::Storage(format!(
                "cannot store an object at user root '{}'",
                path
            )));
        }

        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let dirs = write_txn.open_table(DIRECTORIES_TABLE)?;
            let mut objects = write_txn.open_table(OBJECTS_TABLE)?;
            check_parent(&dirs, &objects, path)?;
            if dirs.get(path.as_str())?.is_some() {
                return Err(ConverseError::AlreadyExists(path.to_string()));
            }
            objects.insert(path.as_str(), data)?;
        }
        write_txn.commit()?;
        Ok(DirEntry::object(path.clone(), data.len() as u64))
    }

    fn create(&self, path: &PathName) -> ConverseResult<ObjectWriter<'_>> {
        {
            let db = self.db.read();
            let read_txn = db.begin_read()?;
            let dirs = read_txn.open_table(DIRECTORIES_TABLE)?;
            let objects = read_txn.open_table(OBJECTS_TABLE)?;
            check_parent(&dirs, &objects, path)?;
        }
        Ok(ObjectWriter::new(self, path.clone()))
    }

    fn lookup(&self, path: &PathName) -> ConverseResult<DirEntry> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let dirs = read_txn.open_table(DIRECTORIES_TABLE)?;
        if dirs.get(path.as_str())?.is_some() {
            return Ok(DirEntry::directory(path.clone()));
        }
        let objects = read_txn.open_table(OBJECTS_TABLE)?;
        match objects.get(path.as_str())? {
            Some(v) => Ok(DirEntry::object(path.clone(), v.value().len() as u64)),
            None => Err(ConverseError::NotFound(path.to_string())),
        }
    }

    fn make_directory(&self, path: &PathName) -> ConverseResult<DirEntry> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut dirs = write_txn.open_table(DIRECTORIES_TABLE)?;
            let objects = write_txn.open_table(OBJECTS_TABLE)?;
            if dirs.get(path.as_str())?.is_some() || objects.get(path.as_str())?.is_some() {
                return Err(ConverseError::AlreadyExists(path.to_string()));
            }
            check_parent(&dirs, &objects, path)?;
            dirs.insert(path.as_str(), chrono::Utc::now().timestamp())?;
        }
        write_txn.commit()?;
        Ok(DirEntry::directory(path.clone()))
    }

    fn glob(&self, pattern: &str) -> ConverseResult<Vec<DirEntry>> {
        let pattern = compile_glob(pattern)?;
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let dirs = read_txn.open_table(DIRECTORIES_TABLE)?;
        let objects = read_txn.open_table(OBJECTS_TABLE)?;

        let mut entries = Vec::new();
        for entry in dirs.iter()? {
            let (key, _) = entry?;
            if glob_matches(&pattern, key.value()) {
                entries.push(DirEntry::directory(PathName::parse(key.value())?));
            }
        }
        for entry in objects.iter()? {
            let (key, value) = entry?;
            if glob_matches(&pattern, key.value()) {
                entries.push(DirEntry::object(
                    PathName::parse(key.value())?,
                    value.value().len() as u64,
                ));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

impl KeyDirectory for RedbStore {
    fn register_key(&self, user: &UserName, key: &PublicKey) -> ConverseResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(PUBLIC_KEYS_TABLE)?;
            table.insert(user.as_str(), key.to_bytes().as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn lookup_key(&self, user: &UserName) -> ConverseResult<PublicKey> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(PUBLIC_KEYS_TABLE)?;

        match table.get(user.as_str())? {
            Some(v) => PublicKey::from_bytes(v.value()),
            None => Err(ConverseError::KeyLookupFailed {
                user: user.to_string(),
                reason: "no public key registered".to_string(),
            }),
        }
    }
}

fn check_parent(
    dirs: &impl ReadableTable<&'static str, i64>,
    objects: &impl ReadableTable<&'static str, &'static [u8]>,
    path: &PathName,
) -> ConverseResult<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if dirs.get(parent.as_str())?.is_some() {
        Ok(())
    } else if objects.get(parent.as_str())?.is_some() {
        Err(ConverseError::NotADirectory(parent.to_string()))
    } else {
        Err(ConverseError::NotFound(parent.to_string()))
    }
}
