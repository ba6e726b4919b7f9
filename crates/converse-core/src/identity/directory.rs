//! Public-key directory
//!
//! Maps user names to verification keys. [`MemoryKeyDirectory`] serves tests;
//! [`crate::storage::RedbStore`] provides the persistent one.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::keypair::PublicKey;
use crate::error::{ConverseError, ConverseResult};
use crate::types::UserName;

/// Where users publish, and others find, public keys.
pub trait KeyDirectory: Send + Sync {
    /// Publish (or replace) a user's key.
    fn register_key(&self, user: &UserName, key: &PublicKey) -> ConverseResult<()>;

    /// Find a user's key, failing with [`ConverseError::KeyLookupFailed`].
    fn lookup_key(&self, user: &UserName) -> ConverseResult<PublicKey>;
}

/// Key directory held in memory.
#[derive(Debug, Default)]
pub struct MemoryKeyDirectory {
    keys: RwLock<HashMap<UserName, PublicKey>>,
}

impl MemoryKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyDirectory for MemoryKeyDirectory {
    fn register_key(&self, user: &UserName, key: &PublicKey) -> ConverseResult<()> {
        self.keys.write().insert(user.clone(), key.clone());
        Ok(())
    }

    fn lookup_key(&self, user: &UserName) -> ConverseResult<PublicKey> {
        self.keys
            .read()
            .get(user)
            .cloned()
            .ok_or_else(|| ConverseError::KeyLookupFailed {
                user: user.to_string(),
                reason: "no public key registered".to_string(),
            })
    }
}
