//! Session: the storage and identity handles every operation runs against.
//!
//! There is no global state. Callers build a [`Session`] once and pass it to
//! conversation, publishing and sync operations.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::{ConverseError, ConverseResult};
use crate::identity::{Ed25519Identity, IdentityService};
use crate::storage::{ObjectStore, RedbStore};
use crate::types::UserName;

/// File name of the persistent store inside a data directory.
pub const DATABASE_FILE: &str = "converse.redb";

/// One user's view of the storage and identity services.
#[derive(Clone)]
pub struct Session {
    user: UserName,
    store: Arc<dyn ObjectStore>,
    identity: Arc<dyn IdentityService>,
}

impl Session {
    pub fn new(store: Arc<dyn ObjectStore>, identity: Arc<dyn IdentityService>) -> Self {
        Self {
            user: identity.user().clone(),
            store,
            identity,
        }
    }

    /// Open the store in `data_dir` as an existing user.
    ///
    /// Fails if `user` has no signing key there yet.
    pub fn open(data_dir: impl AsRef<Path>, user: &UserName) -> ConverseResult<Self> {
        let store = RedbStore::new(data_dir.as_ref().join(DATABASE_FILE))?;
        let seed = store.load_secret_key(user)?.ok_or_else(|| {
            ConverseError::Identity(format!(
                "no signing key for {}; run `converse init` first",
                user
            ))
        })?;

        let identity = Ed25519Identity::from_seed(user.clone(), &seed, Arc::new(store.clone()));
        Ok(Self::new(Arc::new(store), Arc::new(identity)))
    }

    /// Open the store in `data_dir`, creating and publishing a signing key
    /// for `user` if there is none.
    pub fn init(data_dir: impl AsRef<Path>, user: &UserName) -> ConverseResult<Self> {
        let store = RedbStore::new(data_dir.as_ref().join(DATABASE_FILE))?;
        let directory = Arc::new(store.clone());

        let identity = match store.load_secret_key(user)? {
            Some(seed) => Ed25519Identity::from_seed(user.clone(), &seed, directory),
            None => {
                let identity = Ed25519Identity::generate(user.clone(), directory)?;
                store.save_secret_key(user, &identity.seed())?;
                info!(%user, fingerprint = %identity.public_key().fingerprint(), "Created identity");
                identity
            }
        };
        identity.publish()?;

        Ok(Self::new(Arc::new(store), Arc::new(identity)))
    }

    pub fn user(&self) -> &UserName {
        &self.user
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn identity(&self) -> &dyn IdentityService {
        self.identity.as_ref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("user", &self.user).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_requires_init() {
        let dir = tempdir().unwrap();
        let err = Session::open(dir.path(), &"alice".into()).unwrap_err();
        assert!(matches!(err, ConverseError::Identity(_)));
    }

    #[test]
    fn test_init_then_open_keeps_key() {
        let dir = tempdir().unwrap();
        let alice: UserName = "alice".into();

        let first = Session::init(dir.path(), &alice).unwrap();
        let key = first.identity().public_key_lookup(&alice).unwrap();
        drop(first);

        let again = Session::open(dir.path(), &alice).unwrap();
        assert_eq!(again.user(), &alice);
        assert_eq!(again.identity().public_key_lookup(&alice).unwrap(), key);
    }
}
