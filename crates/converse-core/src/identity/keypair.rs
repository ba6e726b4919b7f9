//! Ed25519 identity provider
//!
//! Holds one user's signing key and a handle to the shared public-key
//! directory. The public key is registered in the directory when the
//! identity is created, which is how other users find it for verification.

use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use super::directory::KeyDirectory;
use super::signature::Signature;
use super::IdentityService;
use crate::error::{ConverseError, ConverseResult};
use crate::types::UserName;

/// A user's published verification key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> ConverseResult<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ConverseError::Identity("public key must be 32 bytes".to_string()))?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|e| ConverseError::Identity(format!("invalid public key: {}", e)))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Base58 form, for display and export.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0.as_bytes()).into_string()
    }

    /// Short hex fingerprint (first 8 bytes).
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0.as_bytes()[..8])
    }

    pub(crate) fn verify(&self, hash: &[u8], signature: &Signature) -> bool {
        let sig = ed25519_dalek::Signature::from_bytes(&signature.to_bytes());
        self.0.verify(hash, &sig).is_ok()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_base58()).finish()
    }
}

/// Identity provider backed by an Ed25519 signing key.
pub struct Ed25519Identity {
    user: UserName,
    signing_key: SigningKey,
    directory: Arc<dyn KeyDirectory>,
}

impl Ed25519Identity {
    /// Generate a fresh key for `user` and publish it in `directory`.
    pub fn generate(user: UserName, directory: Arc<dyn KeyDirectory>) -> ConverseResult<Self> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed)
            .map_err(|e| ConverseError::Identity(format!("failed to get random bytes: {}", e)))?;
        let identity = Self::from_seed(user, &seed, directory);
        identity.publish()?;
        Ok(identity)
    }

    /// Rebuild an identity from a stored seed. The key is not re-published.
    pub fn from_seed(user: UserName, seed: &[u8; 32], directory: Arc<dyn KeyDirectory>) -> Self {
        Self {
            user,
            signing_key: SigningKey::from_bytes(seed),
            directory,
        }
    }

    /// Register this identity's public key in the directory.
    pub fn publish(&self) -> ConverseResult<()> {
        self.directory.register_key(&self.user, &self.public_key())
    }

    /// The 32-byte seed, for persistence.
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }
}

impl IdentityService for Ed25519Identity {
    fn user(&self) -> &UserName {
        &self.user
    }

    fn sign(&self, hash: &[u8]) -> ConverseResult<Signature> {
        Ok(Signature::from_bytes(&self.signing_key.sign(hash).to_bytes()))
    }

    fn verify(&self, hash: &[u8], signature: &Signature, key: &PublicKey) -> bool {
        key.verify(hash, signature)
    }

    fn public_key_lookup(&self, user: &UserName) -> ConverseResult<PublicKey> {
        self.directory.lookup_key(user)
    }
}

impl std::fmt::Debug for Ed25519Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Identity")
            .field("user", &self.user)
            .field("public_key", &self.public_key().to_base58())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryKeyDirectory;

    #[test]
    fn test_generate_publishes_key() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        let alice = Ed25519Identity::generate("alice".into(), directory.clone()).unwrap();

        let published = directory.lookup_key(&"alice".into()).unwrap();
        assert_eq!(published, alice.public_key());
    }

    #[test]
    fn test_seed_roundtrip() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        let alice = Ed25519Identity::generate("alice".into(), directory.clone()).unwrap();
        let restored = Ed25519Identity::from_seed("alice".into(), &alice.seed(), directory);

        assert_eq!(alice.public_key(), restored.public_key());
        let hash = [3u8; 32];
        let sig = restored.sign(&hash).unwrap();
        assert!(alice.verify(&hash, &sig, &alice.public_key()));
    }

    #[test]
    fn test_tampered_hash_fails() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        let alice = Ed25519Identity::generate("alice".into(), directory).unwrap();

        let sig = alice.sign(&[4u8; 32]).unwrap();
        assert!(!alice.verify(&[5u8; 32], &sig, &alice.public_key()));
    }

    #[test]
    fn test_public_key_bytes_roundtrip() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        let alice = Ed25519Identity::generate("alice".into(), directory).unwrap();
        let key = alice.public_key();

        assert_eq!(PublicKey::from_bytes(&key.to_bytes()).unwrap(), key);
        assert!(PublicKey::from_bytes(&[1u8; 5]).is_err());
        assert_eq!(key.fingerprint().len(), 16);
    }

    #[test]
    fn test_debug_hides_secret() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        let alice = Ed25519Identity::generate("alice".into(), directory).unwrap();
        let debug = format!("{:?}", alice);
        assert!(debug.contains("public_key"));
        assert!(!debug.contains(&hex::encode(alice.seed())));
    }
}
