//! Identity service for Converse
//!
//! Signing, verification and public-key lookup live behind the
//! [`IdentityService`] trait so message code never touches key material
//! directly. The bundled provider is [`Ed25519Identity`]:
//!
//! - **Signing**: Ed25519 over the SHA-256 hash of a message's signable payload
//! - **Signatures**: the 64-byte signature split into two integers, R and S
//! - **Key directory**: public keys are found by user name through a
//!   [`KeyDirectory`], never taken from the message being verified
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use converse_core::identity::{Ed25519Identity, IdentityService, MemoryKeyDirectory};
//!
//! let directory = Arc::new(MemoryKeyDirectory::new());
//! let alice = Ed25519Identity::generate("alice@example.com".into(), directory.clone()).unwrap();
//!
//! let hash = [9u8; 32];
//! let sig = alice.sign(&hash).unwrap();
//! let key = alice.public_key_lookup(alice.user()).unwrap();
//! assert!(alice.verify(&hash, &sig, &key));
//! ```

mod directory;
mod keypair;
mod signature;

pub use directory::{KeyDirectory, MemoryKeyDirectory};
pub use keypair::{Ed25519Identity, PublicKey};
pub use signature::{Signature, SIGNATURE_BASE};

use crate::error::ConverseResult;
use crate::types::UserName;

/// Per-user signing, verification and public-key lookup.
pub trait IdentityService: Send + Sync {
    /// The user this service signs for.
    fn user(&self) -> &UserName;

    /// Sign a content hash.
    fn sign(&self, hash: &[u8]) -> ConverseResult<Signature>;

    /// Check `signature` over `hash` against `key`.
    fn verify(&self, hash: &[u8], signature: &Signature, key: &PublicKey) -> bool;

    /// Find a user's published public key.
    fn public_key_lookup(&self, user: &UserName) -> ConverseResult<PublicKey>;
}
