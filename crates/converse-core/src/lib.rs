//! Converse Core Library
//!
//! Signed, serverless conversations replicated across each participant's own
//! storage.
//!
//! ## Overview
//!
//! A conversation is a directory of message objects, each a signed text
//! envelope. Every participant keeps a replica in their own tree; new
//! messages are written to all replicas, and [`sync::synchronize`] pulls in
//! whatever a replica is missing without ever overwriting.
//!
//! - **Envelopes**: JSON header, raw content, Ed25519 signature as two integers
//! - **Ordering**: by sequence number derived from the parent, then time
//! - **Membership**: a plain-text `Access` grant per conversation
//! - **No server**: storage and identity are capabilities passed in a [`Session`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use converse_core::{conversation, Session};
//!
//! let session = Session::init("~/.converse", &"alice@example.com".into())?;
//!
//! let mut conv = conversation::Conversation::with_title(session.user().clone(), "trip")?;
//! conv.add_participant(&session, &"bob@example.com".into())?;
//! conv.post(&session, &b"hi"[..])?;
//!
//! for message in conversation::read_conversation(&session, "trip")?.messages() {
//!     println!("{}", message);
//! }
//! ```

pub mod conversation;
pub mod error;
pub mod identity;
pub mod message;
pub mod session;
pub mod storage;
pub mod sync;
pub mod types;

// Re-exports
pub use conversation::{
    add_attachment, has_access, list_conversations, publish, read_conversation, AccessGrant,
    Conversation, MarkdownRenderer, Renderer,
};
pub use error::{ConverseError, ConverseResult};
pub use identity::{Ed25519Identity, IdentityService, KeyDirectory, MemoryKeyDirectory, PublicKey, Signature};
pub use message::{thread_order, Message, MsgName};
pub use session::Session;
pub use storage::{MemoryStore, ObjectStore, RedbStore};
pub use sync::{synchronize, sync_conversation, SyncReport};
pub use types::*;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::identity::{Ed25519Identity, MemoryKeyDirectory};
    use crate::session::Session;
    use crate::storage::MemoryStore;

    /// A session over a fresh in-memory store and key directory.
    pub fn memory_session(user: &str) -> (Session, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(MemoryKeyDirectory::new());
        let identity = Ed25519Identity::generate(user.into(), directory).unwrap();
        (Session::new(store.clone(), Arc::new(identity)), store)
    }
}
