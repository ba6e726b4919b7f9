//! Multi-user replication tests
//!
//! Several users share one storage namespace and one key directory, each
//! keeping a replica of a conversation under their own root.
//!
//! ## What These Tests Verify
//!
//! - A signed message reaches a peer through synchronization and verifies there
//! - Invited participants are recorded in the owner's grant
//! - Replies are delivered to every replica
//! - The same flow works on the persistent redb store

use std::sync::Arc;

use converse_core::conversation::{has_access, read_conversation, Conversation};
use converse_core::identity::{Ed25519Identity, KeyDirectory, MemoryKeyDirectory};
use converse_core::message::{HEADER_END_MARKER, SIGNATURE_MARKER};
use converse_core::storage::{MemoryStore, ObjectStore, RedbStore};
use converse_core::sync::sync_conversation;
use converse_core::{PathName, Session, UserName};
use tempfile::tempdir;

/// Shared storage and key directory, one session per user.
struct Network {
    store: Arc<dyn ObjectStore>,
    directory: Arc<dyn KeyDirectory>,
}

impl Network {
    fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            directory: Arc::new(MemoryKeyDirectory::new()),
        }
    }

    fn join(&self, user: &str) -> Session {
        let identity = Ed25519Identity::generate(user.into(), self.directory.clone()).unwrap();
        Session::new(self.store.clone(), Arc::new(identity))
    }
}

fn trip_scenario(net: &Network) {
    let alice = net.join("alice");
    let bob = net.join("bob");

    // Alice composes and signs before anything is stored
    let mut conv = Conversation::with_title(alice.user().clone(), "trip").unwrap();
    let payload = conv
        .add(alice.user().clone(), &b"hi"[..])
        .unwrap()
        .sign(alice.identity())
        .unwrap();

    let text = String::from_utf8(payload).unwrap();
    let start = text.find(HEADER_END_MARKER).unwrap() + HEADER_END_MARKER.len();
    let end = text.rfind(SIGNATURE_MARKER).unwrap();
    assert_eq!(&text[start..end], "hi");

    conv.messages()[0].send(&alice, alice.user()).unwrap();
    conv.add_participant(&alice, bob.user()).unwrap();
    assert!(has_access(&alice, &conv, bob.user()).unwrap());

    // Bob pulls Alice's replica into his own
    let report = sync_conversation(&bob, alice.user(), "trip").unwrap();
    assert_eq!(
        report.copied,
        vec![PathName::parse("bob/conversations/trip/msg1-alice.txt").unwrap()]
    );

    let loaded = read_conversation(&bob, "trip").unwrap();
    assert_eq!(loaded.len(), 1);
    let message = &loaded.messages()[0];
    assert_eq!(message.author, UserName::new("alice"));
    assert_eq!(message.content().unwrap(), b"hi");
    assert!(loaded.participants().contains(bob.user()));
    message.verify(bob.identity()).unwrap();

    // Alice's own reload takes participants from her grant
    let owner_view = read_conversation(&alice, "trip").unwrap();
    assert_eq!(
        owner_view.participants(),
        [UserName::new("alice"), UserName::new("bob")]
    );
}

#[test]
fn test_trip_end_to_end() {
    trip_scenario(&Network::in_memory());
}

#[test]
fn test_trip_end_to_end_on_redb() {
    let dir = tempdir().unwrap();
    let store = RedbStore::new(dir.path().join("converse.redb")).unwrap();
    let net = Network {
        store: Arc::new(store.clone()),
        directory: Arc::new(store),
    };
    trip_scenario(&net);
}

#[test]
fn test_reply_reaches_every_replica() {
    let net = Network::in_memory();
    let alice = net.join("alice");
    let bob = net.join("bob");
    let carol = net.join("carol");

    let mut conv = Conversation::with_title(alice.user().clone(), "trip").unwrap();
    conv.add_participant(&alice, bob.user()).unwrap();
    conv.add_participant(&alice, carol.user()).unwrap();
    conv.post(&alice, &b"where to?"[..]).unwrap();

    // Alice delivered directly to both peers
    for peer in [&bob, &carol] {
        assert_eq!(read_conversation(peer, "trip").unwrap().len(), 1);
    }

    let mut bob_view = read_conversation(&bob, "trip").unwrap();
    let name = bob_view.post(&bob, &b"the coast"[..]).unwrap();
    assert_eq!(name.to_string(), "msg2-bob.txt");

    // Bob knows alice as an author; carol catches up from alice
    let alice_view = read_conversation(&alice, "trip").unwrap();
    assert_eq!(alice_view.len(), 2);
    assert_eq!(read_conversation(&carol, "trip").unwrap().len(), 1);

    let report = sync_conversation(&carol, alice.user(), "trip").unwrap();
    assert_eq!(report.copied.len(), 1);
    assert_eq!(report.skipped.len(), 1);

    let carol_view = read_conversation(&carol, "trip").unwrap();
    let contents: Vec<&[u8]> = carol_view
        .messages()
        .iter()
        .map(|m| m.content().unwrap())
        .collect();
    assert_eq!(contents, [&b"where to?"[..], &b"the coast"[..]]);
    assert!(carol_view
        .verify_all(carol.identity())
        .iter()
        .all(|(_, r)| r.is_ok()));
}

#[test]
fn test_sync_is_idempotent() {
    let net = Network::in_memory();
    let alice = net.join("alice");
    let bob = net.join("bob");

    let mut conv = Conversation::with_title(alice.user().clone(), "trip").unwrap();
    conv.post(&alice, &b"one"[..]).unwrap();
    conv.post(&alice, &b"two"[..]).unwrap();

    let first = sync_conversation(&bob, alice.user(), "trip").unwrap();
    assert_eq!(first.copied.len(), 2);
    let second = sync_conversation(&bob, alice.user(), "trip").unwrap();
    assert!(second.is_noop());

    let bob_view = read_conversation(&bob, "trip").unwrap();
    assert_eq!(bob_view.len(), 2);
}
