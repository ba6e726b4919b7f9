//! Signed messages
//!
//! A [`Message`] moves through a short lifecycle:
//!
//! 1. **Unsigned**: built by [`Message::new`] with its content still an
//!    unread stream
//! 2. **Signed**: [`Message::sign`] reads the content, hashes the signable
//!    payload and stores the signature; header and content are frozen
//! 3. **Serialized**: [`Message::payload`] yields the full envelope text,
//!    which [`Message::send`] writes into a replica
//! 4. **Reparsed**: [`Message::decode`] rebuilds a read-only message, which
//!    [`Message::verify`] can check against the author's published key

mod envelope;
mod name;

pub use envelope::{content_hash, format_time, HEADER_END_MARKER, SIGNATURE_MARKER};
pub use name::{MsgName, MSG_EXTENSION, MSG_PATTERN, MSG_PREFIX};

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Write};

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, warn};

use crate::conversation::conversation_dir;
use crate::error::{ConverseError, ConverseResult};
use crate::identity::{IdentityService, Signature};
use crate::session::Session;
use crate::storage::make_dirs;
use crate::types::{DirEntry, UserName};
use envelope::Header;

enum Content {
    Pending(Box<dyn Read + Send>),
    Ready(Vec<u8>),
}

/// One message in a conversation thread.
pub struct Message {
    /// Author's user name
    pub author: UserName,
    /// Name of the conversation this message belongs to
    pub title: String,
    /// Creation time
    pub time: DateTime<FixedOffset>,
    /// Message this one replies to, `None` for the first in a chain
    pub parent: Option<MsgName>,
    content: Content,
    signature: Option<Signature>,
}

impl Message {
    /// Create an unsigned message whose content is read only when signed.
    pub fn new(
        author: UserName,
        title: impl Into<String>,
        parent: Option<MsgName>,
        body: impl Read + Send + 'static,
    ) -> Self {
        Self {
            author,
            title: title.into(),
            time: Utc::now().fixed_offset(),
            parent,
            content: Content::Pending(Box::new(body)),
            signature: None,
        }
    }

    /// Decode an envelope. The result is signed but not yet verified.
    pub fn decode(data: &[u8]) -> ConverseResult<Self> {
        let decoded = envelope::decode(data)?;
        Ok(Self {
            author: decoded.header.author,
            title: decoded.header.title,
            time: decoded.header.time,
            parent: decoded.parent,
            content: Content::Ready(decoded.content),
            signature: Some(decoded.signature),
        })
    }

    /// Object name, derived from the parent and author.
    pub fn name(&self) -> MsgName {
        MsgName::next(self.parent.as_ref(), &self.author)
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Content bytes, or `None` while the body is still an unread stream.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.content {
            Content::Ready(bytes) => Some(bytes),
            Content::Pending(_) => None,
        }
    }

    /// Content as text (lossy), empty while still pending.
    pub fn content_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content().unwrap_or_default())
    }

    /// Read the body, hash the signable payload and sign it.
    ///
    /// Returns the full envelope payload.
    pub fn sign(&mut self, identity: &dyn IdentityService) -> ConverseResult<Vec<u8>> {
        if self.signature.is_some() {
            return Err(ConverseError::AlreadySigned);
        }
        if identity.user() != &self.author {
            warn!(author = %self.author, signer = %identity.user(), "Signing a message for another author");
        }

        if let Content::Pending(body) = &mut self.content {
            let mut data = Vec::new();
            body.read_to_end(&mut data)?;
            self.content = Content::Ready(data);
        }

        let payload = self.signable_payload()?;
        let signature = identity.sign(&content_hash(&payload))?;
        let mut full = payload;
        full.extend_from_slice(envelope::signature_block(&signature).as_bytes());
        self.signature = Some(signature);

        debug!(name = %self.name(), "Signed message");
        Ok(full)
    }

    /// Check the signature against the author's key from the directory.
    ///
    /// The hash covers the decoded header field values and the content. The
    /// header is re-encoded canonically, so a re-indented or differently
    /// escaped header with the same values still verifies.
    pub fn verify(&self, identity: &dyn IdentityService) -> ConverseResult<()> {
        let signature = self.signature.as_ref().ok_or(ConverseError::Unsigned)?;
        let key = identity
            .public_key_lookup(&self.author)
            .map_err(|e| match e {
                ConverseError::KeyLookupFailed { .. } => e,
                other => ConverseError::KeyLookupFailed {
                    user: self.author.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let hash = content_hash(&self.signable_payload()?);
        if identity.verify(&hash, signature, &key) {
            Ok(())
        } else {
            Err(ConverseError::VerificationFailed {
                author: self.author.to_string(),
            })
        }
    }

    /// Full envelope: signable payload plus signature block.
    pub fn payload(&self) -> ConverseResult<Vec<u8>> {
        let signature = self.signature.as_ref().ok_or(ConverseError::Unsigned)?;
        let mut full = self.signable_payload()?;
        full.extend_from_slice(envelope::signature_block(signature).as_bytes());
        Ok(full)
    }

    /// Bytes covered by the signature.
    pub fn signable_payload(&self) -> ConverseResult<Vec<u8>> {
        let content = self.content().ok_or(ConverseError::Unsigned)?;
        let header = Header {
            author: self.author.clone(),
            time: self.time,
            parent: self
                .parent
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            title: self.title.clone(),
        };
        envelope::signable_payload(&header, content)
    }

    /// Write this message into `recipient`'s replica of the conversation.
    pub fn send(&self, session: &Session, recipient: &UserName) -> ConverseResult<DirEntry> {
        let payload = self.payload()?;
        let dir = conversation_dir(recipient, &self.title)?;
        make_dirs(session.store(), &dir)?;

        let mut writer = session.store().create(&dir.join(&self.name().to_string()))?;
        writer.write_all(&payload)?;
        let entry = writer.commit()?;

        debug!(path = %entry.name, %recipient, "Delivered message");
        Ok(entry)
    }
}

/// Thread order: sequence number, then creation time on ties.
///
/// This only approximates causal order. Replies made concurrently on
/// different replicas share a sequence number, and their relative order then
/// depends on the authors' clocks.
pub fn thread_order(a: &Message, b: &Message) -> Ordering {
    a.name()
        .number()
        .cmp(&b.name().number())
        .then_with(|| a.time.cmp(&b.time))
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("name", &self.name().to_string())
            .field("title", &self.title)
            .field("time", &format_time(&self.time))
            .field("content_len", &self.content().map(<[u8]>::len))
            .field("signed", &self.is_signed())
            .finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = self.content_text().replace('\n', "\n    ");
        writeln!(
            f,
            "{} on {}\n    {}",
            self.author,
            self.time.format("%a %b %e %H:%M:%S %Z %Y"),
            content
        )
    }
}
