//! Conversation threads
//!
//! A conversation lives at `<owner>/conversations/<title>/` and holds one
//! object per message plus an optional `Access` grant, attachments and a
//! rendered `index.html`. [`read_conversation`] rebuilds the thread from that
//! directory; [`Conversation::add`] composes new messages in memory and
//! [`Conversation::post`] signs and delivers them.

pub mod access;
pub mod publish;

use std::fmt;
use std::io::{self, Read};

use tracing::{debug, info, warn};

use crate::error::{ConverseError, ConverseResult};
use crate::identity::IdentityService;
use crate::message::{thread_order, Message, MsgName, MSG_PATTERN};
use crate::session::Session;
use crate::storage::{glob_pattern, make_dirs};
use crate::types::{DirEntry, PathName, UserName};

pub use access::{has_access, read_access, AccessGrant, Right, ACCESS_FILE};
pub use publish::{publish, MarkdownRenderer, Renderer, INDEX_FILE};

/// Directory under each user root that holds conversations.
pub const CONVERSATIONS_DIR: &str = "conversations";

/// `<user>/conversations/<title>`
pub fn conversation_dir(user: &UserName, title: &str) -> ConverseResult<PathName> {
    if title.is_empty() || title.contains('/') || title == "." || title == ".." {
        return Err(ConverseError::Storage(format!(
            "invalid conversation title '{}'",
            title
        )));
    }
    Ok(PathName::root(user).join(CONVERSATIONS_DIR).join(title))
}

/// An ordered thread of messages and the users taking part in it.
pub struct Conversation {
    owner: UserName,
    title: Option<String>,
    location: Option<PathName>,
    messages: Vec<Message>,
    participants: Vec<UserName>,
}

impl Conversation {
    /// An empty conversation owned by `owner`, with no title yet.
    pub fn new(owner: UserName) -> Self {
        Self {
            owner,
            title: None,
            location: None,
            messages: Vec::new(),
            participants: Vec::new(),
        }
    }

    /// An empty conversation with an explicit title. Nothing is written.
    pub fn with_title(owner: UserName, title: &str) -> ConverseResult<Self> {
        let mut conv = Self::new(owner);
        conv.set_title(title)?;
        Ok(conv)
    }

    pub fn owner(&self) -> &UserName {
        &self.owner
    }

    /// Title from the first message, else the explicitly set one.
    pub fn title(&self) -> Option<&str> {
        self.messages
            .first()
            .map(|m| m.title.as_str())
            .or(self.title.as_deref())
    }

    /// Set the title. Fails once any title is resolvable.
    pub fn set_title(&mut self, title: &str) -> ConverseResult<()> {
        if let Some(existing) = self.title() {
            return Err(ConverseError::AlreadyTitled(existing.to_string()));
        }
        self.location = Some(conversation_dir(&self.owner, title)?);
        self.title = Some(title.to_string());
        Ok(())
    }

    /// Directory in the owner's tree, once titled.
    pub fn location(&self) -> Option<&PathName> {
        self.location.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn participants(&self) -> &[UserName] {
        &self.participants
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Compose a reply to the last message. Nothing is persisted.
    pub fn add(
        &mut self,
        author: UserName,
        body: impl Read + Send + 'static,
    ) -> ConverseResult<&mut Message> {
        let title = self
            .title()
            .ok_or(ConverseError::UntitledConversation)?
            .to_string();
        let parent = self.messages.last().map(Message::name);

        let index = self.messages.len();
        self.messages.push(Message::new(author, title, parent, body));
        Ok(&mut self.messages[index])
    }

    /// Add a message from the session user, sign it and deliver it to the
    /// owner's replica and to every participant.
    ///
    /// Delivery stops at the first failed write.
    pub fn post(
        &mut self,
        session: &Session,
        body: impl Read + Send + 'static,
    ) -> ConverseResult<MsgName> {
        let signed = self.add(session.user().clone(), body)?.sign(session.identity());
        if let Err(e) = signed {
            self.messages.pop();
            return Err(e);
        }

        let message = &self.messages[self.messages.len() - 1];
        for recipient in self.recipients(session.user()) {
            message.send(session, &recipient)?;
        }

        let name = message.name();
        info!(name = %name, title = ?self.title(), "Posted message");
        Ok(name)
    }

    /// Everyone a new message is written to: the sender, the owner, then
    /// participants, each once.
    fn recipients(&self, sender: &UserName) -> Vec<UserName> {
        let mut out: Vec<UserName> = Vec::new();
        for user in [sender, &self.owner].into_iter().chain(self.participants.iter()) {
            if !out.contains(user) {
                out.push(user.clone());
            }
        }
        out
    }

    /// Verify every message, returning one result per message in thread
    /// order. A failure does not stop the remaining checks.
    pub fn verify_all(&self, identity: &dyn IdentityService) -> Vec<(MsgName, ConverseResult<()>)> {
        self.messages
            .iter()
            .map(|m| {
                let result = m.verify(identity);
                if let Err(e) = &result {
                    warn!(name = %m.name(), error = %e, "Message failed verification");
                }
                (m.name(), result)
            })
            .collect()
    }

    /// Without a grant the replica owner and every author take part.
    fn infer_participants(&mut self) {
        self.participants = vec![self.owner.clone()];
        for message in &self.messages {
            if !self.participants.contains(&message.author) {
                self.participants.push(message.author.clone());
            }
        }
    }
}

/// Load `<session user>/conversations/<title>` and order its messages.
///
/// The directory is created if missing. Any message that fails to decode
/// aborts the read. Participants come from the `Access` grant when there is
/// one, otherwise from the owner and the authors seen in the thread.
pub fn read_conversation(session: &Session, title: &str) -> ConverseResult<Conversation> {
    let mut conv = Conversation::with_title(session.user().clone(), title)?;
    let dir = conv.location.clone().ok_or(ConverseError::UntitledConversation)?;
    make_dirs(session.store(), &dir)?;

    let pattern = glob_pattern(&dir, MSG_PATTERN);
    for entry in session.store().glob(&pattern)? {
        if entry.is_dir() {
            continue;
        }
        let message = load_message(session, &entry).map_err(|e| ConverseError::MessageParseFailure {
            entry: entry.name.to_string(),
            source: Box::new(e),
        })?;
        conv.messages.push(message);
    }
    conv.messages.sort_by(thread_order);

    match read_access(session, &conv)? {
        Some(grant) => conv.participants = grant.readers(),
        None => conv.infer_participants(),
    }

    debug!(
        title,
        messages = conv.messages.len(),
        participants = conv.participants.len(),
        "Read conversation"
    );
    Ok(conv)
}

fn load_message(session: &Session, entry: &DirEntry) -> ConverseResult<Message> {
    let mut data = Vec::with_capacity(entry.size as usize);
    session.store().open(&entry.name)?.read_to_end(&mut data)?;
    Message::decode(&data)
}

/// Titles of the session user's conversations, sorted.
pub fn list_conversations(session: &Session) -> ConverseResult<Vec<String>> {
    let root = PathName::root(session.user()).join(CONVERSATIONS_DIR);
    Ok(session
        .store()
        .glob(&glob_pattern(&root, "*"))?
        .into_iter()
        .filter(DirEntry::is_dir)
        .map(|e| e.name.base().to_string())
        .collect())
}

/// Stream `reader` into the conversation directory as `name`.
pub fn add_attachment(
    session: &Session,
    title: &str,
    name: &str,
    reader: &mut dyn Read,
) -> ConverseResult<DirEntry> {
    if name.is_empty() || name.contains('/') || name == ACCESS_FILE {
        return Err(ConverseError::Storage(format!(
            "invalid attachment name '{}'",
            name
        )));
    }
    let dir = conversation_dir(session.user(), title)?;
    make_dirs(session.store(), &dir)?;

    let mut writer = session.store().create(&dir.join(name))?;
    io::copy(reader, &mut writer)?;
    let entry = writer.commit()?;
    info!(path = %entry.name, size = entry.size, "Attached file");
    Ok(entry)
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            writeln!(
                f,
                "---------------------------- msg {} -------------------------------",
                i + 1
            )?;
            write!(f, "{}", message)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("owner", &self.owner)
            .field("title", &self.title())
            .field("messages", &self.messages.len())
            .field("participants", &self.participants)
            .finish()
    }
}
