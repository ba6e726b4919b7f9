//! Error types for Converse

use thiserror::Error;

/// Main error type for Converse operations
#[derive(Error, Debug)]
pub enum ConverseError {
    /// Envelope text is missing a marker, has a bad header, or a bad signature block
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Access grant text could not be parsed
    #[error("Malformed access grant at line {line}: {reason}")]
    MalformedGrant { line: usize, reason: String },

    /// Object name does not follow `msg<seq>-<author>.<ext>`
    #[error("Invalid message name '{0}'")]
    InvalidMessageName(String),

    /// Sign was called on a message that already carries a signature
    #[error("Message has already been signed")]
    AlreadySigned,

    /// Payload was requested for a message that has no signature
    #[error("Cannot produce the payload of an unsigned message")]
    Unsigned,

    /// Signature does not match the recomputed hash
    #[error("Signature verification failed for message by {author}")]
    VerificationFailed { author: String },

    /// The author's public key could not be found
    #[error("Failed to look up public key for {user}: {reason}")]
    KeyLookupFailed { user: String, reason: String },

    /// One message in a conversation directory could not be read or decoded
    #[error("Failed to read message '{entry}': {source}")]
    MessageParseFailure {
        entry: String,
        #[source]
        source: Box<ConverseError>,
    },

    /// Operation requires at least one message
    #[error("Conversation '{0}' has no messages")]
    EmptyConversation(String),

    /// Operation requires a resolvable title
    #[error("Conversation has no title")]
    UntitledConversation,

    /// A title is already resolvable and cannot be changed
    #[error("Conversation is already titled '{0}'")]
    AlreadyTitled(String),

    /// No object or directory at the given path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Something already exists at the given path
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A path element that must be a directory is an object
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Invalid path or storage request
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Identity-related error (keys, signing)
    #[error("Identity error: {0}")]
    Identity(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverseError {
    /// True for "nothing at this path" failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConverseError::NotFound(_))
    }

    /// True for "something already at this path" failures.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ConverseError::AlreadyExists(_))
    }
}

/// Result type alias using ConverseError
pub type ConverseResult<T> = Result<T, ConverseError>;
