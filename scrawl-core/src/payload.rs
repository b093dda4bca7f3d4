//! Application payloads carried by blocks.
//!
//! A block carries exactly one payload: a chat message or a note snapshot.
//! Notes are logically keyed by `id`: a later note block with the same id
//! supersedes earlier ones in any derived view, but the log itself is never
//! rewritten; supersession is a read-side concern of consumers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Caller-supplied or generated identity.
    pub id: String,
    /// Display name of the sender.
    pub author: String,
    /// Message text.
    pub content: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl ChatMessage {
    /// Create a message with a generated id.
    pub fn new(author: impl Into<String>, content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            content: content.into(),
            timestamp,
        }
    }
}

/// A full note snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDocument {
    /// Stable note identity; later snapshots with the same id supersede.
    pub id: String,
    pub title: String,
    pub body: String,
    /// Unix timestamp in milliseconds of this snapshot.
    pub updated_at: u64,
}

impl NoteDocument {
    /// Create a note with a generated id.
    pub fn new(title: impl Into<String>, body: impl Into<String>, updated_at: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            body: body.into(),
            updated_at,
        }
    }
}

/// Block payload, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// A chat message.
    Chat { message: ChatMessage },
    /// A note snapshot.
    Note { note: NoteDocument },
}

impl Payload {
    /// Get a human-readable name for the payload kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Chat { .. } => "chat",
            Payload::Note { .. } => "note",
        }
    }
}
