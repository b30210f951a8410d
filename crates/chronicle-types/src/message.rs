//! Transcript messages: the unit of record on the shared message board.
//!
//! A [`Message`] is immutable once posted. The total order over messages is
//! the board's append order; the timestamp is informational and serializes
//! as epoch seconds for external transcript consumers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification tag for a transcript message.
///
/// The kind determines how external consumers render the entry and lets the
/// scheduler's error recovery be observed in the transcript itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A narrative reply authored by the narrator or a party member.
    Reply,
    /// A lifecycle notice authored by the system (session start/end).
    System,
    /// A recovered failure (timeout or invocation error) recorded for
    /// observability; the round continued past it.
    Error,
}

/// A single entry in the shared transcript.
///
/// Messages are value types: once posted to the board they are never
/// modified. `metadata` carries optional annotations (turn number, routing
/// intent, dice results) that the orchestration core itself does not
/// interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the speaker ("Narrator", a party member name, or "System").
    pub author: String,
    /// The message content.
    pub text: String,
    /// When the message was created. Serializes as epoch seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// Classification tag.
    pub kind: MessageKind,
    /// Free-form annotations for external consumers.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Message {
    /// Create a message with an explicit kind and empty metadata.
    pub fn new(author: impl Into<String>, text: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            timestamp: Utc::now(),
            kind,
            metadata: BTreeMap::new(),
        }
    }

    /// Create a [`MessageKind::Reply`] message from a named speaker.
    pub fn reply(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(author, text, MessageKind::Reply)
    }

    /// Create a [`MessageKind::System`] lifecycle message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new("System", text, MessageKind::System)
    }

    /// Create a [`MessageKind::Error`] message recording a recovered failure.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new("System", text, MessageKind::Error)
    }

    /// Attach a metadata entry, returning the updated message.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl core::fmt::Display for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}]: {}", self.author, self.text)
    }
}
