//! Private conversation history turns.
//!
//! Each responder owns an ordered sequence of [`HistoryTurn`] values: the
//! prompts it was shown and the replies it produced. History is private by
//! construction -- it is passed to a responder explicitly per invocation and
//! never shared between responders.

use serde::{Deserialize, Serialize};

/// Which side of the conversation authored a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRole {
    /// A prompt delivered to the responder.
    User,
    /// A reply the responder produced.
    Assistant,
}

impl HistoryRole {
    /// The wire-format role name used by chat completion APIs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn in a responder's private conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// Who authored the turn.
    pub role: HistoryRole,
    /// The turn content.
    pub content: String,
}

impl HistoryTurn {
    /// Create a user-authored turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant-authored turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(HistoryRole::User.as_str(), "user");
        assert_eq!(HistoryRole::Assistant.as_str(), "assistant");
    }

    #[test]
    fn turn_constructors() {
        let turn = HistoryTurn::user("What do you do?");
        assert_eq!(turn.role, HistoryRole::User);
        let turn = HistoryTurn::assistant("I draw my sword.");
        assert_eq!(turn.role, HistoryRole::Assistant);
    }
}
