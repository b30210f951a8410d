//! Per-responder willingness signals gathered during open-prompt routing.
//!
//! When the narrator issues an open prompt, every party member is probed for
//! whether it wants to act and how relevant acting would be. The probe reply
//! deserializes into a [`ResponseIntent`]; a probe that fails for any reason
//! is replaced by [`ResponseIntent::neutral`] so a single flaky side channel
//! never sinks the round.

use serde::{Deserialize, Serialize};

/// Maximum relevance score a probe may report.
pub const MAX_RELEVANCE: u8 = 10;

/// Relevance score assigned by [`ResponseIntent::neutral`].
const NEUTRAL_RELEVANCE: u8 = 5;

/// A responder's declared willingness to act on the current prompt.
///
/// Produced once per open-prompt resolution and discarded after ordering.
/// Each value carries its own responder name, so the gather order of
/// concurrent probes is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseIntent {
    /// Name of the responder this signal belongs to.
    #[serde(default)]
    pub responder: String,
    /// Whether the responder wants to act this round.
    pub wants_to_respond: bool,
    /// How appropriate acting now would be, 0 to 10.
    pub relevance_score: u8,
    /// One-sentence justification (logged, never interpreted).
    pub reason: String,
}

impl ResponseIntent {
    /// Build an intent, clamping the relevance score into `0..=10`.
    pub fn new(
        responder: impl Into<String>,
        wants_to_respond: bool,
        relevance_score: u8,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            responder: responder.into(),
            wants_to_respond,
            relevance_score: relevance_score.min(MAX_RELEVANCE),
            reason: reason.into(),
        }
    }

    /// The fallback intent substituted when a probe fails: willing, middling
    /// relevance.
    pub fn neutral(responder: impl Into<String>) -> Self {
        Self {
            responder: responder.into(),
            wants_to_respond: true,
            relevance_score: NEUTRAL_RELEVANCE,
            reason: String::from("default"),
        }
    }

    /// Return a copy with the relevance score clamped into range.
    ///
    /// Deserialized probe output bypasses [`ResponseIntent::new`], so the
    /// scorer normalizes through this before computing priorities.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.relevance_score = self.relevance_score.min(MAX_RELEVANCE);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_relevance() {
        let intent = ResponseIntent::new("Thorin", true, 200, "eager");
        assert_eq!(intent.relevance_score, MAX_RELEVANCE);
    }

    #[test]
    fn neutral_default_shape() {
        let intent = ResponseIntent::neutral("Elara");
        assert!(intent.wants_to_respond);
        assert_eq!(intent.relevance_score, 5);
        assert_eq!(intent.reason, "default");
    }

    #[test]
    fn deserializes_probe_output() {
        let raw = r#"{"wants_to_respond": true, "relevance_score": 8, "reason": "expert lockpicker"}"#;
        let intent: Result<ResponseIntent, _> = serde_json::from_str(raw);
        assert!(intent.is_ok());
        let intent = intent.unwrap_or_else(|_| ResponseIntent::neutral(""));
        assert_eq!(intent.relevance_score, 8);
        assert!(intent.responder.is_empty(), "responder name is filled in by the prober");
    }

    #[test]
    fn clamped_normalizes_out_of_range_deserialized_scores() {
        let raw = r#"{"wants_to_respond": true, "relevance_score": 99, "reason": "overflow"}"#;
        let intent: ResponseIntent =
            serde_json::from_str(raw).unwrap_or_else(|_| ResponseIntent::neutral(""));
        assert_eq!(intent.clamped().relevance_score, MAX_RELEVANCE);
    }
}
