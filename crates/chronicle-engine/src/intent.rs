//! Pure classification of narrator messages into routing intents.
//!
//! Given the narrator's latest message and the known party member names,
//! decide who should get to act:
//!
//! 1. Any combat trigger phrase -> [`Intent::Initiative`]
//! 2. Else the first party member named in the text (whole word,
//!    case-insensitive) -> [`Intent::Directed`] at that member
//! 3. Else -> [`Intent::Open`], with a secondary dialogue/exploration tag
//!    that downstream routing ignores
//!
//! Classification is total and deterministic: identical input always yields
//! identical output, and there is no failure path.

/// Phrases that mark the start of combat. Checked as case-insensitive
/// substrings, before any name matching.
pub const INITIATIVE_TRIGGERS: &[&str] = &[
    "initiative",
    "roll for initiative",
    "combat begins",
    "attacks",
    "roll initiative",
];

/// Cues that tag an open prompt as dialogue rather than exploration.
const DIALOGUE_CUES: &[&str] = &["says", "asks you", "speaks to"];

/// Secondary scene tag attached to directed and open intents.
///
/// Routing never reads this; it exists for observability and for prompt
/// builders that want to shade tone by scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeContext {
    /// Default scene framing.
    Exploration,
    /// The narrator is voicing or referencing speech.
    Dialogue,
    /// Combat has started.
    Combat,
}

impl NarrativeContext {
    /// Lowercase tag name for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exploration => "exploration",
            Self::Dialogue => "dialogue",
            Self::Combat => "combat",
        }
    }
}

/// The routing decision derived from one narrator message.
///
/// Created fresh per message and consumed immediately by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// A specific party member was addressed; only that member acts.
    Directed {
        /// The addressed member's name, in its registered casing.
        target: String,
        /// Secondary scene tag.
        context: NarrativeContext,
    },
    /// Nobody specific was addressed; willingness probes decide who acts.
    Open {
        /// Secondary scene tag.
        context: NarrativeContext,
    },
    /// Combat started; every member acts in registration order.
    Initiative,
}

impl core::fmt::Display for Intent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Directed { target, .. } => write!(f, "directed -> {target}"),
            Self::Open { context } => write!(f, "open ({})", context.as_str()),
            Self::Initiative => f.write_str("initiative"),
        }
    }
}

/// Classify a narrator message against the known party member names.
///
/// Name matching is whole-word and case-insensitive: a member name inside a
/// longer word never matches, so "Thorin" is not found in "Thorindor".
/// When several members are named, the first in `member_names` order wins.
pub fn classify(narrator_text: &str, member_names: &[String]) -> Intent {
    let lowered = narrator_text.to_lowercase();

    if INITIATIVE_TRIGGERS
        .iter()
        .any(|trigger| lowered.contains(trigger))
    {
        return Intent::Initiative;
    }

    for name in member_names {
        if contains_whole_word(&lowered, &name.to_lowercase()) {
            return Intent::Directed {
                target: name.clone(),
                context: NarrativeContext::Exploration,
            };
        }
    }

    let context = if DIALOGUE_CUES.iter().any(|cue| lowered.contains(cue)) {
        NarrativeContext::Dialogue
    } else {
        NarrativeContext::Exploration
    };
    Intent::Open { context }
}

/// Whether `needle` occurs in `haystack` bounded by non-word characters.
///
/// Both inputs are expected pre-lowercased. Word characters are
/// alphanumerics and underscore, matching conventional word-boundary
/// semantics.
fn contains_whole_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    for (idx, matched) in haystack.match_indices(needle) {
        let before = haystack.get(..idx).and_then(|s| s.chars().next_back());
        let end = idx.saturating_add(matched.len());
        let after = haystack.get(end..).and_then(|s| s.chars().next());

        let is_boundary =
            |ch: Option<char>| ch.is_none_or(|c| !c.is_alphanumeric() && c != '_');

        if is_boundary(before) && is_boundary(after) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party() -> Vec<String> {
        vec!["Thorin".to_owned(), "Elara".to_owned(), "Kira".to_owned()]
    }

    #[test]
    fn directed_at_named_member() {
        let intent = classify("Thorin, what do you do?", &party());
        assert_eq!(
            intent,
            Intent::Directed {
                target: "Thorin".to_owned(),
                context: NarrativeContext::Exploration
            }
        );
    }

    #[test]
    fn name_inside_longer_word_does_not_match() {
        let intent = classify("Thorindor approaches from the east.", &party());
        assert!(matches!(intent, Intent::Open { .. }));
    }

    #[test]
    fn directed_match_is_case_insensitive_and_keeps_registered_casing() {
        let intent = classify("elara, you see a chest", &party());
        assert_eq!(
            intent,
            Intent::Directed {
                target: "Elara".to_owned(),
                context: NarrativeContext::Exploration
            }
        );
    }

    #[test]
    fn initiative_wins_over_names() {
        let intent = classify("Roll for initiative! Thorin, you first.", &party());
        assert_eq!(intent, Intent::Initiative);
    }

    #[test]
    fn every_trigger_phrase_routes_to_initiative() {
        for trigger in INITIATIVE_TRIGGERS {
            let text = format!("Suddenly: {trigger}!");
            assert_eq!(classify(&text, &party()), Intent::Initiative, "trigger: {trigger}");
        }
    }

    #[test]
    fn open_prompt_tags_dialogue() {
        let intent = classify("The innkeeper says welcome, travelers.", &party());
        assert_eq!(
            intent,
            Intent::Open {
                context: NarrativeContext::Dialogue
            }
        );
    }

    #[test]
    fn open_prompt_defaults_to_exploration() {
        let intent = classify("You hear a noise in the distance.", &party());
        assert_eq!(
            intent,
            Intent::Open {
                context: NarrativeContext::Exploration
            }
        );
    }

    #[test]
    fn first_named_member_in_registration_order_wins() {
        let intent = classify("Kira and Elara exchange a glance.", &party());
        // Elara precedes Kira in the registered party order, and
        // registration order -- not text order -- breaks the tie.
        assert_eq!(
            intent,
            Intent::Directed {
                target: "Elara".to_owned(),
                context: NarrativeContext::Exploration
            }
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "The torch gutters. Something moves behind you.";
        assert_eq!(classify(text, &party()), classify(text, &party()));
    }

    #[test]
    fn name_at_string_edges_matches() {
        let intent = classify("thorin", &party());
        assert!(matches!(intent, Intent::Directed { target, .. } if target == "Thorin"));
    }
}
