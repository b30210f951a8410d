//! Willingness probes and composite priority ordering for open prompts.
//!
//! When routing is open, every party member is asked -- concurrently, on
//! its structured side channel -- whether its character would act now.
//! The probes are read-only with respect to session state, so fanning them
//! out in parallel is safe and keeps round latency at the slowest probe
//! rather than the sum.
//!
//! The answers are then ordered by a composite priority:
//!
//! ```text
//! priority = w_rel * (relevance / 10) + w_rec * recency + w_var * variety
//! ```
//!
//! - `relevance` is the probe's 0-10 self-assessment;
//! - `recency` rewards members who have not spoken lately (0.0 if the
//!   member spoke last turn, 0.5 if within the recency window, else 1.0);
//! - `variety` is a uniform draw scaled down far enough that it only breaks
//!   ties between similar candidates.
//!
//! The weights, window, and variety scale are empirical; they are carried
//! as configuration rather than constants. The RNG is owned and seedable
//! so orderings reproduce exactly under test.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chronicle_runner::{PromptEngine, Responder};
use chronicle_types::ResponseIntent;
use futures::future::join_all;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Tunable parameters for probe gathering and priority ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Weight of the normalized relevance term.
    pub relevance_weight: f64,
    /// Weight of the recency term.
    pub recency_weight: f64,
    /// Weight of the variety term.
    pub variety_weight: f64,
    /// How many recent speakers count as "spoke recently".
    pub recency_window: usize,
    /// Scale applied to the uniform variety draw before weighting.
    pub variety_scale: f64,
    /// Deadline for each willingness probe.
    pub probe_timeout: Duration,
    /// RNG seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            relevance_weight: 0.5,
            recency_weight: 0.3,
            variety_weight: 0.2,
            recency_window: 3,
            variety_scale: 0.3,
            probe_timeout: Duration::from_secs(10),
            seed: None,
        }
    }
}

/// Gathers willingness probes and orders responders for an open round.
pub struct ResponseScorer {
    config: ScoringConfig,
    prompts: Arc<PromptEngine>,
    rng: SmallRng,
}

impl ResponseScorer {
    /// Create a scorer from configuration and the shared prompt engine.
    pub fn new(config: ScoringConfig, prompts: Arc<PromptEngine>) -> Self {
        let rng = config
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        Self {
            config,
            prompts,
            rng,
        }
    }

    /// Probe every responder concurrently for its willingness to act.
    ///
    /// Each probe renders the probe template, asks the responder's
    /// structured side channel under [`ScoringConfig::probe_timeout`], and
    /// deserializes the JSON reply. Any per-responder failure -- template
    /// error, transport error, timeout, unparseable or out-of-range output
    /// -- degrades to [`ResponseIntent::neutral`] for that responder; the
    /// round never fails because one probe did.
    pub async fn gather_intents(
        &self,
        responders: &[Responder],
        narrator_message: &str,
        context: &str,
    ) -> Vec<ResponseIntent> {
        let probes = responders
            .iter()
            .map(|responder| self.probe_one(responder, narrator_message, context));
        join_all(probes).await
    }

    /// Probe a single responder, degrading to the neutral default on any
    /// failure.
    async fn probe_one(
        &self,
        responder: &Responder,
        narrator_message: &str,
        context: &str,
    ) -> ResponseIntent {
        let name = responder.name();

        let ctx = serde_json::json!({
            "name": name,
            "narrator_message": narrator_message,
            "context": context,
        });
        let prompt = match self.prompts.probe(&ctx) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(responder = name, error = %e, "probe template failed, using neutral intent");
                return ResponseIntent::neutral(name);
            }
        };

        let value = match timeout(self.config.probe_timeout, responder.invoke_structured(&prompt))
            .await
        {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(responder = name, error = %e, "probe failed, using neutral intent");
                return ResponseIntent::neutral(name);
            }
            Err(_elapsed) => {
                warn!(
                    responder = name,
                    timeout_ms = self.config.probe_timeout.as_millis(),
                    "probe deadline exceeded, using neutral intent"
                );
                return ResponseIntent::neutral(name);
            }
        };

        match serde_json::from_value::<ResponseIntent>(value) {
            Ok(mut intent) => {
                intent.responder = name.to_owned();
                let intent = intent.clamped();
                debug!(
                    responder = name,
                    wants_to_respond = intent.wants_to_respond,
                    relevance = intent.relevance_score,
                    reason = intent.reason,
                    "probe answered"
                );
                intent
            }
            Err(e) => {
                warn!(responder = name, error = %e, "probe output malformed, using neutral intent");
                ResponseIntent::neutral(name)
            }
        }
    }

    /// Order willing responders by composite priority, highest first.
    ///
    /// Responders with `wants_to_respond == false` are dropped. An empty
    /// result is a valid no-act round, not an error. Ties between equal
    /// deterministic terms are broken by the variety draw.
    pub fn smart_order(
        &mut self,
        intents: &[ResponseIntent],
        recent_speakers: &[String],
    ) -> Vec<String> {
        let active: Vec<&ResponseIntent> =
            intents.iter().filter(|i| i.wants_to_respond).collect();
        if active.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f64)> = active
            .iter()
            .map(|intent| {
                let priority = self.priority(intent, recent_speakers);
                debug!(
                    responder = intent.responder,
                    priority,
                    "composite priority computed"
                );
                (intent.responder.clone(), priority)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.into_iter().map(|(name, _)| name).collect()
    }

    /// Compute one responder's composite priority.
    fn priority(&mut self, intent: &ResponseIntent, recent_speakers: &[String]) -> f64 {
        let relevance = f64::from(intent.relevance_score) / 10.0;
        let recency = recency_term(&intent.responder, recent_speakers, self.config.recency_window);
        let variety: f64 = self.rng.random::<f64>() * self.config.variety_scale;

        // Bounded: every term is a finite fraction in [0, 1] and the weights
        // are small configuration constants, so the sum cannot overflow.
        #[allow(clippy::arithmetic_side_effects)]
        {
            relevance * self.config.relevance_weight
                + recency * self.config.recency_weight
                + variety * self.config.variety_weight
        }
    }
}

/// The recency term for one responder.
///
/// 0.0 if the responder spoke in the immediately preceding turn, 0.5 if it
/// spoke within the last `window` turns (but not the last one), else 1.0.
fn recency_term(responder: &str, recent_speakers: &[String], window: usize) -> f64 {
    if recent_speakers.last().is_some_and(|last| last == responder) {
        return 0.0;
    }
    let spoke_in_window = recent_speakers
        .iter()
        .rev()
        .take(window)
        .any(|name| name == responder);
    if spoke_in_window { 0.5 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use chronicle_runner::{ResponderBackend, ScriptedBackend};

    use super::*;

    fn test_prompts() -> Arc<PromptEngine> {
        let unique = format!(
            "chronicle_scoring_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("narrator_system.j2"), "You are the narrator.").ok();
        std::fs::write(dir.join("member_system.j2"), "You are {{ name }}.").ok();
        std::fs::write(
            dir.join("probe.j2"),
            "Should {{ name }} act now?\n{{ narrator_message }}\n{{ context }}",
        )
        .ok();
        std::fs::write(dir.join("respond.j2"), "Respond: {{ narrator_message }}").ok();
        let engine = PromptEngine::new(dir.to_str().unwrap_or("")).map_or_else(
            |e| {
                tracing::error!("failed to build test prompt engine: {e}");
                std::process::exit(1);
            },
            Arc::new,
        );
        engine
    }

    fn seeded_scorer(seed: u64) -> ResponseScorer {
        ResponseScorer::new(
            ScoringConfig {
                seed: Some(seed),
                ..ScoringConfig::default()
            },
            test_prompts(),
        )
    }

    fn intent(name: &str, wants: bool, relevance: u8) -> ResponseIntent {
        ResponseIntent::new(name, wants, relevance, "test")
    }

    #[test]
    fn smart_order_empty_when_nobody_wants_to_respond() {
        let mut scorer = seeded_scorer(42);
        let intents = vec![intent("P1", false, 0), intent("P2", false, 0)];
        assert!(scorer.smart_order(&intents, &[]).is_empty());
    }

    #[test]
    fn smart_order_drops_decliners() {
        let mut scorer = seeded_scorer(42);
        let intents = vec![
            intent("P1", true, 8),
            intent("P2", true, 4),
            intent("P3", false, 0),
        ];
        let order = scorer.smart_order(&intents, &[]);
        assert_eq!(order.len(), 2);
        assert!(!order.contains(&"P3".to_owned()));
    }

    #[test]
    fn high_relevance_fresh_speaker_dominates_low_relevance_last_speaker() {
        // A: relevance 8, has not spoken recently. B: relevance 2, spoke
        // last turn. A's minimum priority (0.4 + 0.3) exceeds B's maximum
        // (0.1 + 0.06), so A leads on every seed.
        let recent = vec!["B".to_owned()];
        for seed in 0..100 {
            let mut scorer = seeded_scorer(seed);
            let intents = vec![intent("A", true, 8), intent("B", true, 2)];
            let order = scorer.smart_order(&intents, &recent);
            assert_eq!(order.first().map(String::as_str), Some("A"), "seed {seed}");
        }
    }

    #[test]
    fn fixed_seed_reproduces_exact_order() {
        let intents = vec![
            intent("P1", true, 5),
            intent("P2", true, 5),
            intent("P3", true, 5),
        ];
        let first = seeded_scorer(7).smart_order(&intents, &[]);
        let second = seeded_scorer(7).smart_order(&intents, &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn recency_term_tiers() {
        let speakers = vec!["P1".to_owned(), "P2".to_owned(), "P3".to_owned()];
        // P3 spoke last turn.
        assert!((recency_term("P3", &speakers, 3) - 0.0).abs() < f64::EPSILON);
        // P1 spoke within the window but not last.
        assert!((recency_term("P1", &speakers, 3) - 0.5).abs() < f64::EPSILON);
        // P4 has not spoken at all.
        assert!((recency_term("P4", &speakers, 3) - 1.0).abs() < f64::EPSILON);
        // With a window of 1, P1's earlier turn no longer counts.
        assert!((recency_term("P1", &speakers, 1) - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn gather_intents_reads_probe_replies() {
        let scorer = seeded_scorer(42);
        let responders = vec![
            Responder::new(
                "Thorin",
                "You are Thorin.",
                ResponderBackend::Scripted(ScriptedBackend::new(Vec::<String>::new())
                    .with_structured([serde_json::json!({
                        "wants_to_respond": true,
                        "relevance_score": 8,
                        "reason": "expert lockpicker"
                    })])),
            ),
            Responder::new(
                "Elara",
                "You are Elara.",
                ResponderBackend::Scripted(ScriptedBackend::new(Vec::<String>::new())
                    .with_structured([serde_json::json!({
                        "wants_to_respond": false,
                        "relevance_score": 1,
                        "reason": "keeping watch"
                    })])),
            ),
        ];

        let intents = scorer
            .gather_intents(&responders, "You see a locked chest.", "")
            .await;

        assert_eq!(intents.len(), 2);
        assert_eq!(
            intents.first().map(|i| (i.responder.as_str(), i.wants_to_respond)),
            Some(("Thorin", true))
        );
        assert_eq!(
            intents.get(1).map(|i| (i.responder.as_str(), i.wants_to_respond)),
            Some(("Elara", false))
        );
    }

    #[tokio::test]
    async fn failed_probe_degrades_to_neutral() {
        let scorer = seeded_scorer(42);
        // No structured replies queued: the probe errors out.
        let responders = vec![Responder::new(
            "Kira",
            "You are Kira.",
            ResponderBackend::Scripted(ScriptedBackend::new(Vec::<String>::new())),
        )];

        let intents = scorer.gather_intents(&responders, "Anything?", "").await;
        assert_eq!(intents.first(), Some(&ResponseIntent::neutral("Kira")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_degrades_to_neutral() {
        let scorer = seeded_scorer(42);
        let responders = vec![Responder::new(
            "Thorin",
            "You are Thorin.",
            ResponderBackend::Scripted(
                ScriptedBackend::new(Vec::<String>::new())
                    .with_structured([serde_json::json!({"wants_to_respond": true, "relevance_score": 9, "reason": "late"})])
                    .with_delay(Duration::from_secs(300)),
            ),
        )];

        let intents = scorer.gather_intents(&responders, "Quick!", "").await;
        assert_eq!(intents.first(), Some(&ResponseIntent::neutral("Thorin")));
    }

    #[tokio::test]
    async fn out_of_range_probe_score_is_clamped() {
        let scorer = seeded_scorer(42);
        let responders = vec![Responder::new(
            "Elara",
            "You are Elara.",
            ResponderBackend::Scripted(ScriptedBackend::new(Vec::<String>::new())
                .with_structured([serde_json::json!({
                    "wants_to_respond": true,
                    "relevance_score": 250,
                    "reason": "overeager"
                })])),
        )];

        let intents = scorer.gather_intents(&responders, "Well?", "").await;
        assert_eq!(intents.first().map(|i| i.relevance_score), Some(10));
    }
}
