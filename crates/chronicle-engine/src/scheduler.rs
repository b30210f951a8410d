//! The [`TurnScheduler`]: the round loop that drives a session.
//!
//! Each round walks a fixed state sequence:
//!
//! 1. **Narrator turn** -- the narrator speaks (opening prompt on turn one,
//!    a continue prompt thereafter).
//! 2. **Routing decision** -- the narrator's message is classified; a
//!    directed prompt selects one member, an open prompt runs willingness
//!    probes and composite ordering, initiative selects everyone in
//!    registration order.
//! 3. **Responder turns** -- the selected members speak strictly
//!    sequentially, each under its own deadline. Sequential execution is
//!    deliberate: it keeps the board's append order aligned with narrative
//!    causality. A member that times out or fails gets exactly one
//!    error-kind board message and the round moves on; a single
//!    unresponsive seat never stalls the table.
//!
//! The loop repeats until the turn budget is spent or `stop()` is observed
//! (checked once per iteration). `pause()` parks the loop between
//! iterations until `resume()` or `stop()`; in-flight calls are always
//! allowed to finish or time out naturally, so shutdown latency is bounded
//! by one deadline.
//!
//! The single fatal path is a narrator failure: without narration there is
//! no round, so it surfaces to the caller as [`SchedulerError`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chronicle_memory::{MemoryError, MemorySystem};
use chronicle_runner::{PromptEngine, Responder};
use chronicle_types::Message;
use tracing::{info, warn};

use crate::intent::{Intent, classify};
use crate::scoring::ResponseScorer;

/// Opening prompt for the first narrator turn when none is supplied.
const START_PROMPT: &str = "Start the adventure. Describe the opening scene.";

/// Narrator prompt for every turn after the first.
const CONTINUE_PROMPT: &str = "Continue the adventure based on recent events.";

/// Errors that end a session abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The narrator's turn failed or timed out; no recovery is defined.
    #[error("narrator turn failed: {source}")]
    Narrator {
        /// The underlying memory-system error.
        #[from]
        source: MemoryError,
    },
}

/// Where the scheduler currently is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, not yet started.
    Idle,
    /// The narrator is speaking.
    NarratorTurn,
    /// The narrator's message is being classified and routed.
    RoutingDecision,
    /// Selected members are speaking sequentially.
    ResponderTurns,
    /// The session is over.
    Ended,
}

/// Tunable scheduler parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Deadline for each narrator turn.
    pub narrator_deadline: Duration,
    /// Deadline for each party member turn.
    pub responder_deadline: Duration,
    /// Board messages included in probe context.
    pub probe_context_messages: usize,
    /// Bound on the recent-speakers history feeding the recency term.
    pub recent_speakers_cap: usize,
    /// How often the parked loop re-checks the pause flag.
    pub pause_poll: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            narrator_deadline: Duration::from_secs(60),
            responder_deadline: Duration::from_secs(60),
            probe_context_messages: 10,
            recent_speakers_cap: 8,
            pause_poll: Duration::from_millis(250),
        }
    }
}

/// Cloneable control surface for a running session.
///
/// Flags are checked at iteration granularity, never mid-call: an in-flight
/// invocation finishes or times out on its own deadline.
#[derive(Debug, Clone, Default)]
pub struct SchedulerHandle {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Request a terminal stop; observed within one loop iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Park the loop after the current iteration.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Let a parked loop continue.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Whether the session is still allowed to run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the loop is parked.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Clear the stop flag for a new session. A pre-set pause is honored,
    /// so a session can be started parked and released with `resume()`.
    fn reset(&self) {
        self.running.store(true, Ordering::SeqCst);
    }
}

/// What one completed session looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Narrator turns completed.
    pub turns: u64,
    /// Total messages on the board, including system notices.
    pub messages: usize,
}

/// Drives the narrator/party round loop over the dual-scope memory.
pub struct TurnScheduler {
    narrator: Responder,
    party: Vec<Responder>,
    member_names: Vec<String>,
    memory: MemorySystem,
    scorer: ResponseScorer,
    prompts: Arc<PromptEngine>,
    config: SchedulerConfig,
    recent_speakers: VecDeque<String>,
    turn_count: u64,
    state: SchedulerState,
    handle: SchedulerHandle,
}

impl TurnScheduler {
    /// Assemble a scheduler. Party order is registration order and drives
    /// initiative routing.
    pub fn new(
        narrator: Responder,
        party: Vec<Responder>,
        memory: MemorySystem,
        scorer: ResponseScorer,
        prompts: Arc<PromptEngine>,
        config: SchedulerConfig,
    ) -> Self {
        let member_names = party.iter().map(|r| r.name().to_owned()).collect();
        Self {
            narrator,
            party,
            member_names,
            memory,
            scorer,
            prompts,
            config,
            recent_speakers: VecDeque::new(),
            turn_count: 0,
            state: SchedulerState::Idle,
            handle: SchedulerHandle::default(),
        }
    }

    /// The control surface for this session; clone it freely.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Current position in the state machine.
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Narrator turns completed so far.
    pub const fn turn_count(&self) -> u64 {
        self.turn_count
    }

    /// Look up a party member by name. Absent names are absent, not errors.
    pub fn member(&self, name: &str) -> Option<&Responder> {
        self.party.iter().find(|r| r.name() == name)
    }

    /// The full session transcript, oldest first.
    pub async fn transcript(&self) -> Vec<Message> {
        self.memory.board().get_recent(usize::MAX).await
    }

    /// The last `n` transcript messages.
    pub async fn recent_transcript(&self, n: usize) -> Vec<Message> {
        self.memory.board().get_recent(n).await
    }

    /// Run the round loop for at most `max_turns` narrator turns.
    ///
    /// `initial_prompt` seeds the first narrator turn; later turns use a
    /// fixed continue prompt. Posts a system message at session start and
    /// end.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Narrator`] if a narrator turn fails or
    /// times out -- the one condition with no defined recovery.
    pub async fn start(
        &mut self,
        max_turns: u64,
        initial_prompt: Option<&str>,
    ) -> Result<SessionSummary, SchedulerError> {
        self.handle.reset();
        self.turn_count = 0;
        self.recent_speakers.clear();

        self.memory.board().post(Message::system("Game started!")).await;
        info!(max_turns, "session started");

        while self.handle.is_running() && self.turn_count < max_turns {
            self.park_while_paused().await;
            if !self.handle.is_running() {
                break;
            }

            self.turn_count = self.turn_count.saturating_add(1);
            let narrator_text = self.narrator_turn(initial_prompt).await?;

            self.state = SchedulerState::RoutingDecision;
            let intent = classify(&narrator_text, &self.member_names);
            info!(turn = self.turn_count, intent = %intent, "narrator intent classified");

            let order = self.route(&intent, &narrator_text).await;

            self.state = SchedulerState::ResponderTurns;
            self.responder_turns(&order, &narrator_text).await;
        }

        self.state = SchedulerState::Ended;
        let closing = format!("Game ended after {} turns.", self.turn_count);
        self.memory.board().post(Message::system(closing)).await;

        let summary = SessionSummary {
            turns: self.turn_count,
            messages: self.memory.board().len().await,
        };
        info!(
            turns = summary.turns,
            messages = summary.messages,
            "session ended"
        );
        Ok(summary)
    }

    /// Sleep in short intervals while paused, waking for stop.
    async fn park_while_paused(&self) {
        while self.handle.is_paused() && self.handle.is_running() {
            tokio::time::sleep(self.config.pause_poll).await;
        }
    }

    /// Run one narrator turn and return the narration text.
    async fn narrator_turn(
        &mut self,
        initial_prompt: Option<&str>,
    ) -> Result<String, SchedulerError> {
        self.state = SchedulerState::NarratorTurn;

        let prompt = if self.turn_count == 1 {
            initial_prompt.unwrap_or(START_PROMPT)
        } else {
            CONTINUE_PROMPT
        };

        let text = self
            .memory
            .respond(&self.narrator, prompt, true, self.config.narrator_deadline)
            .await?;
        Ok(text)
    }

    /// Decide which members act for this round, in order.
    async fn route(&mut self, intent: &Intent, narrator_text: &str) -> Vec<String> {
        match intent {
            Intent::Directed { target, .. } => {
                if self.member(target).is_some() {
                    vec![target.clone()]
                } else {
                    // Zero responders act; record the routing miss for
                    // observers and move on.
                    warn!(member = %target, "directed intent names an unknown member");
                    self.memory
                        .board()
                        .post(Message::error(format!(
                            "Directed prompt targeted unknown member: {target}"
                        )))
                        .await;
                    Vec::new()
                }
            }
            Intent::Open { .. } => {
                let context = self
                    .memory
                    .board()
                    .get_context_window(self.config.probe_context_messages)
                    .await;
                let intents = self
                    .scorer
                    .gather_intents(&self.party, narrator_text, &context)
                    .await;
                let speakers: Vec<String> = self.recent_speakers.iter().cloned().collect();
                self.scorer.smart_order(&intents, &speakers)
            }
            // Documented simplification: everyone acts, registration order.
            // Real initiative sequencing is an extension point.
            Intent::Initiative => self.member_names.clone(),
        }
    }

    /// Invoke each selected member strictly sequentially.
    ///
    /// Failures and timeouts are recovered in place: one error-kind board
    /// message each, then on to the next member.
    async fn responder_turns(&mut self, order: &[String], narrator_text: &str) {
        let cue = self
            .prompts
            .respond_cue(&serde_json::json!({ "narrator_message": narrator_text }))
            .unwrap_or_else(|e| {
                warn!(error = %e, "respond template failed, using plain cue");
                format!("Respond to the narrator's message: {narrator_text}")
            });

        for name in order {
            let Some(index) = self.party.iter().position(|r| r.name() == name) else {
                continue;
            };
            let Some(responder) = self.party.get(index) else {
                continue;
            };

            match self
                .memory
                .respond(responder, &cue, true, self.config.responder_deadline)
                .await
            {
                Ok(_reply) => {
                    self.recent_speakers.push_back(name.clone());
                    while self.recent_speakers.len() > self.config.recent_speakers_cap {
                        self.recent_speakers.pop_front();
                    }
                }
                Err(MemoryError::Timeout { deadline, .. }) => {
                    warn!(
                        responder = name,
                        deadline_ms = deadline.as_millis(),
                        "member turn timed out, continuing round"
                    );
                    self.memory
                        .board()
                        .post(Message::error(format!(
                            "{name} failed to respond within timeout ({}s)",
                            deadline.as_secs()
                        )))
                        .await;
                }
                Err(MemoryError::Invocation { source, .. }) => {
                    warn!(
                        responder = name,
                        error = %source,
                        "member turn failed, continuing round"
                    );
                    self.memory
                        .board()
                        .post(Message::error(format!("Error from {name}: {source}")))
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_flags_toggle() {
        let handle = SchedulerHandle::default();
        handle.reset();
        assert!(handle.is_running());
        assert!(!handle.is_paused());

        handle.pause();
        assert!(handle.is_paused());
        handle.resume();
        assert!(!handle.is_paused());

        handle.stop();
        assert!(!handle.is_running());
    }

    #[test]
    fn default_config_matches_documented_deadlines() {
        let config = SchedulerConfig::default();
        assert_eq!(config.responder_deadline, Duration::from_secs(60));
        assert_eq!(config.narrator_deadline, Duration::from_secs(60));
    }
}
