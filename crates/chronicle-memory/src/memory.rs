//! The [`MemorySystem`]: private histories plus the shared board, and the
//! invocation bridge between them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chronicle_board::MessageBoard;
use chronicle_runner::Responder;
use chronicle_types::{HistoryTurn, Message};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::world::WorldState;
use crate::MemoryError;

/// Default number of board messages included in a responder's context
/// window.
const DEFAULT_CONTEXT_MESSAGES: usize = 20;

/// One responder's ordered private conversation history.
///
/// Exclusively owned by that responder's slot in the [`MemorySystem`] and
/// mutated only during that responder's own turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateHistory {
    turns: Vec<HistoryTurn>,
}

impl PrivateHistory {
    /// The recorded turns, oldest first.
    pub fn turns(&self) -> &[HistoryTurn] {
        &self.turns
    }

    /// Record one prompt/reply exchange.
    pub fn push_exchange(&mut self, prompt: impl Into<String>, reply: impl Into<String>) {
        self.turns.push(HistoryTurn::user(prompt));
        self.turns.push(HistoryTurn::assistant(reply));
    }

    /// Number of recorded turns.
    pub const fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns have been recorded.
    pub const fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every recorded turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Private per-responder histories + shared board + world snapshot.
///
/// The scheduler owns one of these per session. All responder invocations
/// flow through [`MemorySystem::respond`] so that both memory scopes stay
/// consistent with what was actually said.
pub struct MemorySystem {
    histories: BTreeMap<String, PrivateHistory>,
    board: Arc<MessageBoard>,
    world: WorldState,
    context_messages: usize,
}

impl MemorySystem {
    /// Create a memory system writing to the given board.
    pub fn new(board: Arc<MessageBoard>) -> Self {
        Self {
            histories: BTreeMap::new(),
            board,
            world: WorldState::new(),
            context_messages: DEFAULT_CONTEXT_MESSAGES,
        }
    }

    /// Override the context window size (number of recent board messages
    /// prefixed to prompts).
    #[must_use]
    pub const fn with_context_messages(mut self, context_messages: usize) -> Self {
        self.context_messages = context_messages;
        self
    }

    /// The shared board this system posts to.
    pub const fn board(&self) -> &Arc<MessageBoard> {
        &self.board
    }

    /// A responder's private history, if it has spoken or been prompted.
    pub fn history(&self, responder: &str) -> Option<&PrivateHistory> {
        self.histories.get(responder)
    }

    /// Invoke `responder` with `prompt` under `deadline`, recording the
    /// exchange in both memory scopes.
    ///
    /// The augmented prompt is the last-N-message board context (when
    /// `include_context` is set and the board is non-empty) followed by the
    /// literal prompt. The responder's private history is passed explicitly
    /// to the invocation. On success the exchange is appended to the
    /// private history -- unless the responder self-persists, in which case
    /// re-recording would duplicate its context -- and the reply is posted
    /// to the board under the responder's name.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::Timeout`] if the deadline elapses. Nothing is
    ///   recorded; the in-flight call is dropped.
    /// - [`MemoryError::Invocation`] if the backend fails.
    pub async fn respond(
        &mut self,
        responder: &Responder,
        prompt: &str,
        include_context: bool,
        deadline: Duration,
    ) -> Result<String, MemoryError> {
        let full_prompt = self.build_prompt(prompt, include_context).await;
        let name = responder.name().to_owned();

        let history = self.histories.entry(name.clone()).or_default();

        debug!(
            responder = name,
            include_context,
            deadline_ms = deadline.as_millis(),
            history_turns = history.len(),
            "responder turn starting"
        );

        let reply = match timeout(deadline, responder.invoke(&full_prompt, history.turns())).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(source)) => {
                return Err(MemoryError::Invocation {
                    responder: name,
                    source,
                });
            }
            Err(_elapsed) => {
                return Err(MemoryError::Timeout {
                    responder: name,
                    deadline,
                });
            }
        };

        if responder.self_persisting() {
            debug!(responder = name, "backend self-persists, skipping history record");
        } else {
            history.push_exchange(full_prompt, reply.text.clone());
        }

        self.board.post(Message::reply(&name, reply.text.clone())).await;

        info!(
            responder = name,
            reply_len = reply.text.len(),
            "responder turn recorded"
        );

        Ok(reply.text)
    }

    /// Replace the shared world snapshot wholesale.
    pub fn update_world_state(&mut self, state: BTreeMap<String, serde_json::Value>) {
        self.world.replace(state);
    }

    /// The current world snapshot.
    pub const fn world_state(&self) -> &WorldState {
        &self.world
    }

    /// Wipe every private history, the board, and the world snapshot.
    pub async fn clear_all(&mut self) {
        for history in self.histories.values_mut() {
            history.clear();
        }
        self.board.clear().await;
        self.world.reset();
        info!("memory system cleared");
    }

    /// Build the augmented prompt: optional board context prefix plus the
    /// literal prompt.
    async fn build_prompt(&self, prompt: &str, include_context: bool) -> String {
        if !include_context || self.board.is_empty().await {
            return prompt.to_owned();
        }
        let context = self.board.get_context_window(self.context_messages).await;
        format!("Recent game context:\n{context}\n\n{prompt}")
    }
}

#[cfg(test)]
mod tests {
    use chronicle_runner::{ResponderBackend, ScriptedBackend};

    use super::*;

    fn scripted(name: &str, replies: &[&str]) -> Responder {
        Responder::new(
            name,
            format!("You are {name}."),
            ResponderBackend::Scripted(ScriptedBackend::new(replies.to_vec())),
        )
    }

    fn system() -> MemorySystem {
        MemorySystem::new(Arc::new(MessageBoard::new()))
    }

    const DEADLINE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn respond_records_both_scopes() {
        let mut memory = system();
        let narrator = scripted("Narrator", &["You stand before the gates."]);

        let reply = memory.respond(&narrator, "Start the adventure.", true, DEADLINE).await;
        assert_eq!(reply.unwrap_or_default(), "You stand before the gates.");

        // Private scope: one exchange, two turns.
        let history = memory.history("Narrator");
        assert_eq!(history.map(PrivateHistory::len), Some(2));

        // Shared scope: one board message under the responder's name.
        let recent = memory.board().get_recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.first().map(|m| m.author.as_str()), Some("Narrator"));
    }

    #[tokio::test]
    async fn context_prefix_appears_once_board_is_nonempty() {
        let mut memory = system();
        let narrator = scripted("Narrator", &["Opening scene.", "Second scene."]);

        // First call: empty board, no context prefix.
        memory.respond(&narrator, "Start.", true, DEADLINE).await.ok();
        let first_prompt = memory
            .history("Narrator")
            .and_then(|h| h.turns().first())
            .map(|t| t.content.clone())
            .unwrap_or_default();
        assert_eq!(first_prompt, "Start.");

        // Second call: the first reply is on the board now.
        memory.respond(&narrator, "Continue.", true, DEADLINE).await.ok();
        let third_turn = memory
            .history("Narrator")
            .and_then(|h| h.turns().get(2))
            .map(|t| t.content.clone())
            .unwrap_or_default();
        assert!(third_turn.starts_with("Recent game context:"));
        assert!(third_turn.contains("[Narrator]: Opening scene."));
        assert!(third_turn.ends_with("Continue."));
    }

    #[tokio::test]
    async fn context_can_be_disabled() {
        let mut memory = system();
        let narrator = scripted("Narrator", &["One.", "Two."]);

        memory.respond(&narrator, "Start.", false, DEADLINE).await.ok();
        memory.respond(&narrator, "Continue.", false, DEADLINE).await.ok();

        let third_turn = memory
            .history("Narrator")
            .and_then(|h| h.turns().get(2))
            .map(|t| t.content.clone())
            .unwrap_or_default();
        assert_eq!(third_turn, "Continue.");
    }

    #[tokio::test]
    async fn self_persisting_responder_skips_history_but_posts() {
        let mut memory = system();
        let responder = scripted("Thorin", &["I hold the line."]).with_self_persistence(true);

        memory.respond(&responder, "Orcs charge!", true, DEADLINE).await.ok();

        assert!(
            memory.history("Thorin").is_none_or(PrivateHistory::is_empty),
            "self-persisting responders must not be double-recorded"
        );
        assert_eq!(memory.board().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_timeout_and_records_nothing() {
        let mut memory = system();
        let slow = Responder::new(
            "Kira",
            "You are Kira.",
            ResponderBackend::Scripted(
                ScriptedBackend::new(["too late"]).with_delay(Duration::from_secs(120)),
            ),
        );

        let result = memory.respond(&slow, "Quick!", false, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(MemoryError::Timeout { .. })));
        assert!(memory.history("Kira").is_none_or(PrivateHistory::is_empty));
        assert!(memory.board().is_empty().await);
    }

    #[tokio::test]
    async fn invocation_failure_is_typed() {
        let mut memory = system();
        let broken = scripted("Elara", &[]);

        let result = memory.respond(&broken, "Speak.", false, DEADLINE).await;
        assert!(matches!(result, Err(MemoryError::Invocation { .. })));
    }

    #[tokio::test]
    async fn clear_all_wipes_histories_board_and_world() {
        let mut memory = system();
        let narrator = scripted("Narrator", &["Scene one."]);
        memory.respond(&narrator, "Start.", true, DEADLINE).await.ok();

        let mut state = BTreeMap::new();
        state.insert("location".to_owned(), serde_json::json!("tavern"));
        memory.update_world_state(state);

        memory.clear_all().await;

        assert!(memory.history("Narrator").is_none_or(PrivateHistory::is_empty));
        assert!(memory.board().get_recent(50).await.is_empty());
        assert!(memory.world_state().get().is_empty());
    }
}
