//! The [`Responder`]: one seat at the table.
//!
//! A responder bundles a display name, a persona system prompt, a backend,
//! and one capability flag: whether the backend persists its own turn
//! history server-side. Self-persisting responders must not have their
//! turns re-recorded by the memory system, or every exchange would appear
//! twice in their context.

use chronicle_types::HistoryTurn;
use tracing::debug;

use crate::error::RunnerError;
use crate::llm::ResponderBackend;

/// The result of one responder invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponderReply {
    /// The narrative reply text.
    pub text: String,
    /// Optional structured payload, when the invocation asked for one.
    pub structured: Option<serde_json::Value>,
}

/// A named conversational actor backed by an LLM (or scripted) backend.
pub struct Responder {
    name: String,
    system_prompt: String,
    backend: ResponderBackend,
    self_persisting: bool,
}

impl Responder {
    /// Create a responder that does not self-persist history (the common
    /// case: history lives in the memory system and is replayed per call).
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        backend: ResponderBackend,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            backend,
            self_persisting: false,
        }
    }

    /// Mark whether the backend persists its own turn history.
    #[must_use]
    pub const fn with_self_persistence(mut self, self_persisting: bool) -> Self {
        self.self_persisting = self_persisting;
        self
    }

    /// The responder's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the backend persists its own turn history.
    pub const fn self_persisting(&self) -> bool {
        self.self_persisting
    }

    /// The backend's human-readable name, for logging.
    pub const fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Produce a narrative reply to `prompt`, given this responder's
    /// private `history`.
    ///
    /// History is passed explicitly per invocation -- the responder holds
    /// no conversational state of its own, so several responders can share
    /// a backend type without any swap-and-restore choreography.
    ///
    /// Carries no internal deadline; callers wrap this in
    /// `tokio::time::timeout`.
    pub async fn invoke(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
    ) -> Result<ResponderReply, RunnerError> {
        debug!(
            responder = self.name,
            backend = self.backend.name(),
            history_turns = history.len(),
            prompt_len = prompt.len(),
            "invoking responder"
        );
        let text = self
            .backend
            .complete(&self.system_prompt, history, prompt)
            .await?;
        Ok(ResponderReply {
            text,
            structured: None,
        })
    }

    /// Ask this responder's structured side channel a one-shot question.
    ///
    /// Used by open-prompt routing to probe willingness; the reply is JSON,
    /// recovered through the parse strategies in [`crate::parse`].
    pub async fn invoke_structured(
        &self,
        prompt: &str,
    ) -> Result<serde_json::Value, RunnerError> {
        debug!(
            responder = self.name,
            backend = self.backend.name(),
            "invoking structured side channel"
        );
        self.backend
            .complete_structured(&self.system_prompt, prompt)
            .await
    }
}
