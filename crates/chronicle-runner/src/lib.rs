//! Responder runtime for the Chronicle narrative engine.
//!
//! A responder is one seat at the table -- the narrator or a party member --
//! backed by a remote language model (or a scripted stand-in for tests).
//! This crate owns everything between "here is a prompt and a history" and
//! "here is the reply text":
//!
//! - [`llm`] -- enum-dispatched backends (OpenAI-compatible chat completions,
//!   Anthropic Messages API) plus the factory that builds them from config
//! - [`scripted`] -- a deterministic backend that replays queued replies,
//!   used to exercise the full loop without network access
//! - [`responder`] -- the [`Responder`] itself: name, persona system prompt,
//!   backend, and the self-persistence capability flag
//! - [`prompt`] -- `minijinja` templates loaded from disk so personas and
//!   probe wording can be tuned without recompiling
//! - [`parse`] -- recovery-strategy JSON extraction for the structured
//!   side channel
//!
//! Invocations carry no internal deadline; callers wrap each call in
//! `tokio::time::timeout` so the deadline is always explicit at the call
//! site.

pub mod error;
pub mod llm;
pub mod parse;
pub mod prompt;
pub mod responder;
pub mod scripted;

pub use error::RunnerError;
pub use llm::{BackendConfig, BackendType, ResponderBackend, create_backend};
pub use prompt::PromptEngine;
pub use responder::{Responder, ResponderReply};
pub use scripted::ScriptedBackend;
