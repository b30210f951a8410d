//! Dual-scope memory for the Chronicle narrative engine.
//!
//! Every responder remembers two things: what *it* said and was asked
//! (private, per-seat), and what *everyone* said (shared, on the board).
//! The [`MemorySystem`] owns both scopes and bridges a single invocation:
//! build the context-augmented prompt, call the responder under a deadline,
//! record the exchange on both sides, return the reply.
//!
//! # Scopes
//!
//! - [`PrivateHistory`] -- one ordered turn list per responder name,
//!   mutated only during that responder's own turn. History is handed to
//!   the responder explicitly as a call parameter; there is no shared
//!   "active history" slot to swap and restore.
//! - The shared [`MessageBoard`](chronicle_board::MessageBoard) -- every
//!   reply is also posted there for the rest of the table and any external
//!   observers.
//! - [`WorldState`] -- a coarse shared snapshot (location, conditions,
//!   whatever the caller puts in it), replaced wholesale, last writer wins.

mod memory;
mod world;

pub use memory::{MemorySystem, PrivateHistory};
pub use world::WorldState;

use std::time::Duration;

/// Errors produced while bridging a responder invocation.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The responder did not reply within its deadline.
    ///
    /// The exchange is not recorded anywhere; the caller decides whether
    /// to log it on the board.
    #[error("responder {responder} timed out (deadline: {deadline:?})")]
    Timeout {
        /// The responder that timed out.
        responder: String,
        /// The deadline that was exceeded.
        deadline: Duration,
    },

    /// The responder's backend failed.
    #[error("responder {responder} invocation failed: {source}")]
    Invocation {
        /// The responder that failed.
        responder: String,
        /// The underlying runner error.
        source: chronicle_runner::RunnerError,
    },
}
