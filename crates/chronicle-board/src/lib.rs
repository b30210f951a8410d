//! Shared append-only message board for the Chronicle narrative engine.
//!
//! Every line of the session -- narrator turns, party replies, system
//! notices, recovered errors -- lands on one [`MessageBoard`] in append
//! order. The board is the only piece of state touched by more than one
//! logical actor at a time (the scheduler writes while external observers
//! read), so it guards itself with a single lock held across the combined
//! append-and-notify step.
//!
//! # Guarantees
//!
//! - **Append order is the total order.** Any reader observes a prefix of
//!   the single global sequence.
//! - **Append + notify is atomic** with respect to other posters: two
//!   concurrent posts never interleave their subscriber notifications.
//! - **Subscribers cannot break the board.** A failing callback is logged
//!   and skipped; the message stays appended and later subscribers still
//!   run.
//!
//! # Known limitation
//!
//! The board never evicts. A long-running session grows without bound;
//! callers that care should `clear()` between sessions.

mod board;

pub use board::{MessageBoard, SubscriberFn};

/// Error a subscriber callback may return to signal delivery failure.
///
/// Returned errors are logged by the board and never propagate to the
/// poster; the round continues regardless.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("subscriber delivery failed: {reason}")]
pub struct SubscriberError {
    /// Human-readable description of the delivery failure.
    pub reason: String,
}

impl SubscriberError {
    /// Create a delivery failure with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
