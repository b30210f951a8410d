//! Deterministic scripted backend for tests and offline runs.
//!
//! Replays queued replies in order, exactly like a stub decision source:
//! the full round loop can be exercised end-to-end without any network
//! access or API keys. An optional artificial delay makes deadline handling
//! testable under a paused tokio clock.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::RunnerError;

/// A backend that replays pre-loaded replies instead of calling a model.
///
/// Text replies and structured replies are drawn from separate queues so a
/// single scripted seat can serve both the narrative channel and the probe
/// side channel in one session.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    structured: Mutex<VecDeque<serde_json::Value>>,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    /// Create a backend that will return the given replies, in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            structured: Mutex::new(VecDeque::new()),
            delay: None,
        }
    }

    /// Queue structured side-channel replies, in order.
    #[must_use]
    pub fn with_structured<I>(self, values: I) -> Self
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        if let Ok(mut queue) = self.structured.lock() {
            queue.extend(values);
        }
        self
    }

    /// Sleep for `delay` before every reply, so deadline handling can be
    /// exercised with a paused test clock.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Pop the next text reply.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::ScriptExhausted`] when the queue is drained,
    /// which doubles as the scripted way to simulate an invocation failure.
    pub async fn complete(&self) -> Result<String, RunnerError> {
        self.sleep_if_configured().await;
        self.replies
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or(RunnerError::ScriptExhausted("reply"))
    }

    /// Pop the next structured reply.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::ScriptExhausted`] when the queue is drained.
    pub async fn complete_structured(&self) -> Result<serde_json::Value, RunnerError> {
        self.sleep_if_configured().await;
        self.structured
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or(RunnerError::ScriptExhausted("structured reply"))
    }

    async fn sleep_if_configured(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}
