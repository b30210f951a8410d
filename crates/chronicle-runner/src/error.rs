//! Error types for the responder runtime.
//!
//! Uses `thiserror` for typed errors surfacing through the invocation
//! pipeline: backend HTTP calls, prompt rendering, structured-output
//! parsing, and scripted-backend exhaustion.

/// Errors that can occur while invoking a responder.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A backend returned an error or was unreachable.
    #[error("backend error: {0}")]
    Backend(String),

    /// Failed to render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// A structured response could not be parsed as JSON.
    #[error("response parse error: {0}")]
    Parse(String),

    /// A scripted backend ran out of queued replies.
    #[error("scripted backend exhausted: no reply queued for {0}")]
    ScriptExhausted(&'static str),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
