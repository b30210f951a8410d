//! LLM backend abstraction and implementations.
//!
//! Defines an enum-based dispatch for LLM backends, avoiding the
//! dyn-compatibility issues with async trait methods. Concrete
//! implementations exist for OpenAI-compatible chat completions APIs and
//! the Anthropic Messages API, both over HTTP via `reqwest`, plus the
//! scripted backend from [`crate::scripted`] for offline runs and tests.
//!
//! Each seat at the table is constructed with its own backend, so a
//! narrator on one provider and party members spread across others is just
//! configuration. Nothing here inspects which model is behind the API --
//! a backend receives a system prompt, a history, and a user prompt, and
//! returns text.

use chronicle_types::HistoryTurn;
use serde::Deserialize;

use crate::error::RunnerError;
use crate::scripted::ScriptedBackend;

/// Sampling temperature used for narrative replies.
const REPLY_TEMPERATURE: f64 = 0.7;

/// Sampling temperature used for the structured side channel; lower, since
/// probe output is parsed rather than read.
const STRUCTURED_TEMPERATURE: f64 = 0.3;

/// Upper bound on completion length for a single reply.
const MAX_TOKENS: u32 = 512;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// OpenAI-compatible API (works with OpenAI, Groq, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API (different request format).
    Anthropic,
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    /// The backend type.
    pub backend: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    #[serde(default)]
    pub api_key: String,
    /// Environment variable consulted for the key when `api_key` is empty.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Model identifier (e.g. `gpt-4o-mini`).
    pub model: String,
}

impl BackendConfig {
    /// Resolve the API key, preferring the literal value and falling back to
    /// the configured environment variable.
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Unified backend enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// An LLM backend that can produce a reply for a responder.
///
/// Uses enum dispatch instead of trait objects because async methods are
/// not dyn-compatible in Rust. The set of variants is fixed at construction
/// time by configuration; there is no runtime type inspection.
pub enum ResponderBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// Deterministic scripted replies (tests, offline runs).
    Scripted(ScriptedBackend),
}

impl ResponderBackend {
    /// Produce a reply for `user` given the persona `system` prompt and the
    /// responder's private `history`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Backend`] if the HTTP call fails or the
    /// response cannot be extracted, or [`RunnerError::ScriptExhausted`]
    /// for a drained scripted backend.
    pub async fn complete(
        &self,
        system: &str,
        history: &[HistoryTurn],
        user: &str,
    ) -> Result<String, RunnerError> {
        match self {
            Self::OpenAi(backend) => backend.complete(system, history, user).await,
            Self::Anthropic(backend) => backend.complete(system, history, user).await,
            Self::Scripted(backend) => backend.complete().await,
        }
    }

    /// Produce a JSON value for `user` on the structured side channel.
    ///
    /// History is deliberately not sent: the side channel answers a
    /// one-shot question about the current prompt, not the conversation.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Backend`] on transport failure or
    /// [`RunnerError::Parse`] if no JSON can be recovered from the reply.
    pub async fn complete_structured(
        &self,
        system: &str,
        user: &str,
    ) -> Result<serde_json::Value, RunnerError> {
        let raw = match self {
            Self::OpenAi(backend) => backend.complete_structured(system, user).await?,
            Self::Anthropic(backend) => backend.complete(system, &[], user).await?,
            Self::Scripted(backend) => return backend.complete_structured().await,
        };
        crate::parse::extract_json(&raw)
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Scripted(_) => "scripted",
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with OpenAI, Groq, `DeepSeek`, and Ollama endpoints. Sends
/// requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.resolved_api_key(),
            model: config.model.clone(),
        }
    }

    /// Send a chat request and return the reply text.
    async fn complete(
        &self,
        system: &str,
        history: &[HistoryTurn],
        user: &str,
    ) -> Result<String, RunnerError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": build_chat_messages(system, history, user),
            "temperature": REPLY_TEMPERATURE,
            "max_tokens": MAX_TOKENS
        });
        let json = self.send("chat/completions", &body).await?;
        extract_openai_content(&json)
    }

    /// Send a JSON-mode request and return the raw reply text.
    async fn complete_structured(&self, system: &str, user: &str) -> Result<String, RunnerError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": build_chat_messages(system, &[], user),
            "temperature": STRUCTURED_TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"}
        });
        let json = self.send("chat/completions", &body).await?;
        extract_openai_content(&json)
    }

    /// POST a request body and return the parsed response JSON.
    async fn send(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, RunnerError> {
        let url = format!("{}/{path}", self.api_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| RunnerError::Backend(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RunnerError::Backend(format!(
                "OpenAI returned {status}: {error_body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RunnerError::Backend(format!("OpenAI response parse failed: {e}")))
    }
}

/// Build the chat messages array: system, then history, then the new user
/// prompt.
fn build_chat_messages(
    system: &str,
    history: &[HistoryTurn],
    user: &str,
) -> Vec<serde_json::Value> {
    let mut messages = vec![serde_json::json!({"role": "system", "content": system})];
    messages.extend(history.iter().map(|turn| {
        serde_json::json!({"role": turn.role.as_str(), "content": turn.content})
    }));
    messages.push(serde_json::json!({"role": "user", "content": user}));
    messages
}

/// Extract the text content from an OpenAI chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, RunnerError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::Backend("OpenAI response missing choices[0].message.content".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Anthropic uses a different request format from OpenAI:
/// - `x-api-key` header instead of `Authorization: Bearer`
/// - system prompt is a top-level field, not a message
/// - response structure differs: `content[0].text`
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.resolved_api_key(),
            model: config.model.clone(),
        }
    }

    /// Send a messages request and return the reply text.
    async fn complete(
        &self,
        system: &str,
        history: &[HistoryTurn],
        user: &str,
    ) -> Result<String, RunnerError> {
        let url = format!("{}/messages", self.api_url);

        let mut messages: Vec<serde_json::Value> = history
            .iter()
            .map(|turn| {
                serde_json::json!({"role": turn.role.as_str(), "content": turn.content})
            })
            .collect();
        messages.push(serde_json::json!({"role": "user", "content": user}));

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": messages
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RunnerError::Backend(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RunnerError::Backend(format!(
                "Anthropic returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RunnerError::Backend(format!("Anthropic response parse failed: {e}")))?;

        extract_anthropic_content(&json)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, RunnerError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| RunnerError::Backend("Anthropic response missing content[0].text".to_owned()))
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an LLM backend from configuration.
///
/// Dispatches to [`OpenAiBackend`] or [`AnthropicBackend`] based on the
/// configured [`BackendType`]. Scripted backends are constructed directly
/// by tests and never come from configuration.
pub fn create_backend(config: &BackendConfig) -> ResponderBackend {
    match config.backend {
        BackendType::OpenAi => ResponderBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => ResponderBackend::Anthropic(AnthropicBackend::new(config)),
    }
}
