//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `chronicle-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure and provides a loader that reads the file. Every field
//! has a default, so a minimal file (or none of a given section) still
//! yields a runnable configuration.
//!
//! API keys are never written into the file: each backend entry names the
//! environment variable that holds its key.

use std::path::Path;
use std::time::Duration;

use chronicle_runner::{BackendConfig, BackendType};
use serde::Deserialize;

use crate::scheduler::SchedulerConfig;
use crate::scoring::ScoringConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `chronicle-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChronicleConfig {
    /// Session-level settings (name, turn budget, opening prompt).
    #[serde(default)]
    pub session: SessionConfig,

    /// Round loop settings.
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Probe and ordering settings.
    #[serde(default)]
    pub scoring: ScoringSection,

    /// LLM backend selection per seat.
    #[serde(default)]
    pub llm: LlmSection,

    /// The party roster: one entry per member seat.
    #[serde(default)]
    pub party: Vec<PartyMemberConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory holding the prompt templates.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

impl ChronicleConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&contents)?)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// The scheduler parameters expressed in engine types.
    pub const fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            narrator_deadline: Duration::from_millis(self.scheduler.narrator_timeout_ms),
            responder_deadline: Duration::from_millis(self.scheduler.responder_timeout_ms),
            probe_context_messages: self.scheduler.probe_context_messages,
            recent_speakers_cap: self.scheduler.recent_speakers_cap,
            pause_poll: Duration::from_millis(self.scheduler.pause_poll_ms),
        }
    }

    /// The scoring parameters expressed in engine types.
    pub const fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            relevance_weight: self.scoring.relevance_weight,
            recency_weight: self.scoring.recency_weight,
            variety_weight: self.scoring.variety_weight,
            recency_window: self.scoring.recency_window,
            variety_scale: self.scoring.variety_scale,
            probe_timeout: Duration::from_millis(self.scoring.probe_timeout_ms),
            seed: self.scoring.seed,
        }
    }

    /// The backend configuration for a party member: its own override, or
    /// the party default.
    pub fn member_backend<'a>(&'a self, member: &'a PartyMemberConfig) -> &'a BackendConfig {
        member.backend.as_ref().unwrap_or(&self.llm.party_default)
    }
}

/// Session-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Human-readable session name.
    #[serde(default = "default_session_name")]
    pub name: String,

    /// Maximum narrator turns before the session ends.
    #[serde(default = "default_max_turns")]
    pub max_turns: u64,

    /// Opening prompt for the first narrator turn.
    #[serde(default)]
    pub initial_prompt: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            max_turns: default_max_turns(),
            initial_prompt: None,
        }
    }
}

/// Round loop configuration (milliseconds at the YAML surface).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerSection {
    /// Deadline for each narrator turn.
    #[serde(default = "default_turn_timeout_ms")]
    pub narrator_timeout_ms: u64,

    /// Deadline for each party member turn.
    #[serde(default = "default_turn_timeout_ms")]
    pub responder_timeout_ms: u64,

    /// Board messages included in each responder's context window.
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,

    /// Board messages included in probe context.
    #[serde(default = "default_probe_context_messages")]
    pub probe_context_messages: usize,

    /// Bound on the recent-speakers history.
    #[serde(default = "default_recent_speakers_cap")]
    pub recent_speakers_cap: usize,

    /// How often a paused loop re-checks its flags.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            narrator_timeout_ms: default_turn_timeout_ms(),
            responder_timeout_ms: default_turn_timeout_ms(),
            context_messages: default_context_messages(),
            probe_context_messages: default_probe_context_messages(),
            recent_speakers_cap: default_recent_speakers_cap(),
            pause_poll_ms: default_pause_poll_ms(),
        }
    }
}

/// Probe and ordering configuration.
///
/// The weights and window are empirical values carried from play-testing;
/// they are configuration precisely so they can keep being tuned.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoringSection {
    /// Weight of the normalized relevance term.
    #[serde(default = "default_relevance_weight")]
    pub relevance_weight: f64,

    /// Weight of the recency term.
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    /// Weight of the variety term.
    #[serde(default = "default_variety_weight")]
    pub variety_weight: f64,

    /// How many recent speakers count as "spoke recently".
    #[serde(default = "default_recency_window")]
    pub recency_window: usize,

    /// Scale applied to the uniform variety draw.
    #[serde(default = "default_variety_scale")]
    pub variety_scale: f64,

    /// Deadline for each willingness probe.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// RNG seed for reproducible ordering; omit for OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            relevance_weight: default_relevance_weight(),
            recency_weight: default_recency_weight(),
            variety_weight: default_variety_weight(),
            recency_window: default_recency_window(),
            variety_scale: default_variety_scale(),
            probe_timeout_ms: default_probe_timeout_ms(),
            seed: None,
        }
    }
}

/// LLM backend selection per seat.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LlmSection {
    /// The narrator's backend.
    #[serde(default = "default_narrator_backend")]
    pub narrator: BackendConfig,

    /// Backend used by party members without an override.
    #[serde(default = "default_party_backend")]
    pub party_default: BackendConfig,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            narrator: default_narrator_backend(),
            party_default: default_party_backend(),
        }
    }
}

/// One party member seat.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartyMemberConfig {
    /// The member's display name (also the classifier's match target).
    pub name: String,

    /// Free-text persona rendered into the member's system prompt.
    #[serde(default)]
    pub persona: String,

    /// Backend override for this seat; omit to use the party default.
    #[serde(default)]
    pub backend: Option<BackendConfig>,

    /// Whether this seat's backend persists its own turn history.
    #[serde(default)]
    pub self_persisting: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_session_name() -> String {
    String::from("chronicle-session")
}

const fn default_max_turns() -> u64 {
    50
}

const fn default_turn_timeout_ms() -> u64 {
    60_000
}

const fn default_context_messages() -> usize {
    20
}

const fn default_probe_context_messages() -> usize {
    10
}

const fn default_recent_speakers_cap() -> usize {
    8
}

const fn default_pause_poll_ms() -> u64 {
    250
}

const fn default_relevance_weight() -> f64 {
    0.5
}

const fn default_recency_weight() -> f64 {
    0.3
}

const fn default_variety_weight() -> f64 {
    0.2
}

const fn default_recency_window() -> usize {
    3
}

const fn default_variety_scale() -> f64 {
    0.3
}

const fn default_probe_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_templates_dir() -> String {
    String::from("templates")
}

fn default_narrator_backend() -> BackendConfig {
    BackendConfig {
        backend: BackendType::OpenAi,
        api_url: String::from("https://api.openai.com/v1"),
        api_key: String::new(),
        api_key_env: Some(String::from("OPENAI_API_KEY")),
        model: String::from("gpt-4o-mini"),
    }
}

fn default_party_backend() -> BackendConfig {
    BackendConfig {
        backend: BackendType::OpenAi,
        api_url: String::from("https://api.groq.com/openai/v1"),
        api_key: String::new(),
        api_key_env: Some(String::from("GROQ_API_KEY")),
        model: String::from("llama-3.3-70b-versatile"),
    }
}
