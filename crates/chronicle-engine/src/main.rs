//! Session entry point for the Chronicle narrative engine.
//!
//! Wires the full stack together and runs one session:
//!
//! ```text
//! config -> prompt templates -> backends -> responders
//!        -> memory system -> scorer -> turn scheduler -> transcript
//! ```
//!
//! Every seat is constructed from configuration: the narrator and each
//! party member get a persona system prompt rendered from the templates
//! directory and an LLM backend chosen per seat. The scheduler then drives
//! the round loop until the turn budget is spent.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chronicle_board::MessageBoard;
use chronicle_engine::{ChronicleConfig, ResponseScorer, TurnScheduler};
use chronicle_memory::MemorySystem;
use chronicle_runner::{PromptEngine, Responder, create_backend};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default configuration file consulted when no path argument is given.
const DEFAULT_CONFIG_PATH: &str = "chronicle-config.yaml";

/// Application entry point.
///
/// Initializes logging, loads configuration, builds every seat, runs the
/// session, and prints the transcript.
///
/// # Errors
///
/// Returns an error if initialization fails or the narrator fails
/// mid-session.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
    let config = ChronicleConfig::from_file(Path::new(&config_path))
        .with_context(|| format!("loading {config_path}"))?;

    // Initialize structured logging (RUST_LOG overrides the config level).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with_target(true)
        .init();

    info!(
        session = config.session.name,
        max_turns = config.session.max_turns,
        party_size = config.party.len(),
        templates_dir = config.templates_dir,
        "chronicle starting"
    );

    // Load prompt templates.
    let prompts = Arc::new(PromptEngine::new(&config.templates_dir).context("loading templates")?);

    // Build the narrator seat.
    let narrator_system = prompts
        .narrator_system(&serde_json::json!({ "session_name": config.session.name }))
        .context("rendering narrator persona")?;
    let narrator = Responder::new(
        "Narrator",
        narrator_system,
        create_backend(&config.llm.narrator),
    );
    info!(
        backend = narrator.backend_name(),
        model = config.llm.narrator.model,
        "narrator configured"
    );

    // Build the party seats.
    let mut party = Vec::with_capacity(config.party.len());
    for member in &config.party {
        let system = prompts
            .member_system(&serde_json::json!({
                "name": member.name,
                "persona": member.persona,
            }))
            .with_context(|| format!("rendering persona for {}", member.name))?;
        let backend_config = config.member_backend(member);
        let responder = Responder::new(&member.name, system, create_backend(backend_config))
            .with_self_persistence(member.self_persisting);
        info!(
            member = member.name,
            backend = responder.backend_name(),
            model = backend_config.model,
            "party member configured"
        );
        party.push(responder);
    }

    // Assemble memory, scorer, and the scheduler.
    let board = Arc::new(MessageBoard::new());
    let memory = MemorySystem::new(Arc::clone(&board))
        .with_context_messages(config.scheduler.context_messages);
    let scorer = ResponseScorer::new(config.scoring_config(), Arc::clone(&prompts));
    let mut scheduler = TurnScheduler::new(
        narrator,
        party,
        memory,
        scorer,
        prompts,
        config.scheduler_config(),
    );

    info!("entering round loop");
    let summary = scheduler
        .start(
            config.session.max_turns,
            config.session.initial_prompt.as_deref(),
        )
        .await
        .context("session failed")?;

    println!("=== Transcript ({} messages) ===", summary.messages);
    for message in scheduler.transcript().await {
        println!("{message}");
    }

    Ok(())
}
