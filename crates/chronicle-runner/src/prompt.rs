//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/`
//! directory) so personas and probe wording can be tuned without
//! recompiling. Four templates make up the set:
//!
//! - `narrator_system.j2` -- the narrator's persona and table rules
//! - `member_system.j2` -- a party member's persona, rendered from its
//!   name and free-text persona description
//! - `probe.j2` -- the structured side-channel question ("should this
//!   character act now?")
//! - `respond.j2` -- the cue handed to a selected responder, wrapping the
//!   narrator's latest message

use minijinja::Environment;

use crate::error::RunnerError;

/// Template file names expected in the templates directory.
const TEMPLATE_FILES: [(&str, &str); 4] = [
    ("narrator_system", "narrator_system.j2"),
    ("member_system", "member_system.j2"),
    ("probe", "probe.j2"),
    ("respond", "respond.j2"),
];

/// Manages prompt template loading and rendering.
///
/// Wraps a `minijinja` [`Environment`] with all templates pre-loaded.
/// Templates can be edited on disk and are picked up on the next call to
/// [`PromptEngine::new`].
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Create a new prompt engine loading templates from the given
    /// directory.
    ///
    /// The directory must contain `narrator_system.j2`, `member_system.j2`,
    /// `probe.j2`, and `respond.j2`.
    pub fn new(templates_dir: &str) -> Result<Self, RunnerError> {
        let mut env = Environment::new();

        for (name, file) in TEMPLATE_FILES {
            let source = load_template(templates_dir, file)?;
            env.add_template_owned(name, source).map_err(|e| {
                RunnerError::Template(format!("failed to add {name} template: {e}"))
            })?;
        }

        Ok(Self { env })
    }

    /// Render the narrator's persona system prompt.
    pub fn narrator_system(&self, ctx: &serde_json::Value) -> Result<String, RunnerError> {
        self.render("narrator_system", ctx)
    }

    /// Render a party member's persona system prompt.
    pub fn member_system(&self, ctx: &serde_json::Value) -> Result<String, RunnerError> {
        self.render("member_system", ctx)
    }

    /// Render the structured willingness probe for one responder.
    pub fn probe(&self, ctx: &serde_json::Value) -> Result<String, RunnerError> {
        self.render("probe", ctx)
    }

    /// Render the respond cue wrapping the narrator's latest message.
    pub fn respond_cue(&self, ctx: &serde_json::Value) -> Result<String, RunnerError> {
        self.render("respond", ctx)
    }

    /// Render a named template against a JSON context.
    fn render(&self, name: &str, ctx: &serde_json::Value) -> Result<String, RunnerError> {
        self.env
            .get_template(name)
            .map_err(|e| RunnerError::Template(format!("missing {name} template: {e}")))?
            .render(ctx)
            .map_err(|e| RunnerError::Template(format!("{name} render failed: {e}")))
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, RunnerError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| RunnerError::Template(format!("failed to read {path}: {e}")))
}
