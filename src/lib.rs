//! Interactivity Runner
//!
//! A persistent stdin/stdout subprocess for a note-taking host. Each input
//! line is either a JSON envelope (`frontmatter`, `context`, `command`) or a
//! plain command; the command runs in a Python-flavoured language against a
//! namespace that persists for the life of the process.
//!
//! - `router` - envelope classification and command normalization
//! - `engine` - lexer, parser and evaluator for commands
//! - `session` - the line loop tying the two together
//! - `utils` - runner-level error types
//!
//! Skills (`chat`, `plot`, `csv_table`, ...) live in `interactivity-skills`
//! and are registered at startup.

pub mod engine;
pub mod router;
pub mod session;
pub mod utils;

use interactivity_skills::SkillsConfig;

pub use engine::Engine;
pub use session::Session;
pub use utils::error::{AppError, AppResult};

/// Build an engine with every skill module the build provides.
pub fn engine_from_config(config: &SkillsConfig) -> Engine {
    let modules = interactivity_skills::discover_modules(config);
    Engine::new(engine::build_registry(&modules))
}
