//! Interactivity Core
//!
//! Foundational types shared by the runner binary and the skill crates. This
//! crate has no knowledge of the command language or of any concrete skill.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Shared Context Store (`SharedContext`, `ContextSnapshot`)
//! - `output` - Output stream with log framing (`Output`, `format_log_message`)
//! - `skill` - Skill abstraction and registry (`Skill`, `SkillModule`, `SkillRegistry`)
//!
//! ## Design Principles
//!
//! 1. **Minimal dependencies** - serde, async-trait, thiserror and tracing only
//! 2. **Trait-based skills** - the registry never depends on a concrete skill
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod context;
pub mod error;
pub mod output;
pub mod skill;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Shared Context ─────────────────────────────────────────────────────
pub use context::{ContextSnapshot, SharedContext};

// ── Output ─────────────────────────────────────────────────────────────
pub use output::{format_log_message, Output, SharedBuffer, CONTINUATION_MARKER};

// ── Skills ─────────────────────────────────────────────────────────────
pub use skill::{
    RegisterOutcome, Skill, SkillArgs, SkillBinding, SkillCall, SkillModule, SkillRegistry,
};
