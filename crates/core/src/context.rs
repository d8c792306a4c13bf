//! Shared Context Store
//!
//! Process-wide state carried by JSON envelopes from the host:
//!
//! - `frontmatter` - the note's frontmatter mapping
//! - `context` - arbitrary host context (`notePath` and anything else)
//! - `note_path` - derived from `context.notePath`
//!
//! The store is replaced wholesale by the router on every envelope and is
//! read by the execution engine and, through `ContextSnapshot`, by skills.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key inside `context` that carries the current note path.
pub const NOTE_PATH_KEY: &str = "notePath";

/// Owned copy of the shared context handed to skills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub frontmatter: Map<String, Value>,
    pub context: Map<String, Value>,
    pub note_path: String,
}

/// Mutable shared context.
///
/// Written only through [`SharedContext::replace`]; everything else is a
/// read accessor.
#[derive(Debug, Clone, Default)]
pub struct SharedContext {
    frontmatter: Map<String, Value>,
    context: Map<String, Value>,
    note_path: String,
}

impl SharedContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every field from a freshly received envelope.
    ///
    /// Absent mappings reset to empty, and `note_path` resets to `""` unless
    /// the new context carries a string `notePath`.
    pub fn replace(&mut self, frontmatter: Option<Map<String, Value>>, context: Option<Map<String, Value>>) {
        self.frontmatter = frontmatter.unwrap_or_default();
        self.context = context.unwrap_or_default();
        self.note_path = self
            .context
            .get(NOTE_PATH_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
    }

    pub fn frontmatter(&self) -> &Map<String, Value> {
        &self.frontmatter
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn note_path(&self) -> &str {
        &self.note_path
    }

    /// Look up `key` in the frontmatter.
    pub fn get_frontmatter(&self, key: &str) -> Option<&Value> {
        self.frontmatter.get(key)
    }

    /// Look up `key` in the frontmatter, falling back to `default`.
    pub fn get_frontmatter_or(&self, key: &str, default: Value) -> Value {
        self.frontmatter.get(key).cloned().unwrap_or(default)
    }

    /// Take an owned copy for a skill invocation.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            frontmatter: self.frontmatter.clone(),
            context: self.context.clone(),
            note_path: self.note_path.clone(),
        }
    }
}
