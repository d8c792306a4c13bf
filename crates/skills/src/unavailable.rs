//! Placeholder module for skills that cannot run in this build.

use std::sync::Arc;

use interactivity_core::{Skill, SkillModule};

/// Reports a fixed set of names as unavailable for one reason.
#[derive(Debug, Clone)]
pub struct UnavailableModule {
    name: String,
    names: Vec<String>,
    reason: String,
}

impl UnavailableModule {
    pub fn new(name: impl Into<String>, names: &[&str], reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            names: names.iter().map(|s| s.to_string()).collect(),
            reason: reason.into(),
        }
    }
}

impl SkillModule for UnavailableModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn availability(&self) -> Result<(), String> {
        Err(self.reason.clone())
    }

    fn skill_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn skills(&self) -> Vec<Arc<dyn Skill>> {
        Vec::new()
    }
}
