//! Interactivity Skills
//!
//! Optional callables exposed to commands, grouped into modules that each
//! sit behind a cargo feature:
//!
//! | Feature | Module | Skills |
//! |---------|--------|--------|
//! | `chat` | [`chat::ChatModule`] | `chat`, `chat4`, `chat5`, `clean_chat`, `chat_key` |
//! | `plot` | [`plot::PlotModule`] | `plot` |
//! | `tables` | [`tables::TablesModule`] | `csv_table`, `excel_table` |
//!
//! A module compiled without its feature still reports its names so calls
//! to them print why they are unavailable.

pub mod config;
pub mod unavailable;

#[cfg(feature = "chat")]
pub mod chat;
#[cfg(feature = "chat")]
pub mod memory;
#[cfg(feature = "plot")]
pub mod plot;
#[cfg(feature = "tables")]
pub mod tables;

use interactivity_core::SkillModule;

pub use config::{ChatConfig, SkillsConfig};
pub use unavailable::UnavailableModule;

pub const CHAT_SKILLS: &[&str] = &["chat", "chat4", "chat5", "clean_chat", "chat_key"];
pub const PLOT_SKILLS: &[&str] = &["plot"];
pub const TABLE_SKILLS: &[&str] = &["csv_table", "excel_table"];

/// Every skill module, in registration order.
pub fn discover_modules(config: &SkillsConfig) -> Vec<Box<dyn SkillModule>> {
    vec![chat_module(config), plot_module(), tables_module()]
}

#[cfg(feature = "chat")]
fn chat_module(config: &SkillsConfig) -> Box<dyn SkillModule> {
    match chat::ChatModule::from_config(&config.chat) {
        Ok(module) => Box::new(module),
        Err(e) => {
            tracing::warn!("Chat skills disabled: {}", e);
            Box::new(UnavailableModule::new("chat", CHAT_SKILLS, e.to_string()))
        }
    }
}

#[cfg(not(feature = "chat"))]
fn chat_module(_config: &SkillsConfig) -> Box<dyn SkillModule> {
    Box::new(UnavailableModule::new(
        "chat",
        CHAT_SKILLS,
        "Error: chat support not built. Rebuild with --features chat",
    ))
}

#[cfg(feature = "plot")]
fn plot_module() -> Box<dyn SkillModule> {
    Box::new(plot::PlotModule)
}

#[cfg(not(feature = "plot"))]
fn plot_module() -> Box<dyn SkillModule> {
    Box::new(UnavailableModule::new(
        "plot",
        PLOT_SKILLS,
        "Error: plotting support not built. Rebuild with --features plot",
    ))
}

#[cfg(feature = "tables")]
fn tables_module() -> Box<dyn SkillModule> {
    Box::new(tables::TablesModule)
}

#[cfg(not(feature = "tables"))]
fn tables_module() -> Box<dyn SkillModule> {
    Box::new(UnavailableModule::new(
        "tables",
        TABLE_SKILLS,
        "Error: table support not built. Rebuild with --features tables",
    ))
}
