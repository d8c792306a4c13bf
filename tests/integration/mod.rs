//! Integration Tests Module
//!
//! End-to-end tests driving a `Session` the way the host does: raw input
//! lines in, framed output lines out.

// Line protocol: envelopes, plain commands, framing and loop errors
mod protocol_test;

// Skill registration, collisions and skills called from commands
mod skills_test;

use interactivity_core::{Output, SharedBuffer, SkillModule};
use interactivity_runner::engine::build_registry;
use interactivity_runner::{Engine, Session};

/// A session writing into an in-memory buffer.
pub fn session_with(modules: &[Box<dyn SkillModule>]) -> (Session, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let engine = Engine::new(build_registry(modules));
    (Session::new(engine, Output::new(buffer.clone())), buffer)
}

/// Feed `input` through a fresh session without skills and return the output lines.
pub async fn run_input(input: &str) -> Vec<String> {
    let (mut session, buffer) = session_with(&[]);
    session.run(input.as_bytes()).await;
    buffer.lines()
}
