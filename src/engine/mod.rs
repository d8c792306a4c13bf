//! Execution Engine
//!
//! Runs one command against a persistent namespace:
//!
//! 1. Parse the command as a single expression; print its value unless it is
//!    `None`.
//! 2. If that is a syntax error, parse it as a program of statements and
//!    execute it; only explicit `print` and skill output is shown.
//!
//! Runtime failures are written as `Error: <message>`. Only failures to
//! write to the host escape [`Engine::execute`].
//!
//! ## Module Organization
//!
//! - `lexer` / `parser` / `ast` - source to syntax tree
//! - `value` / `ops` / `builtins` - runtime values and their operations
//! - `eval` - the tree-walking interpreter
//! - `error` - `EvalError`

pub mod ast;
pub mod builtins;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod value;

use std::io;

use interactivity_core::{CoreError, Output, SharedContext, SkillModule, SkillRegistry};

pub use error::{EvalError, EvalResult};
pub use eval::{Globals, Interpreter, CONTEXT_NAMES, MAX_CALL_DEPTH};
pub use value::Value;

use builtins::Builtin;

/// Names provided by the runner itself, listed after the skills.
const INFO_OBJECTS: &[&str] = &[
    "frontmatter",
    "context",
    "note_path",
    "get_frontmatter",
];

/// Every core name skills may not shadow.
pub fn core_names() -> Vec<&'static str> {
    Builtin::ALL
        .iter()
        .map(|b| b.name())
        .chain(CONTEXT_NAMES.iter().copied())
        .collect()
}

/// Build a registry from discovered modules, refusing core names.
pub fn build_registry(modules: &[Box<dyn SkillModule>]) -> SkillRegistry {
    let mut registry = SkillRegistry::with_reserved_names(core_names());
    for module in modules {
        registry.register_module(module.as_ref());
    }
    registry
}

/// Names shown by `info()` and returned by `available()`.
pub fn available_objects(registry: &SkillRegistry) -> Vec<String> {
    let mut objects = vec!["info".to_string(), "available".to_string()];
    objects.extend(registry.names());
    objects.extend(INFO_OBJECTS.iter().map(|s| s.to_string()));
    objects
}

/// Write the version banner and the object listing.
pub fn write_info(registry: &SkillRegistry, out: &mut Output) -> io::Result<()> {
    out.log(&format!(
        "Interactivity runner {} (rustc edition 2021)",
        env!("CARGO_PKG_VERSION")
    ))?;
    let listing: String = available_objects(registry)
        .iter()
        .map(|name| format!("\n{}", name))
        .collect();
    out.log(&format!("Available objects:{}", listing))
}

/// Persistent interpreter state plus the skill table.
pub struct Engine {
    globals: Globals,
    registry: SkillRegistry,
}

impl Engine {
    pub fn new(registry: SkillRegistry) -> Self {
        Self {
            globals: Globals::new(),
            registry,
        }
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Current value of a global, if bound.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn write_info(&self, out: &mut Output) -> io::Result<()> {
        write_info(&self.registry, out)
    }

    /// Execute one command. Errors are reported to `out`; an `Err` means
    /// `out` itself could not be written.
    pub async fn execute(
        &mut self,
        command: &str,
        context: &SharedContext,
        out: &mut Output,
    ) -> io::Result<()> {
        match self.run(command, context, out).await {
            Ok(()) => Ok(()),
            Err(EvalError::Output(err)) | Err(EvalError::Skill(CoreError::Io(err))) => Err(err),
            Err(err) => {
                tracing::debug!("Command failed: {}", err);
                out.log(&format!("Error: {}", err))
            }
        }
    }

    async fn run(&mut self, command: &str, context: &SharedContext, out: &mut Output) -> EvalResult<()> {
        match parser::parse_expression(command) {
            Ok(expr) => {
                let value = {
                    let mut interpreter =
                        Interpreter::new(&mut self.globals, &self.registry, context, out);
                    interpreter.evaluate(&expr).await?
                };
                if !value.is_none() {
                    out.log(&value.to_str())?;
                }
                Ok(())
            }
            Err(err) if err.is_syntax() => {
                let program = parser::parse_program(command)?;
                let mut interpreter =
                    Interpreter::new(&mut self.globals, &self.registry, context, out);
                interpreter.run(&program).await
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interactivity_core::SharedBuffer;

    async fn run_commands(engine: &mut Engine, commands: &[&str]) -> Vec<String> {
        let buffer = SharedBuffer::new();
        let mut out = Output::new(buffer.clone());
        let context = SharedContext::new();
        for command in commands {
            engine.execute(command, &context, &mut out).await.unwrap();
        }
        buffer.lines()
    }

    #[tokio::test]
    async fn test_expression_result_is_printed() {
        let mut engine = Engine::new(SkillRegistry::new());
        assert_eq!(run_commands(&mut engine, &["1+1"]).await, vec!["2"]);
    }

    #[tokio::test]
    async fn test_statement_fallback_keeps_namespace() {
        let mut engine = Engine::new(SkillRegistry::new());
        let lines = run_commands(&mut engine, &["x = 5", "x", "x * 2"]).await;
        assert_eq!(lines, vec!["5", "10"]);
        assert!(matches!(engine.global("x"), Some(Value::Int(5))));
    }

    #[tokio::test]
    async fn test_none_result_prints_nothing() {
        let mut engine = Engine::new(SkillRegistry::new());
        assert_eq!(run_commands(&mut engine, &["None", "print()"]).await, vec![""]);
    }

    #[tokio::test]
    async fn test_runtime_error_in_expression_does_not_fall_back() {
        let mut engine = Engine::new(SkillRegistry::new());
        let lines = run_commands(&mut engine, &["1/0", "undefined"]).await;
        assert_eq!(
            lines,
            vec!["Error: division by zero", "Error: name 'undefined' is not defined"]
        );
    }

    #[tokio::test]
    async fn test_multiline_error_is_framed() {
        let mut engine = Engine::new(SkillRegistry::new());
        let lines = run_commands(&mut engine, &["raise \"line1\\nline2\""]).await;
        assert_eq!(lines, vec!["Error: line1", " >> line2"]);
    }

    #[tokio::test]
    async fn test_syntax_error_is_reported() {
        let mut engine = Engine::new(SkillRegistry::new());
        let lines = run_commands(&mut engine, &["if x"]).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_info_lists_objects() {
        let mut engine = Engine::new(build_registry(&[]));
        let lines = run_commands(&mut engine, &["info()"]).await;
        assert!(lines[0].starts_with("Interactivity runner "));
        assert_eq!(lines[1], "Available objects:");
        assert_eq!(lines[2], " >> info");
        assert!(lines.contains(&" >> get_frontmatter".to_string()));
    }

    #[tokio::test]
    async fn test_self_containing_list_prints_with_ellipsis() {
        let mut engine = Engine::new(SkillRegistry::new());
        let lines = run_commands(&mut engine, &["l = [1]", "l.append(l)", "l", "str(l)"]).await;
        assert_eq!(lines, vec!["[1, [...]]", "[1, [...]]"]);
    }

    #[tokio::test]
    async fn test_oversized_sequences_report_errors() {
        let mut engine = Engine::new(SkillRegistry::new());
        let lines = run_commands(
            &mut engine,
            &[
                "list(range(10**18))",
                "[0] * 2**28",
                "len(range(-9223372036854775807 - 1, 9223372036854775807))",
                "f'{1:99999999999}'",
                "'ok'",
            ],
        )
        .await;
        assert_eq!(
            lines,
            vec![
                "Error: sequence too large (limit 4194304 items)",
                "Error: sequence too large (limit 4194304 items)",
                "Error: range is too large to take its length",
                "Error: format width or precision 99999999999 exceeds the limit of 10000",
                "ok",
            ]
        );
    }

    #[tokio::test]
    async fn test_rebinding_deeply_nested_list() {
        let mut engine = Engine::new(SkillRegistry::new());
        let lines = run_commands(
            &mut engine,
            &["x = []", "for i in range(200000): x = [x]", "x = None", "'done'"],
        )
        .await;
        assert_eq!(lines, vec!["done"]);
    }

    #[test]
    fn test_core_names_cover_builtins_and_context() {
        let names = core_names();
        assert!(names.contains(&"print"));
        assert!(names.contains(&"get_frontmatter"));
        assert!(names.contains(&"note_path"));
    }
}
