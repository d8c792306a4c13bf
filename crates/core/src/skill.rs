//! Skill Abstraction and Registry
//!
//! Skills are optional callables that commands reference by bare name
//! (`chat(...)`, `plot(...)`, `csv_table(...)`).
//!
//! - `Skill` - one callable: identity plus async invocation
//! - `SkillModule` - a group of skills sharing one optional dependency
//! - `SkillBinding` - what a registered name resolves to (available or not)
//! - `SkillRegistry` - first-wins name table with ordered iteration
//!
//! A module whose dependency is missing still registers its names, bound to
//! an unavailable reason, so calling them yields one explanatory line
//! instead of a "not defined" error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ContextSnapshot;
use crate::error::{CoreError, CoreResult};
use crate::output::Output;

// ============================================================================
// Arguments
// ============================================================================

/// Positional and keyword arguments of one skill call, as JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillArgs {
    pub positional: Vec<Value>,
    pub keyword: Map<String, Value>,
}

impl SkillArgs {
    pub fn new(positional: Vec<Value>, keyword: Map<String, Value>) -> Self {
        Self { positional, keyword }
    }

    /// Resolve a parameter that may be passed by position or by keyword.
    ///
    /// `None` is treated the same as an omitted argument.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.positional
            .get(index)
            .or_else(|| self.keyword.get(name))
            .filter(|v| !v.is_null())
    }

    /// Optional string parameter. Non-string values are rejected.
    pub fn optional_str(&self, index: usize, name: &str) -> CoreResult<Option<String>> {
        match self.get(index, name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(CoreError::invalid_arguments(format!(
                "argument '{}' must be a string, got {}",
                name,
                json_type_name(other)
            ))),
        }
    }

    /// Optional keyword-only string parameter.
    pub fn keyword_str(&self, name: &str) -> CoreResult<Option<String>> {
        match self.keyword.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(CoreError::invalid_arguments(format!(
                "argument '{}' must be a string, got {}",
                name,
                json_type_name(other)
            ))),
        }
    }

    /// Required string parameter.
    pub fn require_str(&self, index: usize, name: &str, skill: &str) -> CoreResult<String> {
        self.optional_str(index, name)?.ok_or_else(|| {
            CoreError::invalid_arguments(format!(
                "{}() missing required argument: '{}'",
                skill, name
            ))
        })
    }

    /// Boolean parameter with a default.
    pub fn bool_or(&self, index: usize, name: &str, default: bool) -> CoreResult<bool> {
        match self.get(index, name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(CoreError::invalid_arguments(format!(
                "argument '{}' must be a bool, got {}",
                name,
                json_type_name(other)
            ))),
        }
    }

    /// Reject keyword arguments outside `allowed`.
    pub fn only_keywords(&self, skill: &str, allowed: &[&str]) -> CoreResult<()> {
        match self.keyword.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(unexpected) => Err(CoreError::invalid_arguments(format!(
                "{}() got an unexpected keyword argument '{}'",
                skill, unexpected
            ))),
            None => Ok(()),
        }
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// A single skill invocation.
#[derive(Debug, Clone, Default)]
pub struct SkillCall {
    pub args: SkillArgs,
    /// Shared context at the time of the call.
    pub context: ContextSnapshot,
}

impl SkillCall {
    pub fn new(args: SkillArgs, context: ContextSnapshot) -> Self {
        Self { args, context }
    }
}

// ============================================================================
// Trait Definitions
// ============================================================================

/// One named callable.
///
/// Skills return nothing to the command; whatever they want the user to see
/// is written to `out` directly.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Name commands use to call this skill.
    fn name(&self) -> &str;

    async fn invoke(&self, call: SkillCall, out: &mut Output) -> CoreResult<()>;
}

/// A group of skills that share one optional capability.
pub trait SkillModule: Send + Sync {
    /// Module name, used in logs.
    fn name(&self) -> &str;

    /// `Err(reason)` when the module's dependency is missing. `reason` is
    /// shown to the user verbatim when one of its skills is called.
    fn availability(&self) -> Result<(), String>;

    /// Names the module provides, known even when it is unavailable.
    fn skill_names(&self) -> Vec<String>;

    /// Instantiated skills. Only consulted when the module is available.
    fn skills(&self) -> Vec<Arc<dyn Skill>>;
}

// ============================================================================
// SkillRegistry
// ============================================================================

/// What a registered name resolves to.
#[derive(Clone)]
pub enum SkillBinding {
    Available(Arc<dyn Skill>),
    Unavailable { module: String, reason: String },
}

impl SkillBinding {
    pub fn is_available(&self) -> bool {
        matches!(self, SkillBinding::Available(_))
    }
}

impl std::fmt::Debug for SkillBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkillBinding::Available(skill) => write!(f, "Available({})", skill.name()),
            SkillBinding::Unavailable { module, reason } => {
                write!(f, "Unavailable({}: {})", module, reason)
            }
        }
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    /// The name was already taken by a core name or an earlier skill.
    Skipped { reason: String },
}

/// Name table for skills.
///
/// Unlike a plain map, registration never overwrites: the first binding of a
/// name wins and later ones are skipped with a warning.
#[derive(Default)]
pub struct SkillRegistry {
    bindings: HashMap<String, SkillBinding>,
    /// Insertion order for deterministic listing.
    order: Vec<String>,
    /// Core names skills may not shadow.
    reserved: HashSet<String>,
}

impl SkillRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that refuses the given core names.
    pub fn with_reserved_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Bind `name`, keeping any earlier binding.
    pub fn register(&mut self, name: impl Into<String>, binding: SkillBinding) -> RegisterOutcome {
        let name = name.into();
        let reason = if self.reserved.contains(&name) {
            Some(format!("'{}' is a core name", name))
        } else if self.bindings.contains_key(&name) {
            Some(format!("'{}' is already registered", name))
        } else {
            None
        };

        if let Some(reason) = reason {
            tracing::warn!("Skill name conflict, skipping {:?}: {}", binding, reason);
            return RegisterOutcome::Skipped { reason };
        }

        self.order.push(name.clone());
        self.bindings.insert(name, binding);
        RegisterOutcome::Registered
    }

    /// Register an available skill under its own name.
    pub fn register_skill(&mut self, skill: Arc<dyn Skill>) -> RegisterOutcome {
        let name = skill.name().to_string();
        self.register(name, SkillBinding::Available(skill))
    }

    /// Register every name a module provides.
    ///
    /// Availability is decided here, once; it is not re-checked per call.
    pub fn register_module(&mut self, module: &dyn SkillModule) -> Vec<RegisterOutcome> {
        match module.availability() {
            Ok(()) => {
                tracing::debug!("Skill module '{}' available", module.name());
                module
                    .skills()
                    .into_iter()
                    .map(|skill| self.register_skill(skill))
                    .collect()
            }
            Err(reason) => {
                tracing::debug!("Skill module '{}' unavailable: {}", module.name(), reason);
                module
                    .skill_names()
                    .into_iter()
                    .map(|name| {
                        self.register(
                            name,
                            SkillBinding::Unavailable {
                                module: module.name().to_string(),
                                reason: reason.clone(),
                            },
                        )
                    })
                    .collect()
            }
        }
    }

    /// Look up a binding by name.
    pub fn get(&self, name: &str) -> Option<&SkillBinding> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// All registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Registered names whose skill is available.
    pub fn available_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| {
                self.bindings
                    .get(*name)
                    .map(SkillBinding::is_available)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Invoke a skill by name.
    ///
    /// An unavailable skill writes its reason as a single line and succeeds.
    /// Returns `Err(CoreError::NotFound)` if the name is not registered.
    pub async fn invoke(&self, name: &str, call: SkillCall, out: &mut Output) -> CoreResult<()> {
        match self.bindings.get(name) {
            Some(SkillBinding::Available(skill)) => skill.invoke(call, out).await,
            Some(SkillBinding::Unavailable { reason, .. }) => {
                let line = reason.lines().next().unwrap_or_default();
                out.log(line)?;
                Ok(())
            }
            None => Err(CoreError::not_found(format!("Skill not found: {}", name))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SharedBuffer;
    use serde_json::json;

    struct EchoSkill {
        skill_name: String,
    }

    impl EchoSkill {
        fn new(name: &str) -> Self {
            Self {
                skill_name: name.to_string(),
            }
        }
    }

    #[async_trait]
    impl Skill for EchoSkill {
        fn name(&self) -> &str {
            &self.skill_name
        }

        async fn invoke(&self, call: SkillCall, out: &mut Output) -> CoreResult<()> {
            let text = call.args.require_str(0, "text", &self.skill_name)?;
            out.emit(&format!("{}: {}", self.skill_name, text))?;
            Ok(())
        }
    }

    struct MissingDependency;

    impl SkillModule for MissingDependency {
        fn name(&self) -> &str {
            "plots"
        }

        fn availability(&self) -> Result<(), String> {
            Err("Error: plotting support not built".to_string())
        }

        fn skill_names(&self) -> Vec<String> {
            vec!["plot".to_string()]
        }

        fn skills(&self) -> Vec<Arc<dyn Skill>> {
            vec![Arc::new(EchoSkill::new("plot"))]
        }
    }

    struct EchoModule;

    impl SkillModule for EchoModule {
        fn name(&self) -> &str {
            "echo"
        }

        fn availability(&self) -> Result<(), String> {
            Ok(())
        }

        fn skill_names(&self) -> Vec<String> {
            vec!["echo".to_string(), "shout".to_string()]
        }

        fn skills(&self) -> Vec<Arc<dyn Skill>> {
            vec![Arc::new(EchoSkill::new("echo")), Arc::new(EchoSkill::new("shout"))]
        }
    }

    fn call(args: Vec<Value>) -> SkillCall {
        SkillCall::new(SkillArgs::new(args, Map::new()), ContextSnapshot::default())
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = SkillRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = SkillRegistry::new();
        assert_eq!(
            registry.register_skill(Arc::new(EchoSkill::new("echo"))),
            RegisterOutcome::Registered
        );
        let second = registry.register(
            "echo",
            SkillBinding::Unavailable {
                module: "other".to_string(),
                reason: "nope".to_string(),
            },
        );
        assert!(matches!(second, RegisterOutcome::Skipped { .. }));
        assert!(registry.get("echo").unwrap().is_available());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reserved_names_are_refused() {
        let mut registry = SkillRegistry::with_reserved_names(["print", "len"]);
        let outcome = registry.register_skill(Arc::new(EchoSkill::new("print")));
        assert_eq!(
            outcome,
            RegisterOutcome::Skipped {
                reason: "'print' is a core name".to_string()
            }
        );
        assert!(!registry.contains("print"));
    }

    #[test]
    fn test_names_preserve_registration_order() {
        let mut registry = SkillRegistry::new();
        registry.register_module(&EchoModule);
        registry.register_module(&MissingDependency);
        assert_eq!(registry.names(), vec!["echo", "shout", "plot"]);
        assert_eq!(registry.available_names(), vec!["echo", "shout"]);
    }

    #[test]
    fn test_unavailable_module_registers_names() {
        let mut registry = SkillRegistry::new();
        let outcomes = registry.register_module(&MissingDependency);
        assert_eq!(outcomes, vec![RegisterOutcome::Registered]);
        assert!(!registry.get("plot").unwrap().is_available());
    }

    #[test]
    fn test_skill_args_positional_or_keyword() {
        let mut keyword = Map::new();
        keyword.insert("system".to_string(), json!("be brief"));
        let args = SkillArgs::new(vec![json!("hello")], keyword);
        assert_eq!(args.require_str(0, "prompt", "chat").unwrap(), "hello");
        assert_eq!(args.optional_str(1, "system").unwrap().as_deref(), Some("be brief"));
        assert!(args.bool_or(2, "save_context", true).unwrap());
    }

    #[test]
    fn test_skill_args_type_errors() {
        let args = SkillArgs::new(vec![json!(3), json!("yes")], Map::new());
        let err = args.require_str(0, "prompt", "chat").unwrap_err();
        assert_eq!(err.to_string(), "argument 'prompt' must be a string, got int");
        assert!(args.bool_or(1, "flag", false).is_err());
    }

    #[test]
    fn test_unexpected_keyword_argument() {
        let mut keyword = Map::new();
        keyword.insert("color".to_string(), json!("red"));
        let args = SkillArgs::new(vec![], keyword.clone());
        assert!(args.only_keywords("plot", &["x", "y", "color"]).is_ok());

        keyword.insert("title".to_string(), json!("Pace"));
        let err = SkillArgs::new(vec![], keyword)
            .only_keywords("plot", &["x", "y", "color"])
            .unwrap_err();
        assert_eq!(err.to_string(), "plot() got an unexpected keyword argument 'title'");
    }

    #[test]
    fn test_missing_required_argument() {
        let args = SkillArgs::default();
        let err = args.require_str(0, "path", "csv_table").unwrap_err();
        assert_eq!(err.to_string(), "csv_table() missing required argument: 'path'");
    }

    #[tokio::test]
    async fn test_invoke_available_skill() {
        let mut registry = SkillRegistry::new();
        registry.register_module(&EchoModule);
        let buffer = SharedBuffer::new();
        let mut out = Output::new(buffer.clone());

        registry
            .invoke("shout", call(vec![json!("hi")]), &mut out)
            .await
            .unwrap();
        assert_eq!(buffer.lines(), vec!["shout: hi"]);
    }

    #[tokio::test]
    async fn test_invoke_unavailable_skill_writes_one_line() {
        let mut registry = SkillRegistry::new();
        registry.register_module(&MissingDependency);
        let buffer = SharedBuffer::new();
        let mut out = Output::new(buffer.clone());

        registry.invoke("plot", call(vec![]), &mut out).await.unwrap();
        assert_eq!(buffer.lines(), vec!["Error: plotting support not built"]);
    }

    #[tokio::test]
    async fn test_invoke_unknown_skill() {
        let registry = SkillRegistry::new();
        let mut out = Output::new(SharedBuffer::new());
        let err = registry.invoke("nope", call(vec![]), &mut out).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
