//! Evaluator
//!
//! Walks the syntax tree against the engine's global namespace. Evaluation
//! is async because skills are; recursion goes through boxed local futures
//! since values hold `Rc` and never leave the runner's thread.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::{Map, Value as Json};

use interactivity_core::{Output, SharedContext, SkillArgs, SkillCall, SkillRegistry};

use super::ast::{BinaryOp, BoolOp, Expr, FStringPart, Stmt, Target};
use super::builtins::{self, Builtin, CallArgs, LoopItems};
use super::error::{EvalError, EvalResult};
use super::ops;
use super::value::{check_sequence_len, Function, Value};

/// Deepest user function call chain allowed.
pub const MAX_CALL_DEPTH: usize = 200;

/// Read-only names backed by the shared context.
pub const CONTEXT_NAMES: &[&str] = &["frontmatter", "context", "note_path"];

pub type Globals = HashMap<String, Value>;

/// How a statement finished.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Locals of one user function call.
#[derive(Default)]
struct Frame {
    locals: HashMap<String, Value>,
    /// Names declared `global` in this call.
    globals: HashSet<String>,
}

pub struct Interpreter<'a> {
    globals: &'a mut Globals,
    registry: &'a SkillRegistry,
    context: &'a SharedContext,
    out: &'a mut Output,
    frames: Vec<Frame>,
}

fn read_only(name: &str) -> EvalError {
    EvalError::type_error(format!(
        "'{}' is read-only; it mirrors the note's shared context",
        name
    ))
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

impl<'a> Interpreter<'a> {
    pub fn new(
        globals: &'a mut Globals,
        registry: &'a SkillRegistry,
        context: &'a SharedContext,
        out: &'a mut Output,
    ) -> Self {
        Self {
            globals,
            registry,
            context,
            out,
            frames: Vec::new(),
        }
    }

    /// Evaluate a single expression.
    pub async fn evaluate(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.eval(expr).await
    }

    /// Execute a program at module level.
    pub async fn run(&mut self, program: &[Stmt]) -> EvalResult<()> {
        self.exec_block(program).await.map(|_| ())
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        if let Some(frame) = self.frames.last() {
            if !frame.globals.contains(name) {
                if let Some(value) = frame.locals.get(name) {
                    return Ok(value.clone());
                }
            }
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        match name {
            "frontmatter" => return Ok(Value::from_json_map(self.context.frontmatter())),
            "context" => return Ok(Value::from_json_map(self.context.context())),
            "note_path" => return Ok(Value::str(self.context.note_path())),
            _ => {}
        }
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(Value::Builtin(builtin));
        }
        if self.registry.contains(name) {
            return Ok(Value::Skill(name.to_string()));
        }
        Err(EvalError::Name(name.to_string()))
    }

    fn store(&mut self, name: &str, value: Value) -> EvalResult<()> {
        if CONTEXT_NAMES.contains(&name) {
            return Err(read_only(name));
        }
        match self.frames.last_mut() {
            Some(frame) if !frame.globals.contains(name) => {
                frame.locals.insert(name.to_string(), value);
            }
            _ => {
                self.globals.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    fn unbind(&mut self, name: &str) -> EvalResult<()> {
        if CONTEXT_NAMES.contains(&name) {
            return Err(read_only(name));
        }
        let removed = match self.frames.last_mut() {
            Some(frame) if !frame.globals.contains(name) => frame.locals.remove(name),
            _ => self.globals.remove(name),
        };
        removed
            .map(|_| ())
            .ok_or_else(|| EvalError::Name(name.to_string()))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    async fn exec_block(&mut self, body: &[Stmt]) -> EvalResult<Flow> {
        for stmt in body {
            match self.exec(stmt).await? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec<'s>(&'s mut self, stmt: &'s Stmt) -> LocalBoxFuture<'s, EvalResult<Flow>> {
        async move {
            match stmt {
                Stmt::Expr(expr) => {
                    self.eval(expr).await?;
                }
                Stmt::Assign { targets, value } => {
                    let value = self.eval(value).await?;
                    for target in targets {
                        self.assign(target, value.clone()).await?;
                    }
                }
                Stmt::AugAssign { target, op, value } => {
                    self.aug_assign(target, *op, value).await?;
                }
                Stmt::If { branches, orelse } => {
                    for (test, body) in branches {
                        if self.eval(test).await?.truthy() {
                            return self.exec_block(body).await;
                        }
                    }
                    return self.exec_block(orelse).await;
                }
                Stmt::While { test, body } => {
                    while self.eval(test).await?.truthy() {
                        match self.exec_block(body).await? {
                            Flow::Break => break,
                            Flow::Return(value) => return Ok(Flow::Return(value)),
                            Flow::Normal | Flow::Continue => {}
                        }
                    }
                }
                Stmt::For { names, iter, body } => {
                    let iterable = self.eval(iter).await?;
                    for item in LoopItems::over(&iterable)? {
                        self.bind_loop_names(names, item)?;
                        match self.exec_block(body).await? {
                            Flow::Break => break,
                            Flow::Return(value) => return Ok(Flow::Return(value)),
                            Flow::Normal | Flow::Continue => {}
                        }
                    }
                }
                Stmt::Break => return Ok(Flow::Break),
                Stmt::Continue => return Ok(Flow::Continue),
                Stmt::Pass => {}
                Stmt::FunctionDef(def) => {
                    let mut defaults = Vec::with_capacity(def.params.len());
                    for param in &def.params {
                        defaults.push(match &param.default {
                            Some(expr) => Some(self.eval(expr).await?),
                            None => None,
                        });
                    }
                    let function = Function {
                        def: Rc::clone(def),
                        defaults,
                    };
                    self.store(&def.name, Value::Function(Rc::new(function)))?;
                }
                Stmt::Return(value) => {
                    let value = match value {
                        Some(expr) => self.eval(expr).await?,
                        None => Value::None,
                    };
                    return Ok(Flow::Return(value));
                }
                Stmt::Raise(expr) => {
                    let value = self.eval(expr).await?;
                    return Err(EvalError::Raised(value.to_str()));
                }
                Stmt::Del(targets) => {
                    for target in targets {
                        match target {
                            Target::Name(name) => self.unbind(name)?,
                            Target::Index { target, index } => {
                                let container = self.eval(target).await?;
                                let index = self.eval(index).await?;
                                ops::del_item(&container, &index)?;
                            }
                        }
                    }
                }
                Stmt::Global(names) => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.globals.extend(names.iter().cloned());
                    }
                }
            }
            Ok(Flow::Normal)
        }
        .boxed_local()
    }

    async fn assign(&mut self, target: &Target, value: Value) -> EvalResult<()> {
        match target {
            Target::Name(name) => self.store(name, value),
            Target::Index { target, index } => {
                let container = self.eval(target).await?;
                let index = self.eval(index).await?;
                ops::set_item(&container, &index, value)
            }
        }
    }

    async fn aug_assign(&mut self, target: &Target, op: BinaryOp, value: &Expr) -> EvalResult<()> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name)?;
                let rhs = self.eval(value).await?;
                let updated = in_place(op, &current, rhs)?;
                self.store(name, updated)
            }
            Target::Index { target, index } => {
                let container = self.eval(target).await?;
                let index = self.eval(index).await?;
                let current = ops::get_item(&container, &index)?;
                let rhs = self.eval(value).await?;
                let updated = in_place(op, &current, rhs)?;
                ops::set_item(&container, &index, updated)
            }
        }
    }

    fn bind_loop_names(&mut self, names: &[String], item: Value) -> EvalResult<()> {
        if let [name] = names {
            return self.store(name, item);
        }
        let parts = match &item {
            Value::List(_) | Value::Str(_) => item.iter_items()?,
            other => {
                return Err(EvalError::type_error(format!(
                    "cannot unpack non-iterable {} object",
                    other.type_name()
                )))
            }
        };
        if parts.len() < names.len() {
            return Err(EvalError::value(format!(
                "not enough values to unpack (expected {}, got {})",
                names.len(),
                parts.len()
            )));
        }
        if parts.len() > names.len() {
            return Err(EvalError::value(format!(
                "too many values to unpack (expected {})",
                names.len()
            )));
        }
        for (name, part) in names.iter().zip(parts) {
            self.store(name, part)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn eval<'s>(&'s mut self, expr: &'s Expr) -> LocalBoxFuture<'s, EvalResult<Value>> {
        async move {
            match expr {
                Expr::None => Ok(Value::None),
                Expr::Bool(b) => Ok(Value::Bool(*b)),
                Expr::Int(i) => Ok(Value::Int(*i)),
                Expr::Float(f) => Ok(Value::Float(*f)),
                Expr::Str(s) => Ok(Value::str(s.clone())),
                Expr::FString(parts) => {
                    let mut text = String::new();
                    for part in parts {
                        match part {
                            FStringPart::Literal(literal) => text.push_str(literal),
                            FStringPart::Field { expr, repr, spec } => {
                                let value = self.eval(expr).await?;
                                let value = if *repr { Value::str(value.repr()) } else { value };
                                match spec {
                                    Some(spec) => {
                                        text.push_str(&builtins::format_spec(&value, spec)?)
                                    }
                                    None => text.push_str(&value.to_str()),
                                }
                            }
                        }
                    }
                    Ok(Value::Str(text))
                }
                Expr::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item).await?);
                    }
                    Ok(Value::list(values))
                }
                Expr::Dict(entries) => {
                    let dict = Value::dict(Vec::with_capacity(entries.len()));
                    for (key, value) in entries {
                        let key = self.eval(key).await?;
                        ops::dict_key(&key)?;
                        let value = self.eval(value).await?;
                        ops::set_item(&dict, &key, value)?;
                    }
                    Ok(dict)
                }
                Expr::Name(name) => self.lookup(name),
                Expr::Attribute { target, name } => {
                    let receiver = self.eval(target).await?;
                    if builtins::has_method(&receiver, name) {
                        Ok(Value::Method {
                            receiver: Box::new(receiver),
                            name: name.clone(),
                        })
                    } else {
                        Err(EvalError::attribute(format!(
                            "'{}' object has no attribute '{}'",
                            receiver.type_name(),
                            name
                        )))
                    }
                }
                Expr::Index { target, index } => {
                    let container = self.eval(target).await?;
                    let index = self.eval(index).await?;
                    ops::get_item(&container, &index)
                }
                Expr::Slice {
                    target,
                    start,
                    stop,
                } => {
                    let container = self.eval(target).await?;
                    let start = match start {
                        Some(expr) => Some(self.eval(expr).await?),
                        None => None,
                    };
                    let stop = match stop {
                        Some(expr) => Some(self.eval(expr).await?),
                        None => None,
                    };
                    ops::slice(&container, start.as_ref(), stop.as_ref())
                }
                Expr::Call { func, args, kwargs } => {
                    let callee = self.eval(func).await?;
                    let mut positional = Vec::with_capacity(args.len());
                    for arg in args {
                        positional.push(self.eval(arg).await?);
                    }
                    let mut keyword = Vec::with_capacity(kwargs.len());
                    for (name, arg) in kwargs {
                        keyword.push((name.clone(), self.eval(arg).await?));
                    }
                    self.call_value(callee, CallArgs::new(positional, keyword))
                        .await
                }
                Expr::Unary { op, operand } => {
                    let operand = self.eval(operand).await?;
                    ops::unary(*op, &operand)
                }
                Expr::Binary { op, left, right } => {
                    let left = self.eval(left).await?;
                    let right = self.eval(right).await?;
                    ops::binary(*op, &left, &right)
                }
                Expr::Compare { left, links } => {
                    let mut current = self.eval(left).await?;
                    for (op, right) in links {
                        let next = self.eval(right).await?;
                        if !ops::compare(*op, &current, &next)? {
                            return Ok(Value::Bool(false));
                        }
                        current = next;
                    }
                    Ok(Value::Bool(true))
                }
                Expr::BoolOp { op, left, right } => {
                    let left = self.eval(left).await?;
                    match (op, left.truthy()) {
                        (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                        _ => self.eval(right).await,
                    }
                }
                Expr::Conditional { test, body, orelse } => {
                    if self.eval(test).await?.truthy() {
                        self.eval(body).await
                    } else {
                        self.eval(orelse).await
                    }
                }
            }
        }
        .boxed_local()
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    async fn call_value(&mut self, callee: Value, args: CallArgs) -> EvalResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args).await,
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            Value::Skill(name) => self.call_skill(&name, args).await,
            Value::Method { receiver, name } => builtins::call_method(&receiver, &name, args),
            other => Err(EvalError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    async fn call_function(&mut self, function: Rc<Function>, args: CallArgs) -> EvalResult<Value> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(EvalError::Recursion);
        }
        let frame = bind_arguments(&function, args)?;
        self.frames.push(frame);
        let flow = self.exec_block(&function.def.body).await;
        self.frames.pop();
        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: CallArgs) -> EvalResult<Value> {
        match builtin {
            Builtin::Print => {
                args.only_keywords("print", &["sep"])?;
                let sep = match args.keyword("sep") {
                    None | Some(Value::None) => " ".to_string(),
                    Some(Value::Str(sep)) => sep.clone(),
                    Some(other) => {
                        return Err(EvalError::type_error(format!(
                            "sep must be None or a string, not {}",
                            other.type_name()
                        )))
                    }
                };
                let text = args
                    .positional
                    .iter()
                    .map(Value::to_str)
                    .collect::<Vec<_>>()
                    .join(&sep);
                self.out.log(&text)?;
                Ok(Value::None)
            }
            Builtin::GetFrontmatter => {
                args.only_keywords("get_frontmatter", &["key", "default"])?;
                args.arity("get_frontmatter", 0, 2)?;
                let key = args.positional.first().or_else(|| args.keyword("key"));
                let key = match key {
                    Some(Value::Str(key)) => key.clone(),
                    Some(other) => {
                        return Err(EvalError::type_error(format!(
                            "get_frontmatter() key must be str, not {}",
                            other.type_name()
                        )))
                    }
                    None => {
                        return Err(EvalError::type_error(
                            "get_frontmatter() missing 1 required positional argument: 'key'",
                        ))
                    }
                };
                let default = args
                    .positional
                    .get(1)
                    .or_else(|| args.keyword("default"))
                    .cloned()
                    .unwrap_or(Value::None);
                Ok(self
                    .context
                    .get_frontmatter(&key)
                    .map(Value::from_json)
                    .unwrap_or(default))
            }
            Builtin::Info => {
                args.only_keywords("info", &[])?;
                args.arity("info", 0, 0)?;
                super::write_info(self.registry, self.out)?;
                Ok(Value::None)
            }
            Builtin::Available => {
                args.only_keywords("available", &[])?;
                args.arity("available", 0, 0)?;
                Ok(Value::list(
                    super::available_objects(self.registry)
                        .into_iter()
                        .map(Value::Str)
                        .collect(),
                ))
            }
            other => builtins::call(other, args),
        }
    }

    async fn call_skill(&mut self, name: &str, args: CallArgs) -> EvalResult<Value> {
        let positional = args
            .positional
            .iter()
            .map(Value::to_json)
            .collect::<EvalResult<Vec<Json>>>()?;
        let mut keyword = Map::new();
        for (key, value) in &args.keyword {
            keyword.insert(key.clone(), value.to_json()?);
        }
        tracing::debug!("Dispatching skill '{}'", name);
        let call = SkillCall::new(SkillArgs::new(positional, keyword), self.context.snapshot());
        self.registry.invoke(name, call, self.out).await?;
        Ok(Value::None)
    }
}

/// `+=` extends lists in place; every other operator rebinds.
fn in_place(op: BinaryOp, current: &Value, rhs: Value) -> EvalResult<Value> {
    if let (BinaryOp::Add, Value::List(items)) = (op, current) {
        let extra = rhs.iter_items()?;
        check_sequence_len(items.borrow().len().saturating_add(extra.len()))?;
        items.borrow_mut().extend(extra);
        return Ok(current.clone());
    }
    ops::binary(op, current, &rhs)
}

fn bind_arguments(function: &Function, args: CallArgs) -> EvalResult<Frame> {
    let def = &function.def;
    let params = &def.params;

    if args.positional.len() > params.len() {
        return Err(EvalError::type_error(format!(
            "{}() takes {} positional argument{} but {} {} given",
            def.name,
            params.len(),
            plural(params.len()),
            args.positional.len(),
            if args.positional.len() == 1 { "was" } else { "were" }
        )));
    }

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(args.positional) {
        *slot = Some(value);
    }
    for (name, value) in args.keyword {
        match params.iter().position(|p| p.name == name) {
            None => {
                return Err(EvalError::type_error(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    def.name, name
                )))
            }
            Some(i) if slots[i].is_some() => {
                return Err(EvalError::type_error(format!(
                    "{}() got multiple values for argument '{}'",
                    def.name, name
                )))
            }
            Some(i) => slots[i] = Some(value),
        }
    }

    let mut frame = Frame::default();
    let mut missing = Vec::new();
    for ((param, slot), default) in params.iter().zip(slots).zip(&function.defaults) {
        match slot.or_else(|| default.clone()) {
            Some(value) => {
                frame.locals.insert(param.name.clone(), value);
            }
            None => missing.push(format!("'{}'", param.name)),
        }
    }
    if !missing.is_empty() {
        return Err(EvalError::type_error(format!(
            "{}() missing {} required positional argument{}: {}",
            def.name,
            missing.len(),
            plural(missing.len()),
            join_names(&missing)
        )));
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::{parse_expression, parse_program};
    use interactivity_core::SharedBuffer;

    struct Harness {
        globals: Globals,
        registry: SkillRegistry,
        context: SharedContext,
        buffer: SharedBuffer,
        out: Output,
    }

    impl Harness {
        fn new() -> Self {
            let buffer = SharedBuffer::new();
            Self {
                globals: Globals::new(),
                registry: SkillRegistry::new(),
                context: SharedContext::new(),
                out: Output::new(buffer.clone()),
                buffer,
            }
        }

        async fn run(&mut self, src: &str) -> EvalResult<()> {
            let program = parse_program(src)?;
            let mut interpreter =
                Interpreter::new(&mut self.globals, &self.registry, &self.context, &mut self.out);
            interpreter.run(&program).await
        }

        async fn eval(&mut self, src: &str) -> EvalResult<String> {
            let expr = parse_expression(src)?;
            let mut interpreter =
                Interpreter::new(&mut self.globals, &self.registry, &self.context, &mut self.out);
            interpreter.evaluate(&expr).await.map(|v| v.to_str())
        }
    }

    #[tokio::test]
    async fn test_arithmetic_and_names() {
        let mut h = Harness::new();
        h.run("x = 7\ny = x // 2").await.unwrap();
        assert_eq!(h.eval("x / 2").await.unwrap(), "3.5");
        assert_eq!(h.eval("y").await.unwrap(), "3");
        assert_eq!(h.eval("z").await.unwrap_err().to_string(), "name 'z' is not defined");
    }

    #[tokio::test]
    async fn test_print_uses_log_framing() {
        let mut h = Harness::new();
        h.run("print('a', 1, sep='-')\nprint('x\\ny')").await.unwrap();
        assert_eq!(h.buffer.lines(), vec!["a-1", "x", " >> y"]);
    }

    #[tokio::test]
    async fn test_functions_defaults_and_recursion() {
        let mut h = Harness::new();
        h.run("def fact(n, acc=1):\n    if n <= 1:\n        return acc\n    return fact(n - 1, acc * n)")
            .await
            .unwrap();
        assert_eq!(h.eval("fact(5)").await.unwrap(), "120");
        assert_eq!(h.eval("fact(n=3)").await.unwrap(), "6");
        assert_eq!(
            h.eval("fact()").await.unwrap_err().to_string(),
            "fact() missing 1 required positional argument: 'n'"
        );
        assert_eq!(
            h.eval("fact(1, 2, 3)").await.unwrap_err().to_string(),
            "fact() takes 2 positional arguments but 3 were given"
        );
    }

    #[test]
    fn test_recursion_limit() {
        // Deep recursion needs more stack than the default test thread has.
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                runtime.block_on(async {
                    let mut h = Harness::new();
                    h.run("def f(n):\n    return f(n + 1)").await.unwrap();
                    h.eval("f(0)").await.unwrap_err().to_string()
                })
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), "maximum recursion depth exceeded");
    }

    #[tokio::test]
    async fn test_loops_break_continue() {
        let mut h = Harness::new();
        h.run(
            "total = 0\nfor i in range(10):\n    if i % 2:\n        continue\n    if i > 6:\n        break\n    total += i\n",
        )
        .await
        .unwrap();
        assert_eq!(h.eval("total").await.unwrap(), "12");

        h.run("n = 0\nwhile True:\n    n += 1\n    if n == 3: break").await.unwrap();
        assert_eq!(h.eval("n").await.unwrap(), "3");
    }

    #[tokio::test]
    async fn test_for_unpacks_dict_items() {
        let mut h = Harness::new();
        h.run("d = {'a': 1, 'b': 2}\nout = []\nfor k, v in d.items():\n    out.append(k + str(v))")
            .await
            .unwrap();
        assert_eq!(h.eval("out").await.unwrap(), "['a1', 'b2']");
    }

    #[tokio::test]
    async fn test_globals_and_locals() {
        let mut h = Harness::new();
        h.run("count = 0\ndef bump():\n    global count\n    count += 1\ndef local():\n    count = 99\nbump()\nbump()\nlocal()")
            .await
            .unwrap();
        assert_eq!(h.eval("count").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_list_plus_equals_extends_in_place() {
        let mut h = Harness::new();
        h.run("a = [1]\nb = a\na += [2]").await.unwrap();
        assert_eq!(h.eval("b").await.unwrap(), "[1, 2]");
    }

    #[tokio::test]
    async fn test_short_circuit_returns_operand() {
        let mut h = Harness::new();
        assert_eq!(h.eval("0 or 'x'").await.unwrap(), "x");
        assert_eq!(h.eval("'' and undefined_name").await.unwrap(), "");
        assert_eq!(h.eval("1 < 2 < 3").await.unwrap(), "True");
        assert_eq!(h.eval("3 > 2 > 2").await.unwrap(), "False");
    }

    #[tokio::test]
    async fn test_raise_reports_str() {
        let mut h = Harness::new();
        let err = h.run("raise 'boom'").await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_del() {
        let mut h = Harness::new();
        h.run("x = 1\nd = {'k': 1}\ndel x, d['k']").await.unwrap();
        assert_eq!(h.eval("d").await.unwrap(), "{}");
        assert!(h.eval("x").await.is_err());
        assert!(h.run("del x").await.is_err());
    }

    #[tokio::test]
    async fn test_shared_context_names_are_read_only() {
        let mut h = Harness::new();
        h.context.replace(
            serde_json::json!({"title": "Daily"}).as_object().cloned(),
            serde_json::json!({"notePath": "a/b.md"}).as_object().cloned(),
        );
        assert_eq!(h.eval("frontmatter['title']").await.unwrap(), "Daily");
        assert_eq!(h.eval("note_path").await.unwrap(), "a/b.md");
        assert_eq!(h.eval("get_frontmatter('title')").await.unwrap(), "Daily");
        assert_eq!(h.eval("get_frontmatter('missing', 5)").await.unwrap(), "5");
        assert_eq!(h.eval("context['notePath']").await.unwrap(), "a/b.md");
        assert!(h.run("note_path = 'x'").await.is_err());
    }

    #[tokio::test]
    async fn test_fstrings() {
        let mut h = Harness::new();
        h.run("name = 'Ada'\npi = 3.14159").await.unwrap();
        assert_eq!(
            h.eval("f'{name!r} {pi:.2f} {len(name)}'").await.unwrap(),
            "'Ada' 3.14 3"
        );
    }

    #[tokio::test]
    async fn test_unknown_skill_name_and_not_callable() {
        let mut h = Harness::new();
        assert_eq!(
            h.eval("chat('hi')").await.unwrap_err().to_string(),
            "name 'chat' is not defined"
        );
        assert_eq!(
            h.eval("(1)(2)").await.unwrap_err().to_string(),
            "'int' object is not callable"
        );
    }
}
