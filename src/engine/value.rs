//! Runtime values of the command language.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use serde_json::{Map, Number, Value as Json};

use super::ast::FunctionDef;
use super::builtins::Builtin;
use super::error::{EvalError, EvalResult};

/// Insertion-ordered string-keyed mapping.
pub type DictEntries = Vec<(String, Value)>;

/// Most items a list, string or materialized range may hold.
pub const MAX_SEQUENCE_LEN: usize = 1 << 22;

/// Containers nested deeper than this print as `...`.
const MAX_REPR_DEPTH: usize = 64;

/// Deepest container nesting handed to a skill.
const MAX_JSON_DEPTH: usize = 128;

/// Reject sequences longer than [`MAX_SEQUENCE_LEN`] before they are built.
pub fn check_sequence_len(len: usize) -> EvalResult<()> {
    if len > MAX_SEQUENCE_LEN {
        return Err(sequence_too_large());
    }
    Ok(())
}

pub fn sequence_too_large() -> EvalError {
    EvalError::Overflow(format!(
        "sequence too large (limit {} items)",
        MAX_SEQUENCE_LEN
    ))
}

/// Storage a [`Shared`] container can hand its values back from.
pub trait Contents {
    fn drain_values(&mut self, out: &mut Vec<Value>);
}

impl Contents for Vec<Value> {
    fn drain_values(&mut self, out: &mut Vec<Value>) {
        out.append(self);
    }
}

impl Contents for DictEntries {
    fn drain_values(&mut self, out: &mut Vec<Value>) {
        out.extend(self.drain(..).map(|(_, value)| value));
    }
}

/// Mutable container storage shared by every alias of a list or dict.
///
/// Dropping the last handle walks nested containers with a work list
/// instead of recursing, so arbitrarily deep nesting is released safely.
#[derive(Debug)]
pub struct Shared<T: Contents>(Rc<RefCell<T>>);

impl<T: Contents> Shared<T> {
    fn new(contents: T) -> Self {
        Shared(Rc::new(RefCell::new(contents)))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    /// Move the contents into `out` when this is the last handle.
    fn release_into(&self, out: &mut Vec<Value>) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        if let Ok(mut contents) = self.0.try_borrow_mut() {
            contents.drain_values(out);
        }
    }
}

impl<T: Contents> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

impl<T: Contents> Deref for Shared<T> {
    type Target = RefCell<T>;

    fn deref(&self) -> &RefCell<T> {
        &self.0
    }
}

impl<T: Contents> Drop for Shared<T> {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.release_into(&mut pending);
        while let Some(value) = pending.pop() {
            match &value {
                Value::List(items) => items.release_into(&mut pending),
                Value::Dict(entries) => entries.release_into(&mut pending),
                _ => {}
            }
        }
    }
}

/// A user-defined function with its defaults evaluated at definition time.
#[derive(Debug)]
pub struct Function {
    pub def: Rc<FunctionDef>,
    /// One entry per parameter; `None` for required parameters.
    pub defaults: Vec<Option<Value>>,
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Shared<Vec<Value>>),
    Dict(Shared<DictEntries>),
    Range { start: i64, stop: i64, step: i64 },
    Function(Rc<Function>),
    Builtin(Builtin),
    Skill(String),
    /// Method looked up on a value, e.g. `xs.append`.
    Method { receiver: Box<Value>, name: String },
    /// Result of `type(x)`.
    Type(&'static str),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Shared::new(items))
    }

    pub fn dict(entries: DictEntries) -> Self {
        Value::Dict(Shared::new(entries))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Range { .. } => "range",
            Value::Function(_) | Value::Skill(_) => "function",
            Value::Builtin(_) | Value::Method { .. } => "builtin_function_or_method",
            Value::Type(_) => "type",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            _ => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Numeric view used by arithmetic; bools count as ints.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            other => other.as_int().map(|i| i as f64),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    /// `str(value)`
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// `repr(value)`
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    /// `open` holds the containers currently being printed; meeting one
    /// again prints `[...]` or `{...}` the way Python does for cycles.
    fn write_repr(&self, out: &mut String, open: &mut Vec<*const ()>) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Str(s) => out.push_str(&quote_str(s)),
            Value::List(items) => {
                if open.contains(&items.addr()) {
                    out.push_str("[...]");
                    return;
                }
                if open.len() >= MAX_REPR_DEPTH {
                    out.push_str("...");
                    return;
                }
                open.push(items.addr());
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, open);
                }
                out.push(']');
                open.pop();
            }
            Value::Dict(entries) => {
                if open.contains(&entries.addr()) {
                    out.push_str("{...}");
                    return;
                }
                if open.len() >= MAX_REPR_DEPTH {
                    out.push_str("...");
                    return;
                }
                open.push(entries.addr());
                out.push('{');
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&quote_str(key));
                    out.push_str(": ");
                    value.write_repr(out, open);
                }
                out.push('}');
                open.pop();
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    out.push_str(&format!("range({}, {})", start, stop));
                } else {
                    out.push_str(&format!("range({}, {}, {})", start, stop, step));
                }
            }
            Value::Function(f) => out.push_str(&format!("<function {}>", f.def.name)),
            Value::Builtin(b) => out.push_str(&format!("<built-in function {}>", b.name())),
            Value::Skill(name) => out.push_str(&format!("<skill {}>", name)),
            Value::Method { receiver, name } => out.push_str(&format!(
                "<built-in method {} of {} object>",
                name,
                receiver.type_name()
            )),
            Value::Type(name) => out.push_str(&format!("<class '{}'>", name)),
        }
    }

    /// Items produced by iterating this value.
    pub fn iter_items(&self) -> EvalResult<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Dict(entries) => Ok(entries
                .borrow()
                .iter()
                .map(|(k, _)| Value::str(k.clone()))
                .collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Range { start, stop, step } => {
                check_sequence_len(self.len()?)?;
                Ok(RangeIter::new(*start, *stop, *step)
                    .map(Value::Int)
                    .collect())
            }
            other => Err(EvalError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// `len(value)`
    pub fn len(&self) -> EvalResult<usize> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::List(items) => Ok(items.borrow().len()),
            Value::Dict(entries) => Ok(entries.borrow().len()),
            Value::Range { start, stop, step } => i64::try_from(range_len(*start, *stop, *step))
                .ok()
                .and_then(|len| usize::try_from(len).ok())
                .ok_or_else(|| {
                    EvalError::Overflow("range is too large to take its length".to_string())
                }),
            other => Err(EvalError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        }
    }

    /// Convert to JSON for skill arguments. Callables become their name.
    ///
    /// Fails on self-containing values and on nesting deeper than a skill
    /// could meaningfully consume.
    pub fn to_json(&self) -> EvalResult<Json> {
        self.to_json_within(&mut Vec::new())
    }

    fn to_json_within(&self, open: &mut Vec<*const ()>) -> EvalResult<Json> {
        let json = match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(items) => {
                enter_container(open, items.addr())?;
                let mut array = Vec::new();
                for item in items.borrow().iter() {
                    array.push(item.to_json_within(open)?);
                }
                open.pop();
                Json::Array(array)
            }
            Value::Dict(entries) => {
                enter_container(open, entries.addr())?;
                let mut map = Map::new();
                for (key, value) in entries.borrow().iter() {
                    map.insert(key.clone(), value.to_json_within(open)?);
                }
                open.pop();
                Json::Object(map)
            }
            Value::Range { start, stop, step } => {
                check_sequence_len(self.len()?)?;
                Json::Array(
                    RangeIter::new(*start, *stop, *step)
                        .map(Json::from)
                        .collect(),
                )
            }
            Value::Function(f) => Json::String(f.def.name.clone()),
            Value::Builtin(b) => Json::String(b.name().to_string()),
            Value::Skill(name) => Json::String(name.clone()),
            Value::Method { name, .. } => Json::String(name.clone()),
            Value::Type(name) => Json::String((*name).to_string()),
        };
        Ok(json)
    }

    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::str(s.clone()),
            Json::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::from_json_map(map),
        }
    }

    pub fn from_json_map(map: &Map<String, Json>) -> Value {
        Value::dict(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
        )
    }
}

fn enter_container(open: &mut Vec<*const ()>, addr: *const ()) -> EvalResult<()> {
    if open.contains(&addr) {
        return Err(EvalError::value("Circular reference detected"));
    }
    if open.len() >= MAX_JSON_DEPTH {
        return Err(EvalError::value(format!(
            "containers nested more than {} levels deep cannot be passed to a skill",
            MAX_JSON_DEPTH
        )));
    }
    open.push(addr);
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

/// `==` semantics: numbers compare across int/float/bool, containers
/// compare element-wise, dicts ignore insertion order.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (x, y) if x.is_number() && y.is_number() => match (x.as_int(), y.as_int()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_float() == y.as_float(),
        },
        (Value::List(x), Value::List(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| values_equal(p, q))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.iter()
                        .find(|(k2, _)| k2 == k)
                        .map(|(_, v2)| values_equal(v, v2))
                        .unwrap_or(false)
                })
        }
        (
            Value::Range { start, stop, step },
            Value::Range {
                start: s2,
                stop: e2,
                step: st2,
            },
        ) => start == s2 && stop == e2 && step == st2,
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::Skill(x), Value::Skill(y)) => x == y,
        (Value::Type(x), Value::Type(y)) => x == y,
        _ => false,
    }
}

/// `is` semantics: identity for containers and functions, equality for
/// immutable scalars of the same type.
pub fn values_identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(x), Value::List(y)) => x.ptr_eq(y),
        (Value::Dict(x), Value::Dict(y)) => x.ptr_eq(y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        _ if a.type_name() == b.type_name() => values_equal(a, b),
        _ => false,
    }
}

/// Ordering for `<`-style comparisons and `sorted`. `None` when the two
/// types are not orderable against each other.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (x, y) if x.is_number() && y.is_number() => match (x.as_int(), y.as_int()) {
            (Some(i), Some(j)) => Some(i.cmp(&j)),
            _ => x.as_float()?.partial_cmp(&y.as_float()?),
        },
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            for (p, q) in x.iter().zip(y.iter()) {
                if !values_equal(p, q) {
                    return compare_values(p, q);
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => None,
    }
}

/// Python-style float formatting: `1.0`, `0.1`, `1e-07`, `1e+20`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let formatted = format!("{:e}", f);
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    let mut s = format!("{}", f);
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

/// Quote a string the way `repr` does: single quotes unless the text
/// contains a single quote and no double quote.
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Exact element count of a range; a full-width `i64` range holds more
/// elements than `i64::MAX`.
pub fn range_len(start: i64, stop: i64, step: i64) -> i128 {
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    if step > 0 && start < stop {
        (stop - start - 1) / step + 1
    } else if step < 0 && start > stop {
        (start - stop - 1) / -step + 1
    } else {
        0
    }
}

/// Lazy iterator over a `range`.
#[derive(Debug, Clone)]
pub struct RangeIter {
    next: i64,
    stop: i64,
    step: i64,
    done: bool,
}

impl RangeIter {
    pub fn new(start: i64, stop: i64, step: i64) -> Self {
        Self {
            next: start,
            stop,
            step,
            done: step == 0,
        }
    }
}

impl Iterator for RangeIter {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.done {
            return None;
        }
        let in_range = if self.step > 0 {
            self.next < self.stop
        } else {
            self.next > self.stop
        };
        if !in_range {
            self.done = true;
            return None;
        }
        let current = self.next;
        match self.next.checked_add(self.step) {
            Some(next) => self.next = next,
            None => self.done = true,
        }
        Some(current)
    }
}
