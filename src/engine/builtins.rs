//! Builtin functions and methods on builtin types.
//!
//! Builtins that need the interpreter's state (`print`, `get_frontmatter`,
//! `info`, `available`) are dispatched by the evaluator; everything here is
//! a pure function of its arguments.

use std::cmp::Ordering;

use super::ast::BinaryOp;
use super::error::{EvalError, EvalResult};
use super::ops::{self, normalize_index};
use super::value::{
    check_sequence_len, compare_values, format_float, values_equal, RangeIter, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Str,
    Repr,
    Int,
    Float,
    Bool,
    List,
    Range,
    Abs,
    Min,
    Max,
    Sum,
    Round,
    Sorted,
    Type,
    Keys,
    Values,
    GetFrontmatter,
    Info,
    Available,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Builtin::Print,
        Builtin::Len,
        Builtin::Str,
        Builtin::Repr,
        Builtin::Int,
        Builtin::Float,
        Builtin::Bool,
        Builtin::List,
        Builtin::Range,
        Builtin::Abs,
        Builtin::Min,
        Builtin::Max,
        Builtin::Sum,
        Builtin::Round,
        Builtin::Sorted,
        Builtin::Type,
        Builtin::Keys,
        Builtin::Values,
        Builtin::GetFrontmatter,
        Builtin::Info,
        Builtin::Available,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Repr => "repr",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Range => "range",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Round => "round",
            Builtin::Sorted => "sorted",
            Builtin::Type => "type",
            Builtin::Keys => "keys",
            Builtin::Values => "values",
            Builtin::GetFrontmatter => "get_frontmatter",
            Builtin::Info => "info",
            Builtin::Available => "available",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Call arguments after evaluation.
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new(positional: Vec<Value>, keyword: Vec<(String, Value)>) -> Self {
        Self { positional, keyword }
    }

    /// Reject keyword arguments outside `allowed`.
    pub fn only_keywords(&self, func: &str, allowed: &[&str]) -> EvalResult<()> {
        match self.keyword.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
            Some((k, _)) => Err(EvalError::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                func, k
            ))),
            None => Ok(()),
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Check the positional count is within `min..=max`.
    pub fn arity(&self, func: &str, min: usize, max: usize) -> EvalResult<()> {
        let n = self.positional.len();
        if (min..=max).contains(&n) {
            return Ok(());
        }
        let message = if min == max && min == 1 {
            format!("{}() takes exactly one argument ({} given)", func, n)
        } else if min == max {
            format!("{}() takes {} positional arguments but {} were given", func, min, n)
        } else if n < min {
            format!("{}() expected at least {} arguments, got {}", func, min, n)
        } else {
            format!("{}() expected at most {} arguments, got {}", func, max, n)
        };
        Err(EvalError::type_error(message))
    }

    fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }
}

fn int_arg(value: &Value) -> EvalResult<i64> {
    value.as_int().ok_or_else(|| {
        EvalError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

fn str_arg<'a>(func: &str, value: &'a Value) -> EvalResult<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::type_error(format!(
            "{}() argument must be str, not {}",
            func,
            other.type_name()
        ))),
    }
}

// ============================================================================
// Pure builtins
// ============================================================================

/// Call a builtin that does not need interpreter state.
pub fn call(builtin: Builtin, args: CallArgs) -> EvalResult<Value> {
    let name = builtin.name();
    match builtin {
        Builtin::Sorted => args.only_keywords(name, &["reverse"])?,
        Builtin::Sum => args.only_keywords(name, &["start"])?,
        Builtin::Round => args.only_keywords(name, &["ndigits"])?,
        _ => args.only_keywords(name, &[])?,
    }

    match builtin {
        Builtin::Len => {
            args.arity(name, 1, 1)?;
            Ok(Value::Int(args.positional[0].len()? as i64))
        }
        Builtin::Str => {
            args.arity(name, 0, 1)?;
            Ok(Value::str(args.arg(0).map(Value::to_str).unwrap_or_default()))
        }
        Builtin::Repr => {
            args.arity(name, 1, 1)?;
            Ok(Value::str(args.positional[0].repr()))
        }
        Builtin::Int => {
            args.arity(name, 0, 2)?;
            match (args.arg(0), args.arg(1)) {
                (None, _) => Ok(Value::Int(0)),
                (Some(value), None) => to_int(value),
                (Some(value), Some(base)) => {
                    let text = str_arg(name, value)?;
                    parse_int(text, int_arg(base)?)
                }
            }
        }
        Builtin::Float => {
            args.arity(name, 0, 1)?;
            match args.arg(0) {
                None => Ok(Value::Float(0.0)),
                Some(value) => to_float(value),
            }
        }
        Builtin::Bool => {
            args.arity(name, 0, 1)?;
            Ok(Value::Bool(args.arg(0).map(Value::truthy).unwrap_or(false)))
        }
        Builtin::List => {
            args.arity(name, 0, 1)?;
            match args.arg(0) {
                None => Ok(Value::list(Vec::new())),
                Some(value) => Ok(Value::list(value.iter_items()?)),
            }
        }
        Builtin::Range => {
            args.arity(name, 1, 3)?;
            let ints = args
                .positional
                .iter()
                .map(int_arg)
                .collect::<EvalResult<Vec<_>>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => (0, 0, 1),
            };
            if step == 0 {
                return Err(EvalError::value("range() arg 3 must not be zero"));
            }
            Ok(Value::Range { start, stop, step })
        }
        Builtin::Abs => {
            args.arity(name, 1, 1)?;
            match &args.positional[0] {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                v => match v.as_int() {
                    Some(i) => i.checked_abs().map(Value::Int).ok_or_else(EvalError::overflow),
                    None => Err(EvalError::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        v.type_name()
                    ))),
                },
            }
        }
        Builtin::Min => extreme(name, &args, Ordering::Less),
        Builtin::Max => extreme(name, &args, Ordering::Greater),
        Builtin::Sum => {
            args.arity(name, 1, 2)?;
            let mut total = args
                .arg(1)
                .or_else(|| args.keyword("start"))
                .cloned()
                .unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(EvalError::type_error(
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            for item in args.positional[0].iter_items()? {
                total = ops::binary(BinaryOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::Round => {
            args.arity(name, 1, 2)?;
            let ndigits = match args.arg(1).or_else(|| args.keyword("ndigits")) {
                None | Some(Value::None) => None,
                Some(v) => Some(int_arg(v)?),
            };
            round(&args.positional[0], ndigits)
        }
        Builtin::Sorted => {
            args.arity(name, 1, 1)?;
            let reverse = args.keyword("reverse").map(Value::truthy).unwrap_or(false);
            let mut items = args.positional[0].iter_items()?;
            sort_values(&mut items, reverse)?;
            Ok(Value::list(items))
        }
        Builtin::Type => {
            args.arity(name, 1, 1)?;
            Ok(Value::Type(args.positional[0].type_name()))
        }
        Builtin::Keys | Builtin::Values => {
            args.arity(name, 1, 1)?;
            match &args.positional[0] {
                Value::Dict(entries) => Ok(Value::list(
                    entries
                        .borrow()
                        .iter()
                        .map(|(k, v)| {
                            if builtin == Builtin::Keys {
                                Value::str(k.clone())
                            } else {
                                v.clone()
                            }
                        })
                        .collect(),
                )),
                other => Err(EvalError::type_error(format!(
                    "{}() argument must be a dict, not '{}'",
                    name,
                    other.type_name()
                ))),
            }
        }
        Builtin::Print | Builtin::GetFrontmatter | Builtin::Info | Builtin::Available => Err(
            EvalError::internal(format!("{}() needs interpreter state", name)),
        ),
    }
}

fn to_int(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Float(f) => {
            if f.is_nan() {
                return Err(EvalError::value("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(EvalError::Overflow(
                    "cannot convert float infinity to integer".to_string(),
                ));
            }
            let truncated = f.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(EvalError::overflow());
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Str(s) => parse_int(s, 10),
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            EvalError::type_error(format!(
                "int() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn parse_int(text: &str, base: i64) -> EvalResult<Value> {
    let invalid = || {
        EvalError::value(format!(
            "invalid literal for int() with base {}: {}",
            base,
            Value::str(text).repr()
        ))
    };
    if !(2..=36).contains(&base) {
        return Err(EvalError::value("int() base must be >= 2 and <= 36, or 0"));
    }
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(cleaned.as_str())),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let magnitude = i128::from_str_radix(digits, base as u32).map_err(|_| invalid())?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed)
        .map(Value::Int)
        .map_err(|_| EvalError::overflow())
}

fn to_float(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Str(s) => {
            let trimmed = s.trim();
            trimmed
                .replace('_', "")
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| {
                    EvalError::value(format!(
                        "could not convert string to float: {}",
                        Value::str(s.clone()).repr()
                    ))
                })
        }
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            EvalError::type_error(format!(
                "float() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn extreme(name: &str, args: &CallArgs, want: Ordering) -> EvalResult<Value> {
    args.arity(name, 1, usize::MAX)?;
    let items = if args.positional.len() == 1 {
        args.positional[0].iter_items()?
    } else {
        args.positional.clone()
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| EvalError::value(format!("{}() arg is an empty sequence", name)))?;
    for item in iter {
        match compare_values(&item, &best) {
            Some(ordering) if ordering == want => best = item,
            Some(_) => {}
            None => {
                return Err(EvalError::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    if want == Ordering::Less { "<" } else { ">" },
                    item.type_name(),
                    best.type_name()
                )))
            }
        }
    }
    Ok(best)
}

/// Stable sort with Python's comparison rules.
pub fn sort_values(items: &mut [Value], reverse: bool) -> EvalResult<()> {
    let mut failure = None;
    items.sort_by(|a, b| {
        let ordering = compare_values(a, b).unwrap_or_else(|| {
            if failure.is_none() {
                failure = Some(EvalError::type_error(format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    a.type_name(),
                    b.type_name()
                )));
            }
            Ordering::Equal
        });
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// `round(x, ndigits)` with ties to even.
fn round(value: &Value, ndigits: Option<i64>) -> EvalResult<Value> {
    match (value, ndigits) {
        (Value::Float(f), None) => to_int(&Value::Float(f.round_ties_even())),
        (Value::Float(f), Some(n)) => {
            let n = n.clamp(-400, 400) as i32;
            if !f.is_finite() {
                return Ok(Value::Float(*f));
            }
            let rounded = if n >= 0 {
                let scale = 10f64.powi(n);
                let scaled = f * scale;
                if scaled.is_infinite() {
                    *f
                } else {
                    scaled.round_ties_even() / scale
                }
            } else {
                let scale = 10f64.powi(-n);
                (f / scale).round_ties_even() * scale
            };
            Ok(Value::Float(rounded))
        }
        (v, digits) => {
            let i = v.as_int().ok_or_else(|| {
                EvalError::type_error(format!(
                    "type {} doesn't define __round__ method",
                    v.type_name()
                ))
            })?;
            match digits {
                Some(n) if n < 0 => Ok(Value::Int(round_int(i, -n))),
                _ => Ok(Value::Int(i)),
            }
        }
    }
}

fn round_int(value: i64, digits: i64) -> i64 {
    let Some(scale) = u32::try_from(digits).ok().and_then(|d| 10i64.checked_pow(d)) else {
        return 0;
    };
    let quotient = value.div_euclid(scale);
    let remainder = value.rem_euclid(scale);
    let rounded = match (remainder * 2).cmp(&scale) {
        Ordering::Greater => quotient + 1,
        Ordering::Equal if quotient % 2 != 0 => quotient + 1,
        _ => quotient,
    };
    rounded.saturating_mul(scale)
}

// ============================================================================
// f-string format specs
// ============================================================================

/// Widest field or longest precision a format spec may request.
const MAX_FORMAT_WIDTH: usize = 10_000;

fn format_number(digits: &[char]) -> EvalResult<usize> {
    let text: String = digits.iter().collect();
    match text.parse::<usize>() {
        Ok(n) if n <= MAX_FORMAT_WIDTH => Ok(n),
        _ => Err(EvalError::value(format!(
            "format width or precision {} exceeds the limit of {}",
            text, MAX_FORMAT_WIDTH
        ))),
    }
}

/// Apply a format spec such as `.2f`, `>8`, `,d` or `.1%`.
pub fn format_spec(value: &Value, spec: &str) -> EvalResult<String> {
    let invalid = || {
        EvalError::value(format!(
            "Invalid format specifier '{}' for object of type '{}'",
            spec,
            value.type_name()
        ))
    };

    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0;
    let mut fill = ' ';
    let mut align = None;
    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
        fill = chars[0];
        align = Some(chars[1]);
        i = 2;
    } else if chars.first().map(|c| matches!(c, '<' | '>' | '^')).unwrap_or(false) {
        align = Some(chars[0]);
        i = 1;
    }
    let plus = chars.get(i) == Some(&'+');
    if plus {
        i += 1;
    }
    if chars.get(i) == Some(&'0') && align.is_none() {
        fill = '0';
        align = Some('=');
        i += 1;
    }
    let width_start = i;
    while chars.get(i).map(char::is_ascii_digit).unwrap_or(false) {
        i += 1;
    }
    let width = if i > width_start {
        format_number(&chars[width_start..i])?
    } else {
        0
    };
    let grouping = chars.get(i) == Some(&',');
    if grouping {
        i += 1;
    }
    let precision = if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).map(char::is_ascii_digit).unwrap_or(false) {
            i += 1;
        }
        if i == start {
            return Err(invalid());
        }
        Some(format_number(&chars[start..i])?)
    } else {
        None
    };
    let kind = chars.get(i).copied();
    if i + kind.map(|_| 1).unwrap_or(0) != chars.len() {
        return Err(invalid());
    }

    let mut body = match (kind, value) {
        (Some('f') | Some('F'), v) if v.is_number() => {
            let f = v.as_float().ok_or_else(invalid)?;
            format!("{:.*}", precision.unwrap_or(6), f)
        }
        (Some('%'), v) if v.is_number() => {
            let f = v.as_float().ok_or_else(invalid)? * 100.0;
            format!("{:.*}%", precision.unwrap_or(6), f)
        }
        (Some('e'), v) if v.is_number() => {
            let f = v.as_float().ok_or_else(invalid)?;
            let formatted = format!("{:.*e}", precision.unwrap_or(6), f);
            match formatted.split_once('e') {
                Some((mantissa, exp)) => {
                    let exp: i32 = exp.parse().unwrap_or(0);
                    format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
                }
                None => formatted,
            }
        }
        (Some('d'), v) if v.as_int().is_some() => v.as_int().unwrap_or(0).to_string(),
        (None, Value::Float(f)) if precision.is_some() => {
            format!("{:.*}", precision.unwrap_or(6), f)
        }
        (None, Value::Float(f)) => format_float(*f),
        (Some('s') | None, Value::Str(s)) => match precision {
            Some(p) => s.chars().take(p).collect(),
            None => s.clone(),
        },
        (None, v) if v.is_number() || matches!(v, Value::None) => v.to_str(),
        (None, v) if width == 0 => v.to_str(),
        _ => return Err(invalid()),
    };

    if grouping {
        body = group_thousands(&body);
    }
    if plus && value.is_number() && !body.starts_with('-') {
        body.insert(0, '+');
    }

    let len = body.chars().count();
    if len >= width {
        return Ok(body);
    }
    let pad = width - len;
    let default_align = if value.is_number() { '>' } else { '<' };
    let padded = match align.unwrap_or(default_align) {
        '<' => format!("{}{}", body, fill.to_string().repeat(pad)),
        '^' => {
            let left = pad / 2;
            format!(
                "{}{}{}",
                fill.to_string().repeat(left),
                body,
                fill.to_string().repeat(pad - left)
            )
        }
        '=' => match body.strip_prefix(['-', '+']) {
            Some(digits) => format!("{}{}{}", &body[..1], fill.to_string().repeat(pad), digits),
            None => format!("{}{}", fill.to_string().repeat(pad), body),
        },
        _ => format!("{}{}", fill.to_string().repeat(pad), body),
    };
    Ok(padded)
}

fn group_thousands(number: &str) -> String {
    let (sign, rest) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let (int_part, tail) = match rest.find(|c: char| !c.is_ascii_digit()) {
        Some(at) => rest.split_at(at),
        None => (rest, ""),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}{}", sign, grouped, tail)
}

// ============================================================================
// Methods
// ============================================================================

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "join", "replace", "startswith",
    "endswith", "find", "count",
];
const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "index", "count", "clear", "reverse", "sort",
    "copy",
];
const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "update", "clear", "copy",
];

/// Whether `receiver.name` resolves to a method.
pub fn has_method(receiver: &Value, name: &str) -> bool {
    let table = match receiver {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        _ => return false,
    };
    table.contains(&name)
}

/// Call `receiver.name(*args)`.
pub fn call_method(receiver: &Value, name: &str, args: CallArgs) -> EvalResult<Value> {
    let qualified = format!("{}.{}", receiver.type_name(), name);
    match receiver {
        Value::Str(s) => str_method(s, name, &qualified, args),
        Value::List(_) => list_method(receiver, name, &qualified, args),
        Value::Dict(_) => dict_method(receiver, name, &qualified, args),
        other => Err(EvalError::attribute(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            name
        ))),
    }
}

fn strip_set(args: &CallArgs) -> EvalResult<Option<Vec<char>>> {
    match args.arg(0) {
        None | Some(Value::None) => Ok(None),
        Some(Value::Str(chars)) => Ok(Some(chars.chars().collect())),
        Some(other) => Err(EvalError::type_error(format!(
            "strip arg must be None or str, not {}",
            other.type_name()
        ))),
    }
}

fn str_method(s: &str, name: &str, qualified: &str, args: CallArgs) -> EvalResult<Value> {
    match name {
        "upper" | "lower" => {
            args.only_keywords(qualified, &[])?;
            args.arity(qualified, 0, 0)?;
            Ok(Value::str(if name == "upper" {
                s.to_uppercase()
            } else {
                s.to_lowercase()
            }))
        }
        "strip" | "lstrip" | "rstrip" => {
            args.only_keywords(qualified, &[])?;
            args.arity(qualified, 0, 1)?;
            let set = strip_set(&args)?;
            let in_set = |c: char| match &set {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Ok(Value::str(match name {
                "strip" => s.trim_matches(in_set),
                "lstrip" => s.trim_start_matches(in_set),
                _ => s.trim_end_matches(in_set),
            }))
        }
        "split" => {
            args.only_keywords(qualified, &["sep", "maxsplit"])?;
            args.arity(qualified, 0, 2)?;
            let sep = args.arg(0).or_else(|| args.keyword("sep"));
            let maxsplit = match args.arg(1).or_else(|| args.keyword("maxsplit")) {
                Some(v) => int_arg(v)?,
                None => -1,
            };
            let limit = if maxsplit < 0 {
                usize::MAX
            } else {
                maxsplit as usize + 1
            };
            let parts: Vec<Value> = match sep {
                None | Some(Value::None) => {
                    let mut parts = Vec::new();
                    let mut rest = s.trim_start();
                    while !rest.is_empty() {
                        if parts.len() + 1 == limit {
                            parts.push(Value::str(rest.trim_end()));
                            break;
                        }
                        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                        parts.push(Value::str(&rest[..end]));
                        rest = rest[end..].trim_start();
                    }
                    parts
                }
                Some(Value::Str(sep)) => {
                    if sep.is_empty() {
                        return Err(EvalError::value("empty separator"));
                    }
                    s.splitn(limit, sep.as_str()).map(Value::str).collect()
                }
                Some(other) => {
                    return Err(EvalError::type_error(format!(
                        "must be str or None, not {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            args.only_keywords(qualified, &[])?;
            args.arity(qualified, 1, 1)?;
            let mut pieces = Vec::new();
            for (i, item) in args.positional[0].iter_items()?.into_iter().enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece),
                    other => {
                        return Err(EvalError::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            i,
                            other.type_name()
                        )))
                    }
                }
            }
            let total = pieces.iter().map(String::len).sum::<usize>()
                + s.len().saturating_mul(pieces.len().saturating_sub(1));
            check_sequence_len(total)?;
            Ok(Value::str(pieces.join(s)))
        }
        "replace" => {
            args.only_keywords(qualified, &[])?;
            args.arity(qualified, 2, 2)?;
            let old = str_arg(qualified, &args.positional[0])?;
            let new = str_arg(qualified, &args.positional[1])?;
            let hits = if old.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(old).count()
            };
            check_sequence_len(s.len().saturating_add(hits.saturating_mul(new.len())))?;
            Ok(Value::str(s.replace(old, new)))
        }
        "startswith" | "endswith" => {
            args.only_keywords(qualified, &[])?;
            args.arity(qualified, 1, 1)?;
            let affix = str_arg(qualified, &args.positional[0])?;
            Ok(Value::Bool(if name == "startswith" {
                s.starts_with(affix)
            } else {
                s.ends_with(affix)
            }))
        }
        "find" => {
            args.only_keywords(qualified, &[])?;
            args.arity(qualified, 1, 1)?;
            let needle = str_arg(qualified, &args.positional[0])?;
            Ok(Value::Int(match s.find(needle) {
                Some(byte) => s[..byte].chars().count() as i64,
                None => -1,
            }))
        }
        "count" => {
            args.only_keywords(qualified, &[])?;
            args.arity(qualified, 1, 1)?;
            let needle = str_arg(qualified, &args.positional[0])?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(count as i64))
        }
        _ => Err(EvalError::attribute(format!(
            "'str' object has no attribute '{}'",
            name
        ))),
    }
}

fn list_method(receiver: &Value, name: &str, qualified: &str, args: CallArgs) -> EvalResult<Value> {
    let Value::List(items) = receiver else {
        return Ok(Value::None);
    };
    if name == "sort" {
        args.only_keywords(qualified, &["reverse"])?;
    } else {
        args.only_keywords(qualified, &[])?;
    }

    match name {
        "append" => {
            args.arity(qualified, 1, 1)?;
            check_sequence_len(items.borrow().len() + 1)?;
            items.borrow_mut().push(args.positional[0].clone());
            Ok(Value::None)
        }
        "extend" => {
            args.arity(qualified, 1, 1)?;
            let extra = args.positional[0].iter_items()?;
            check_sequence_len(items.borrow().len().saturating_add(extra.len()))?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            args.arity(qualified, 2, 2)?;
            let index = int_arg(&args.positional[0])?;
            let mut items = items.borrow_mut();
            check_sequence_len(items.len() + 1)?;
            let len = items.len() as i64;
            let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(at as usize, args.positional[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            args.arity(qualified, 0, 1)?;
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(EvalError::index("pop from empty list"));
            }
            let index = match args.arg(0) {
                Some(v) => int_arg(v)?,
                None => -1,
            };
            let at = normalize_index(index, items.len())
                .ok_or_else(|| EvalError::index("pop index out of range"))?;
            Ok(items.remove(at))
        }
        "remove" => {
            args.arity(qualified, 1, 1)?;
            let mut items = items.borrow_mut();
            match items.iter().position(|v| values_equal(v, &args.positional[0])) {
                Some(at) => {
                    items.remove(at);
                    Ok(Value::None)
                }
                None => Err(EvalError::value("list.remove(x): x not in list")),
            }
        }
        "index" => {
            args.arity(qualified, 1, 1)?;
            items
                .borrow()
                .iter()
                .position(|v| values_equal(v, &args.positional[0]))
                .map(|at| Value::Int(at as i64))
                .ok_or_else(|| {
                    EvalError::value(format!("{} is not in list", args.positional[0].repr()))
                })
        }
        "count" => {
            args.arity(qualified, 1, 1)?;
            let count = items
                .borrow()
                .iter()
                .filter(|v| values_equal(v, &args.positional[0]))
                .count();
            Ok(Value::Int(count as i64))
        }
        "clear" => {
            args.arity(qualified, 0, 0)?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        "reverse" => {
            args.arity(qualified, 0, 0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "sort" => {
            args.arity(qualified, 0, 0)?;
            let reverse = args.keyword("reverse").map(Value::truthy).unwrap_or(false);
            let mut sorted = items.borrow().clone();
            sort_values(&mut sorted, reverse)?;
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "copy" => {
            args.arity(qualified, 0, 0)?;
            Ok(Value::list(items.borrow().clone()))
        }
        _ => Err(EvalError::attribute(format!(
            "'list' object has no attribute '{}'",
            name
        ))),
    }
}

fn dict_method(receiver: &Value, name: &str, qualified: &str, args: CallArgs) -> EvalResult<Value> {
    let Value::Dict(entries) = receiver else {
        return Ok(Value::None);
    };
    args.only_keywords(qualified, &[])?;

    match name {
        "get" => {
            args.arity(qualified, 1, 2)?;
            let found = match &args.positional[0] {
                Value::Str(key) => entries
                    .borrow()
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone()),
                _ => None,
            };
            Ok(found.or_else(|| args.arg(1).cloned()).unwrap_or(Value::None))
        }
        "keys" | "values" | "items" => {
            args.arity(qualified, 0, 0)?;
            let entries = entries.borrow();
            Ok(Value::list(
                entries
                    .iter()
                    .map(|(k, v)| match name {
                        "keys" => Value::str(k.clone()),
                        "values" => v.clone(),
                        _ => Value::list(vec![Value::str(k.clone()), v.clone()]),
                    })
                    .collect(),
            ))
        }
        "pop" => {
            args.arity(qualified, 1, 2)?;
            let position = match &args.positional[0] {
                Value::Str(key) => entries.borrow().iter().position(|(k, _)| k == key),
                _ => None,
            };
            match (position, args.arg(1)) {
                (Some(at), _) => Ok(entries.borrow_mut().remove(at).1),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(EvalError::Key(args.positional[0].repr())),
            }
        }
        "update" => {
            args.arity(qualified, 1, 1)?;
            let Value::Dict(other) = &args.positional[0] else {
                return Err(EvalError::type_error(format!(
                    "'{}' object is not a mapping",
                    args.positional[0].type_name()
                )));
            };
            let additions = other.borrow().clone();
            for (key, value) in additions {
                ops::set_item(receiver, &Value::str(key), value)?;
            }
            Ok(Value::None)
        }
        "clear" => {
            args.arity(qualified, 0, 0)?;
            entries.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            args.arity(qualified, 0, 0)?;
            Ok(Value::dict(entries.borrow().clone()))
        }
        _ => Err(EvalError::attribute(format!(
            "'dict' object has no attribute '{}'",
            name
        ))),
    }
}

/// Items of a `for` loop; ranges stay lazy.
pub enum LoopItems {
    Range(RangeIter),
    Items(std::vec::IntoIter<Value>),
}

impl LoopItems {
    pub fn over(value: &Value) -> EvalResult<Self> {
        match value {
            Value::Range { start, stop, step } => {
                Ok(LoopItems::Range(RangeIter::new(*start, *stop, *step)))
            }
            other => Ok(LoopItems::Items(other.iter_items()?.into_iter())),
        }
    }
}

impl Iterator for LoopItems {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            LoopItems::Range(range) => range.next().map(Value::Int),
            LoopItems::Items(items) => items.next(),
        }
    }
}
