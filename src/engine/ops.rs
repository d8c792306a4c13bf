//! Operators, subscripts and membership on runtime values.

use super::ast::{BinaryOp, CompareOp, UnaryOp};
use super::error::{EvalError, EvalResult};
use super::value::{
    check_sequence_len, compare_values, sequence_too_large, values_equal, values_identical, Value,
};

fn unsupported(op: BinaryOp, a: &Value, b: &Value) -> EvalError {
    EvalError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

pub fn unary(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOp::Neg => match operand {
            Value::Float(f) => Ok(Value::Float(-f)),
            v => match v.as_int() {
                Some(i) => i.checked_neg().map(Value::Int).ok_or_else(EvalError::overflow),
                None => Err(EvalError::type_error(format!(
                    "bad operand type for unary -: '{}'",
                    v.type_name()
                ))),
            },
        },
        UnaryOp::Pos => match operand {
            Value::Float(f) => Ok(Value::Float(*f)),
            v => match v.as_int() {
                Some(i) => Ok(Value::Int(i)),
                None => Err(EvalError::type_error(format!(
                    "bad operand type for unary +: '{}'",
                    v.type_name()
                ))),
            },
        },
    }
}

pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> EvalResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return int_binary(op, x, y);
    }
    if a.is_number() && b.is_number() {
        let (x, y) = match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(unsupported(op, a, b)),
        };
        return float_binary(op, x, y);
    }

    match (op, a, b) {
        (BinaryOp::Add, Value::Str(x), Value::Str(y)) => {
            check_sequence_len(x.len().saturating_add(y.len()))?;
            Ok(Value::str(format!("{}{}", x, y)))
        }
        (BinaryOp::Add, Value::Str(_), other) => Err(EvalError::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (BinaryOp::Add, Value::List(x), Value::List(y)) => {
            check_sequence_len(x.borrow().len().saturating_add(y.borrow().len()))?;
            let mut items = x.borrow().clone();
            items.extend(y.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOp::Add, Value::List(_), other) => Err(EvalError::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (BinaryOp::Mul, Value::Str(s), n) | (BinaryOp::Mul, n, Value::Str(s))
            if n.as_int().is_some() =>
        {
            let count = repeat_count(n, s.len())?;
            Ok(Value::str(s.repeat(count)))
        }
        (BinaryOp::Mul, Value::List(items), n) | (BinaryOp::Mul, n, Value::List(items))
            if n.as_int().is_some() =>
        {
            let items = items.borrow();
            let count = repeat_count(n, items.len())?;
            let mut repeated = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                repeated.extend(items.iter().cloned());
            }
            Ok(Value::list(repeated))
        }
        _ => Err(unsupported(op, a, b)),
    }
}

fn repeat_count(n: &Value, unit_len: usize) -> EvalResult<usize> {
    let count = usize::try_from(n.as_int().unwrap_or(0).max(0)).map_err(|_| sequence_too_large())?;
    let total = unit_len.checked_mul(count).ok_or_else(sequence_too_large)?;
    check_sequence_len(total)?;
    Ok(count)
}

fn int_binary(op: BinaryOp, x: i64, y: i64) -> EvalResult<Value> {
    let int = |r: Option<i64>| r.map(Value::Int).ok_or_else(EvalError::overflow);
    match op {
        BinaryOp::Add => int(x.checked_add(y)),
        BinaryOp::Sub => int(x.checked_sub(y)),
        BinaryOp::Mul => int(x.checked_mul(y)),
        BinaryOp::Div => {
            if y == 0 {
                return Err(EvalError::zero_division("division by zero"));
            }
            Ok(Value::Float(x as f64 / y as f64))
        }
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(EvalError::zero_division("integer division or modulo by zero"));
            }
            let q = x.checked_div(y).ok_or_else(EvalError::overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(EvalError::zero_division("integer division or modulo by zero"));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            if r != 0 && ((r < 0) != (y < 0)) {
                Ok(Value::Int(r + y))
            } else {
                Ok(Value::Int(r))
            }
        }
        BinaryOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(EvalError::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }
            match (x, u32::try_from(y)) {
                (0 | 1, _) => Ok(Value::Int(if y == 0 { 1 } else { x })),
                (-1, _) => Ok(Value::Int(if y % 2 == 0 { 1 } else { -1 })),
                (_, Ok(exp)) => int(x.checked_pow(exp)),
                (_, Err(_)) => Err(EvalError::overflow()),
            }
        }
    }
}

fn float_binary(op: BinaryOp, x: f64, y: f64) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => Ok(Value::Float(x + y)),
        BinaryOp::Sub => Ok(Value::Float(x - y)),
        BinaryOp::Mul => Ok(Value::Float(x * y)),
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(EvalError::zero_division("float division by zero"));
            }
            Ok(Value::Float(x / y))
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(EvalError::zero_division("float floor division by zero"));
            }
            Ok(Value::Float((x / y).floor()))
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(EvalError::zero_division("float modulo"));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                Ok(Value::Float(r + y))
            } else {
                Ok(Value::Float(r))
            }
        }
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(EvalError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(EvalError::value(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            Ok(Value::Float(x.powf(y)))
        }
    }
}

pub fn compare(op: CompareOp, a: &Value, b: &Value) -> EvalResult<bool> {
    use std::cmp::Ordering::*;

    let ordered = |accept: &dyn Fn(std::cmp::Ordering) -> bool| match compare_values(a, b) {
        Some(ordering) => Ok(accept(ordering)),
        None if a.as_float().map(f64::is_nan).unwrap_or(false)
            || b.as_float().map(f64::is_nan).unwrap_or(false) =>
        {
            Ok(false)
        }
        None => Err(EvalError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))),
    };

    match op {
        CompareOp::Eq => Ok(values_equal(a, b)),
        CompareOp::NotEq => Ok(!values_equal(a, b)),
        CompareOp::Lt => ordered(&|o| o == Less),
        CompareOp::LtE => ordered(&|o| o != Greater),
        CompareOp::Gt => ordered(&|o| o == Greater),
        CompareOp::GtE => ordered(&|o| o != Less),
        CompareOp::In => contains(b, a),
        CompareOp::NotIn => contains(b, a).map(|found| !found),
        CompareOp::Is => Ok(values_identical(a, b)),
        CompareOp::IsNot => Ok(!values_identical(a, b)),
    }
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(EvalError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|v| values_equal(v, item))),
        Value::Dict(entries) => Ok(match item {
            Value::Str(key) => entries.borrow().iter().any(|(k, _)| k == key),
            _ => false,
        }),
        Value::Range { start, stop, step } => Ok(match item.as_int() {
            Some(i) => {
                let in_bounds = if *step > 0 {
                    *start <= i && i < *stop
                } else {
                    *stop < i && i <= *start
                };
                in_bounds && (i as i128 - *start as i128) % *step as i128 == 0
            }
            None => false,
        }),
        other => Err(EvalError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Resolve a possibly negative index against `len`.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        Some(resolved as usize)
    } else {
        None
    }
}

fn int_index(kind: &str, index: &Value) -> EvalResult<i64> {
    index.as_int().ok_or_else(|| {
        EvalError::type_error(format!(
            "{} indices must be integers or slices, not {}",
            kind,
            index.type_name()
        ))
    })
}

fn key_error(key: &Value) -> EvalError {
    EvalError::Key(key.repr())
}

/// `target[index]`
pub fn get_item(target: &Value, index: &Value) -> EvalResult<Value> {
    match target {
        Value::List(items) => {
            let items = items.borrow();
            let i = int_index("list", index)?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| EvalError::index("list index out of range"))
        }
        Value::Str(s) => {
            let i = int_index("string", index)?;
            let count = s.chars().count();
            normalize_index(i, count)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::str(c.to_string()))
                .ok_or_else(|| EvalError::index("string index out of range"))
        }
        Value::Dict(entries) => match index {
            Value::Str(key) => entries
                .borrow()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| key_error(index)),
            other => Err(key_error(other)),
        },
        Value::Range { start, step, .. } => {
            let i = int_index("range", index)?;
            normalize_index(i, target.len()?)
                .map(|i| Value::Int(range_element(*start, *step, i)))
                .ok_or_else(|| EvalError::index("range object index out of range"))
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `target[index] = value`
pub fn set_item(target: &Value, index: &Value, value: Value) -> EvalResult<()> {
    match target {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = int_index("list", index)?;
            let i = normalize_index(i, items.len())
                .ok_or_else(|| EvalError::index("list assignment index out of range"))?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(entries) => {
            let key = dict_key(index)?;
            let mut entries = entries.borrow_mut();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
            Ok(())
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `del target[index]`
pub fn del_item(target: &Value, index: &Value) -> EvalResult<()> {
    match target {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = int_index("list", index)?;
            let i = normalize_index(i, items.len())
                .ok_or_else(|| EvalError::index("list assignment index out of range"))?;
            items.remove(i);
            Ok(())
        }
        Value::Dict(entries) => {
            let mut entries = entries.borrow_mut();
            let position = match index {
                Value::Str(key) => entries.iter().position(|(k, _)| k == key),
                _ => None,
            };
            match position {
                Some(position) => {
                    entries.remove(position);
                    Ok(())
                }
                None => Err(key_error(index)),
            }
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

/// Dict keys are strings only.
pub fn dict_key(key: &Value) -> EvalResult<String> {
    match key {
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::type_error(format!(
            "dict keys must be str, not {}",
            other.type_name()
        ))),
    }
}

fn slice_bound(bound: Option<&Value>, len: usize, default: usize) -> EvalResult<usize> {
    match bound {
        None | Some(Value::None) => Ok(default),
        Some(value) => {
            let i = value.as_int().ok_or_else(|| {
                EvalError::type_error(
                    "slice indices must be integers or None or have an __index__ method",
                )
            })?;
            let len = len as i64;
            let resolved = if i < 0 { i + len } else { i };
            Ok(resolved.clamp(0, len) as usize)
        }
    }
}

/// The `offset`-th element of a range. Offsets one past the end can leave
/// `i64`; they saturate, which still bounds the same elements.
fn range_element(start: i64, step: i64, offset: usize) -> i64 {
    let exact = start as i128 + offset as i128 * step as i128;
    exact.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// `target[start:stop]`
pub fn slice(target: &Value, start: Option<&Value>, stop: Option<&Value>) -> EvalResult<Value> {
    let len = match target {
        Value::Str(_) | Value::List(_) | Value::Range { .. } => target.len()?,
        other => {
            return Err(EvalError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            )))
        }
    };
    let from = slice_bound(start, len, 0)?;
    let to = slice_bound(stop, len, len)?.max(from);

    match target {
        Value::Str(s) => Ok(Value::str(
            s.chars().skip(from).take(to - from).collect::<String>(),
        )),
        Value::List(items) => Ok(Value::list(items.borrow()[from..to].to_vec())),
        Value::Range { start, step, .. } => Ok(Value::Range {
            start: range_element(*start, *step, from),
            stop: range_element(*start, *step, to),
            step: *step,
        }),
        _ => Ok(Value::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    #[test]
    fn test_floor_division_and_modulo_follow_divisor_sign() {
        assert!(values_equal(&binary(BinaryOp::FloorDiv, &int(-7), &int(2)).unwrap(), &int(-4)));
        assert!(values_equal(&binary(BinaryOp::Mod, &int(-7), &int(2)).unwrap(), &int(1)));
        assert!(values_equal(&binary(BinaryOp::Mod, &int(7), &int(-2)).unwrap(), &int(-1)));
        assert!(values_equal(
            &binary(BinaryOp::Mod, &Value::Float(-7.5), &int(2)).unwrap(),
            &Value::Float(0.5)
        ));
    }

    #[test]
    fn test_true_division_yields_float() {
        let result = binary(BinaryOp::Div, &int(7), &int(2)).unwrap();
        assert!(matches!(result, Value::Float(f) if f == 3.5));
        let result = binary(BinaryOp::Div, &int(4), &int(2)).unwrap();
        assert_eq!(result.to_str(), "2.0");
    }

    #[test]
    fn test_zero_division_messages() {
        let err = binary(BinaryOp::Div, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
        let err = binary(BinaryOp::FloorDiv, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.to_string(), "integer division or modulo by zero");
        let err = binary(BinaryOp::Div, &Value::Float(1.0), &int(0)).unwrap_err();
        assert_eq!(err.to_string(), "float division by zero");
    }

    #[test]
    fn test_unsupported_operands() {
        let err = binary(BinaryOp::Add, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(err.to_string(), "unsupported operand type(s) for +: 'int' and 'str'");
        let err = binary(BinaryOp::Add, &Value::str("a"), &int(1)).unwrap_err();
        assert_eq!(err.to_string(), "can only concatenate str (not \"int\") to str");
    }

    #[test]
    fn test_sequence_concat_and_repeat() {
        assert_eq!(
            binary(BinaryOp::Mul, &Value::str("ab"), &int(3)).unwrap().to_str(),
            "ababab"
        );
        let list = Value::list(vec![int(1)]);
        assert_eq!(binary(BinaryOp::Mul, &int(2), &list).unwrap().to_str(), "[1, 1]");
        assert_eq!(binary(BinaryOp::Add, &list, &list).unwrap().to_str(), "[1, 1]");
        assert_eq!(binary(BinaryOp::Mul, &Value::str("x"), &int(-1)).unwrap().to_str(), "");
    }

    #[test]
    fn test_oversized_sequences_are_rejected() {
        let list = Value::list(vec![int(0)]);
        let err = binary(BinaryOp::Mul, &list, &int(1 << 28)).unwrap_err();
        assert!(matches!(err, EvalError::Overflow(_)));
        assert!(binary(BinaryOp::Mul, &Value::str("ab"), &int(i64::MAX)).is_err());

        let big = binary(BinaryOp::Mul, &Value::str("x"), &int(1 << 21)).unwrap();
        let doubled = binary(BinaryOp::Add, &big, &big).unwrap();
        assert!(binary(BinaryOp::Add, &doubled, &doubled).is_err());
    }

    #[test]
    fn test_full_width_range_indexing() {
        let range = Value::Range {
            start: i64::MIN,
            stop: i64::MAX,
            step: 1,
        };
        assert!(matches!(get_item(&range, &int(0)), Err(EvalError::Overflow(_))));

        let wide = Value::Range {
            start: 0,
            stop: i64::MAX,
            step: 2,
        };
        assert_eq!(get_item(&wide, &int(-1)).unwrap().to_str(), (i64::MAX - 1).to_string());
        let tail = slice(&wide, Some(&int(-2)), None).unwrap();
        assert_eq!(tail.len().unwrap(), 2);
        assert!(contains(&wide, &int(i64::MAX - 1)).unwrap());
    }

    #[test]
    fn test_power() {
        assert_eq!(binary(BinaryOp::Pow, &int(2), &int(10)).unwrap().to_str(), "1024");
        assert_eq!(binary(BinaryOp::Pow, &int(2), &int(-1)).unwrap().to_str(), "0.5");
        assert!(matches!(
            binary(BinaryOp::Pow, &int(10), &int(100)).unwrap_err(),
            EvalError::Overflow(_)
        ));
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = binary(BinaryOp::Add, &int(i64::MAX), &int(1)).unwrap_err();
        assert_eq!(err.to_string(), "integer overflow");
    }

    #[test]
    fn test_comparisons() {
        assert!(compare(CompareOp::Lt, &int(1), &Value::Float(1.5)).unwrap());
        assert!(compare(CompareOp::In, &Value::str("ell"), &Value::str("hello")).unwrap());
        let err = compare(CompareOp::Lt, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'<' not supported between instances of 'int' and 'str'"
        );
        let err = compare(CompareOp::In, &int(1), &int(2)).unwrap_err();
        assert_eq!(err.to_string(), "argument of type 'int' is not iterable");
    }

    #[test]
    fn test_range_membership() {
        let range = Value::Range { start: 0, stop: 10, step: 3 };
        assert!(contains(&range, &int(9)).unwrap());
        assert!(!contains(&range, &int(8)).unwrap());
    }

    #[test]
    fn test_indexing() {
        let list = Value::list(vec![int(1), int(2), int(3)]);
        assert_eq!(get_item(&list, &int(-1)).unwrap().to_str(), "3");
        assert_eq!(
            get_item(&list, &int(3)).unwrap_err().to_string(),
            "list index out of range"
        );
        let dict = Value::dict(vec![("a".to_string(), int(1))]);
        assert_eq!(get_item(&dict, &Value::str("b")).unwrap_err().to_string(), "'b'");
        assert_eq!(get_item(&Value::str("héllo"), &int(1)).unwrap().to_str(), "é");
    }

    #[test]
    fn test_item_assignment() {
        let dict = Value::dict(vec![]);
        set_item(&dict, &Value::str("k"), int(1)).unwrap();
        set_item(&dict, &Value::str("k"), int(2)).unwrap();
        assert_eq!(dict.to_str(), "{'k': 2}");
        let err = set_item(&dict, &int(1), int(1)).unwrap_err();
        assert_eq!(err.to_string(), "dict keys must be str, not int");
        del_item(&dict, &Value::str("k")).unwrap();
        assert_eq!(dict.to_str(), "{}");
    }

    #[test]
    fn test_slices() {
        let s = Value::str("hello");
        assert_eq!(slice(&s, Some(&int(1)), None).unwrap().to_str(), "ello");
        assert_eq!(slice(&s, None, Some(&int(-1))).unwrap().to_str(), "hell");
        assert_eq!(slice(&s, Some(&int(4)), Some(&int(1))).unwrap().to_str(), "");
        let list = Value::list(vec![int(1), int(2), int(3)]);
        assert_eq!(slice(&list, Some(&int(-2)), None).unwrap().to_str(), "[2, 3]");
    }
}
