//! JavaScript-flavoured operations over JSON values.

use serde_json::Value;
use std::cmp::Ordering;

/// Store a number, keeping whole values as integers so they print without a
/// fraction. Non-finite results become `null`.
pub(crate) fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn to_number(v: &Value) -> f64 {
    match v {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// The text a value prints as; `null` prints as nothing.
pub(crate) fn to_display(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_display).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

pub(crate) fn add(l: &Value, r: &Value) -> Value {
    let textual = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if textual(l) || textual(r) {
        Value::String(to_display(l) + &to_display(r))
    } else {
        number(to_number(l) + to_number(r))
    }
}

pub(crate) fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
            l == r
        }
        _ => to_number(l) == to_number(r),
    }
}

pub(crate) fn strict_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => l == r,
    }
}

/// Strings compare lexically, everything else numerically; `None` when the
/// comparison is undefined (NaN).
pub(crate) fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(l).partial_cmp(&to_number(r)),
    }
}

/// Read `object[key]`. Reading through `null` is a type error, as in JS.
pub(crate) fn index(object: &Value, key: &Value) -> Result<Value, String> {
    match object {
        Value::Null => Err(format!(
            "cannot read property '{}' of null",
            to_display(key)
        )),
        Value::Object(map) => Ok(map.get(&to_display(key)).cloned().unwrap_or(Value::Null)),
        Value::Array(items) => {
            if key.as_str() == Some("length") {
                return Ok(Value::from(items.len()));
            }
            Ok(array_index(key)
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        Value::String(s) => {
            if key.as_str() == Some("length") {
                return Ok(Value::from(s.chars().count()));
            }
            Ok(array_index(key)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null))
        }
        Value::Bool(_) | Value::Number(_) => Ok(Value::Null),
    }
}

pub(crate) fn array_index(key: &Value) -> Option<usize> {
    let n = match key {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    (n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX)).then_some(n as usize)
}
