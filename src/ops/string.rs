//! String operators.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::value::Value;

fn operand_array(ctx: &EvalCtx, obj: &Value, expr: &Expr, name: &str) -> Result<Vec<Value>> {
    let v = expr::compute(ctx, obj, expr)?;
    match v {
        Value::Array(items) => Ok(items),
        other => Err(Error::InvalidOperand(format!(
            "{name} expects an array of operands, got {}",
            other.type_name()
        ))),
    }
}

/// Coerce a value to the string used in comparisons: nil becomes the empty
/// string, numbers and booleans render naturally.
fn stringify(v: &Value) -> String {
    match v {
        Value::Null | Value::Undefined => String::new(),
        Value::String(s) => s.clone(),
        Value::Integer(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => format!("{other:?}"),
    }
}

/// `$concat` joins its operands; any null or undefined operand makes the
/// whole result null.
pub fn concat(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$concat")?;
    if items.iter().any(Value::is_nil) {
        return Ok(Value::Null);
    }
    let mut out = String::new();
    for item in &items {
        match item {
            Value::String(s) => out.push_str(s),
            other => {
                return Err(Error::InvalidOperand(format!(
                    "$concat expects string operands, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::String(out))
}

/// `$substr` takes `[string, start, count]`. A negative start yields the
/// empty string; a negative count takes the tail from `start`.
pub fn substr(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$substr")?;
    if items.len() != 3 {
        return Err(Error::InvalidOperand(format!(
            "$substr expects 3 operands, found {}",
            items.len()
        )));
    }
    let Value::String(s) = &items[0] else {
        return Ok(Value::String(String::new()));
    };
    let start = items[1].as_i64().ok_or_else(|| {
        Error::InvalidOperand("$substr start must be a number".to_string())
    })?;
    let count = items[2].as_i64().ok_or_else(|| {
        Error::InvalidOperand("$substr count must be a number".to_string())
    })?;
    if start < 0 {
        return Ok(Value::String(String::new()));
    }
    let chars: Vec<char> = s.chars().collect();
    let start = (start as usize).min(chars.len());
    let end = if count < 0 {
        chars.len()
    } else {
        (start + count as usize).min(chars.len())
    };
    Ok(Value::String(chars[start..end].iter().collect()))
}

pub fn to_lower(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let v = expr::compute(ctx, obj, expr)?;
    Ok(Value::String(stringify(&v).to_lowercase()))
}

pub fn to_upper(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let v = expr::compute(ctx, obj, expr)?;
    Ok(Value::String(stringify(&v).to_uppercase()))
}

/// `$strcasecmp` compares two strings case-insensitively, returning -1, 0,
/// or 1.
pub fn strcasecmp(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$strcasecmp")?;
    if items.len() != 2 {
        return Err(Error::InvalidOperand(format!(
            "$strcasecmp expects 2 operands, found {}",
            items.len()
        )));
    }
    let a = stringify(&items[0]).to_uppercase();
    let b = stringify(&items[1]).to_uppercase();
    Ok(Value::Integer(match a.cmp(&b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

/// `$split` divides a string on a delimiter. A nil input splits to null.
pub fn split(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$split")?;
    if items.len() != 2 {
        return Err(Error::InvalidOperand(format!(
            "$split expects 2 operands, found {}",
            items.len()
        )));
    }
    if items[0].is_nil() {
        return Ok(Value::Null);
    }
    let (Value::String(s), Value::String(delim)) = (&items[0], &items[1]) else {
        return Err(Error::InvalidOperand(
            "$split expects string operands".to_string(),
        ));
    };
    Ok(Value::Array(
        s.split(delim.as_str())
            .map(|part| Value::String(part.to_string()))
            .collect(),
    ))
}

/// `$indexOfBytes` finds the first byte offset of a substring, searching
/// within optional `[start, end]` byte bounds. Returns -1 when not found or
/// when `start > end`, and null when the subject is nil.
pub fn index_of_bytes(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$indexOfBytes")?;
    if !(2..=4).contains(&items.len()) {
        return Err(Error::InvalidOperand(format!(
            "$indexOfBytes expects 2 to 4 operands, found {}",
            items.len()
        )));
    }
    if items[0].is_nil() {
        return Ok(Value::Null);
    }
    let Value::String(s) = &items[0] else {
        return Err(Error::InvalidOperand(format!(
            "$indexOfBytes expects a string subject, got {}",
            items[0].type_name()
        )));
    };
    let Value::String(search) = &items[1] else {
        return Err(Error::InvalidOperand(
            "$indexOfBytes expects a string to search for".to_string(),
        ));
    };
    let bound = |v: Option<&Value>, name: &str, default: usize| -> Result<usize> {
        match v {
            None => Ok(default),
            Some(v) => {
                let n = v.as_i64().ok_or_else(|| {
                    Error::InvalidOperand(format!("$indexOfBytes {name} must be a number"))
                })?;
                if n < 0 {
                    return Err(Error::InvalidOperand(format!(
                        "$indexOfBytes {name} must not be negative"
                    )));
                }
                Ok(n as usize)
            }
        }
    };
    let bytes = s.as_bytes();
    let start = bound(items.get(2), "start", 0)?;
    let end = bound(items.get(3), "end", bytes.len())?.min(bytes.len());
    if start > end {
        return Ok(Value::Integer(-1));
    }
    let needle = search.as_bytes();
    if needle.is_empty() {
        return Ok(Value::Integer(start.min(bytes.len()) as i64));
    }
    let window = &bytes[start.min(bytes.len())..end];
    let found = window
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| (i + start) as i64)
        .unwrap_or(-1);
    Ok(Value::Integer(found))
}
