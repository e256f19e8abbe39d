//! Array operators.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::util;
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

/// Pull the named arguments out of a record-form operand, rejecting
/// anything unexpected.
fn record_args<'a>(
    expr: &'a Expr,
    name: &str,
    allowed: &[&str],
) -> Result<HashMap<&'a str, &'a Expr>> {
    let Expr::Record(entries) = expr else {
        return Err(Error::InvalidOperand(format!(
            "{name} expects an object operand"
        )));
    };
    let mut out = HashMap::new();
    for (key, sub) in entries {
        if !allowed.contains(&key.as_str()) {
            return Err(Error::InvalidOperand(format!(
                "{name}: unexpected argument {key}"
            )));
        }
        out.insert(key.as_str(), sub);
    }
    Ok(out)
}

/// `$arrayElemAt` returns the element at an index; negative indices count
/// from the end, out-of-range indices yield `Undefined`.
pub fn array_elem_at(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$arrayElemAt")?;
    if items.len() != 2 {
        return Err(Error::InvalidOperand(format!(
            "$arrayElemAt expects 2 operands, found {}",
            items.len()
        )));
    }
    let Value::Array(arr) = &items[0] else {
        return Err(Error::InvalidOperand(format!(
            "$arrayElemAt expects an array, got {}",
            items[0].type_name()
        )));
    };
    let Some(idx) = items[1].as_i64() else {
        return Err(Error::InvalidOperand(
            "$arrayElemAt index must be a number".to_string(),
        ));
    };
    let idx = if idx < 0 { arr.len() as i64 + idx } else { idx };
    if idx < 0 || idx >= arr.len() as i64 {
        return Ok(Value::Undefined);
    }
    Ok(arr[idx as usize].clone())
}

/// `$concatArrays` joins arrays; any nil operand makes the result null.
pub fn concat_arrays(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$concatArrays")?;
    if items.iter().any(Value::is_nil) {
        return Ok(Value::Null);
    }
    let mut out = Vec::new();
    for item in &items {
        match item {
            Value::Array(inner) => out.extend(inner.iter().cloned()),
            other => {
                return Err(Error::InvalidOperand(format!(
                    "$concatArrays expects array operands, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::Array(out))
}

/// `$filter` keeps the elements of `input` for which `cond` is truthy,
/// binding each element to `$$<as>` (default `$$this`).
pub fn filter(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let args = record_args(expr, "$filter", &["input", "as", "cond"])?;
    let (Some(input), Some(cond)) = (args.get("input"), args.get("cond")) else {
        return Err(Error::InvalidOperand(
            "$filter requires input and cond".to_string(),
        ));
    };
    let as_name = binding_name(ctx, obj, args.get("as").copied(), "$filter")?;
    let input = expr::compute(ctx, obj, input)?;
    if input.is_nil() {
        return Ok(Value::Null);
    }
    let items = match input {
        Value::Array(items) => items,
        other => {
            return Err(Error::InvalidOperand(format!(
                "$filter input must be an array, got {}",
                other.type_name()
            )));
        }
    };
    let mut out = Vec::new();
    for item in items {
        let scoped = ctx.with_var(&as_name, item.clone());
        if expr::compute(&scoped, obj, cond)?.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::Array(out))
}

/// Resolve the `as` argument of `$filter`/`$map` to a binding name,
/// defaulting to `this`.
fn binding_name(
    ctx: &EvalCtx,
    obj: &Value,
    expr: Option<&Expr>,
    name: &str,
) -> Result<String> {
    match expr {
        None => Ok("this".to_string()),
        Some(e) => match expr::compute(ctx, obj, e)? {
            Value::String(s) if !s.is_empty() => Ok(s),
            other => Err(Error::InvalidOperand(format!(
                "{name} 'as' must be a non-empty string, got {}",
                other.type_name()
            ))),
        },
    }
}

/// `$indexOfArray` finds the first position of a value within optional
/// `[start, end]` bounds; -1 when absent, null when the subject is nil.
pub fn index_of_array(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$indexOfArray")?;
    if !(2..=4).contains(&items.len()) {
        return Err(Error::InvalidOperand(format!(
            "$indexOfArray expects 2 to 4 operands, found {}",
            items.len()
        )));
    }
    if items[0].is_nil() {
        return Ok(Value::Null);
    }
    let Value::Array(arr) = &items[0] else {
        return Err(Error::InvalidOperand(format!(
            "$indexOfArray expects an array, got {}",
            items[0].type_name()
        )));
    };
    let start = match items.get(2) {
        None => 0,
        Some(v) => v.as_i64().unwrap_or(0).max(0) as usize,
    };
    let end = match items.get(3) {
        None => arr.len(),
        Some(v) => (v.as_i64().unwrap_or(arr.len() as i64).max(0) as usize).min(arr.len()),
    };
    if start > end {
        return Ok(Value::Integer(-1));
    }
    for (i, item) in arr[start.min(arr.len())..end].iter().enumerate() {
        if *item == items[1] {
            return Ok(Value::Integer((i + start) as i64));
        }
    }
    Ok(Value::Integer(-1))
}

/// `$isArray` checks its single argument (conventionally wrapped in a
/// one-element array).
pub fn is_array(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let target = match expr {
        Expr::Array(items) if items.len() == 1 => expr::compute(ctx, obj, &items[0])?,
        other => expr::compute(ctx, obj, other)?,
    };
    Ok(Value::Boolean(matches!(target, Value::Array(_))))
}

/// `$range` generates `[start, end)` with an optional non-zero step.
pub fn range(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$range")?;
    if !(2..=3).contains(&items.len()) {
        return Err(Error::InvalidOperand(format!(
            "$range expects 2 or 3 operands, found {}",
            items.len()
        )));
    }
    let (Some(start), Some(end)) = (items[0].as_i64(), items[1].as_i64()) else {
        return Err(Error::InvalidOperand(
            "$range bounds must be numbers".to_string(),
        ));
    };
    let step = match items.get(2) {
        None => 1,
        Some(v) => v.as_i64().ok_or_else(|| {
            Error::InvalidOperand("$range step must be a number".to_string())
        })?,
    };
    if step == 0 {
        return Err(Error::InvalidOperand(
            "$range step must not be zero".to_string(),
        ));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < end) || (step < 0 && i > end) {
        out.push(Value::Integer(i));
        i += step;
    }
    Ok(Value::Array(out))
}

pub fn reverse_array(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let v = expr::compute(ctx, obj, expr)?;
    if v.is_nil() {
        return Ok(Value::Null);
    }
    let mut items = match v {
        Value::Array(items) => items,
        other => {
            return Err(Error::InvalidOperand(format!(
                "$reverseArray expects an array, got {}",
                other.type_name()
            )));
        }
    };
    items.reverse();
    Ok(Value::Array(items))
}

/// `$reduce` folds `input`, exposing the accumulator as `$$value` and the
/// element as `$$this`.
pub fn reduce(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let args = record_args(expr, "$reduce", &["input", "initialValue", "in"])?;
    let (Some(input), Some(init), Some(body)) = (
        args.get("input"),
        args.get("initialValue"),
        args.get("in"),
    ) else {
        return Err(Error::InvalidOperand(
            "$reduce requires input, initialValue and in".to_string(),
        ));
    };
    let input = expr::compute(ctx, obj, input)?;
    if input.is_nil() {
        return Ok(Value::Null);
    }
    let items = match input {
        Value::Array(items) => items,
        other => {
            return Err(Error::InvalidOperand(format!(
                "$reduce input must be an array, got {}",
                other.type_name()
            )));
        }
    };
    let mut acc = expr::compute(ctx, obj, init)?;
    for item in items {
        let scoped = ctx.with_var("value", acc).with_var("this", item);
        acc = expr::compute(&scoped, obj, body)?;
    }
    Ok(acc)
}

pub fn size(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let v = expr::compute(ctx, obj, expr)?;
    match v {
        Value::Array(items) => Ok(Value::Integer(items.len() as i64)),
        other => Err(Error::InvalidOperand(format!(
            "$size expects an array, got {}",
            other.type_name()
        ))),
    }
}

/// `$slice` takes `[array, n]` or `[array, skip, limit]` with the usual
/// sign quirks (see `util::slice`).
pub fn slice(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = operand_array(ctx, obj, expr, "$slice")?;
    if !(2..=3).contains(&items.len()) {
        return Err(Error::InvalidOperand(format!(
            "$slice expects 2 or 3 operands, found {}",
            items.len()
        )));
    }
    if items[0].is_nil() {
        return Ok(Value::Null);
    }
    let Value::Array(arr) = &items[0] else {
        return Err(Error::InvalidOperand(format!(
            "$slice expects an array, got {}",
            items[0].type_name()
        )));
    };
    let Some(skip) = items[1].as_i64() else {
        return Err(Error::InvalidOperand(
            "$slice positions must be numbers".to_string(),
        ));
    };
    let limit = match items.get(2) {
        None => None,
        Some(v) => Some(v.as_i64().ok_or_else(|| {
            Error::InvalidOperand("$slice positions must be numbers".to_string())
        })?),
    };
    Ok(Value::Array(util::slice(arr, skip, limit)))
}

/// `$zip` transposes its input arrays. With `useLongestLength` the shorter
/// inputs are padded from `defaults` (or null); `defaults` is only legal
/// together with the flag.
pub fn zip(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let args = record_args(expr, "$zip", &["inputs", "useLongestLength", "defaults"])?;
    let Some(inputs) = args.get("inputs") else {
        return Err(Error::InvalidOperand("$zip requires inputs".to_string()));
    };
    let use_longest = match args.get("useLongestLength") {
        None => false,
        Some(e) => expr::compute(ctx, obj, e)?.is_truthy(),
    };
    let defaults = match args.get("defaults") {
        None => None,
        Some(e) => {
            if !use_longest {
                return Err(Error::InvalidOperand(
                    "$zip defaults requires useLongestLength".to_string(),
                ));
            }
            match expr::compute(ctx, obj, e)? {
                Value::Array(items) => Some(items),
                other => {
                    return Err(Error::InvalidOperand(format!(
                        "$zip defaults must be an array, got {}",
                        other.type_name()
                    )));
                }
            }
        }
    };
    let columns = match expr::compute(ctx, obj, inputs)? {
        Value::Array(columns) => columns,
        other => {
            return Err(Error::InvalidOperand(format!(
                "$zip inputs must be an array, got {}",
                other.type_name()
            )));
        }
    };
    let mut arrays = Vec::with_capacity(columns.len());
    for column in &columns {
        if column.is_nil() {
            return Ok(Value::Null);
        }
        let Value::Array(items) = column else {
            return Err(Error::InvalidOperand(format!(
                "$zip inputs must contain arrays, got {}",
                column.type_name()
            )));
        };
        arrays.push(items);
    }
    if let Some(defaults) = &defaults {
        if defaults.len() != arrays.len() {
            return Err(Error::InvalidOperand(
                "$zip defaults must match the number of inputs".to_string(),
            ));
        }
    }
    let len = if use_longest {
        arrays.iter().map(|a| a.len()).max().unwrap_or(0)
    } else {
        arrays.iter().map(|a| a.len()).min().unwrap_or(0)
    };
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let row: Vec<Value> = arrays
            .iter()
            .enumerate()
            .map(|(col, a)| match a.get(i) {
                Some(v) => v.clone(),
                None => defaults
                    .as_ref()
                    .and_then(|d| d.get(col))
                    .cloned()
                    .unwrap_or(Value::Null),
            })
            .collect();
        out.push(Value::Array(row));
    }
    Ok(Value::Array(out))
}
