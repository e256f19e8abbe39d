//! Comparison operators in expression position: each takes a two-element
//! operand array and compares with the engine-wide value ordering.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::util::compare_values;
use crate::value::Value;

fn pair(ctx: &EvalCtx, obj: &Value, expr: &Expr, name: &str) -> Result<(Value, Value)> {
    let v = expr::compute(ctx, obj, expr)?;
    match v {
        Value::Array(mut items) if items.len() == 2 => {
            let b = items.pop().unwrap();
            let a = items.pop().unwrap();
            Ok((a, b))
        }
        other => Err(Error::InvalidOperand(format!(
            "{name} expects a 2-element array, got {}",
            other.type_name()
        ))),
    }
}

pub fn cmp(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let (a, b) = pair(ctx, obj, expr, "$cmp")?;
    Ok(Value::Integer(match compare_values(&a, &b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

pub fn eq(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let (a, b) = pair(ctx, obj, expr, "$eq")?;
    Ok(Value::Boolean(a == b))
}

pub fn ne(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let (a, b) = pair(ctx, obj, expr, "$ne")?;
    Ok(Value::Boolean(a != b))
}

pub fn gt(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let (a, b) = pair(ctx, obj, expr, "$gt")?;
    Ok(Value::Boolean(compare_values(&a, &b) == Ordering::Greater))
}

pub fn gte(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let (a, b) = pair(ctx, obj, expr, "$gte")?;
    Ok(Value::Boolean(compare_values(&a, &b) != Ordering::Less))
}

pub fn lt(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let (a, b) = pair(ctx, obj, expr, "$lt")?;
    Ok(Value::Boolean(compare_values(&a, &b) == Ordering::Less))
}

pub fn lte(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let (a, b) = pair(ctx, obj, expr, "$lte")?;
    Ok(Value::Boolean(compare_values(&a, &b) != Ordering::Greater))
}
