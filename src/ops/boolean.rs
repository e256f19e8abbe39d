//! Boolean operators over truthiness.

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::value::Value;

fn truthy_operands(ctx: &EvalCtx, obj: &Value, expr: &Expr, name: &str) -> Result<Vec<Value>> {
    match expr::compute(ctx, obj, expr)? {
        Value::Array(items) => Ok(items),
        other => Err(Error::InvalidOperand(format!(
            "{name} expects an array of operands, got {}",
            other.type_name()
        ))),
    }
}

pub fn and(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = truthy_operands(ctx, obj, expr, "$and")?;
    Ok(Value::Boolean(items.iter().all(Value::is_truthy)))
}

pub fn or(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = truthy_operands(ctx, obj, expr, "$or")?;
    Ok(Value::Boolean(items.iter().any(Value::is_truthy)))
}

/// `$not` negates its single argument, which may be wrapped in a
/// one-element array.
pub fn not(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let v = match expr {
        Expr::Array(items) if items.len() == 1 => expr::compute(ctx, obj, &items[0])?,
        other => expr::compute(ctx, obj, other)?,
    };
    Ok(Value::Boolean(!v.is_truthy()))
}
