//! Conditional operators.

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::value::Value;

/// `$cond` accepts either `[if, then, else]` or `{if, then, else}`.
pub fn cond(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let (condition, then_branch, else_branch) = match expr {
        Expr::Array(items) if items.len() == 3 => (&items[0], &items[1], &items[2]),
        Expr::Record(entries) => {
            let mut condition = None;
            let mut then_branch = None;
            let mut else_branch = None;
            for (key, sub) in entries {
                match key.as_str() {
                    "if" => condition = Some(sub),
                    "then" => then_branch = Some(sub),
                    "else" => else_branch = Some(sub),
                    other => {
                        return Err(Error::InvalidOperand(format!(
                            "$cond: unexpected argument {other}"
                        )));
                    }
                }
            }
            match (condition, then_branch, else_branch) {
                (Some(c), Some(t), Some(e)) => (c, t, e),
                _ => {
                    return Err(Error::InvalidOperand(
                        "$cond requires if, then and else".to_string(),
                    ));
                }
            }
        }
        _ => {
            return Err(Error::InvalidOperand(
                "$cond expects [if, then, else] or { if, then, else }".to_string(),
            ));
        }
    };
    if expr::compute(ctx, obj, condition)?.is_truthy() {
        expr::compute(ctx, obj, then_branch)
    } else {
        expr::compute(ctx, obj, else_branch)
    }
}

/// `$ifNull` returns its first operand unless that is null or undefined, in
/// which case the second is evaluated.
pub fn if_null(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let Expr::Array(items) = expr else {
        return Err(Error::InvalidOperand(
            "$ifNull expects a 2-element array".to_string(),
        ));
    };
    if items.len() != 2 {
        return Err(Error::InvalidOperand(format!(
            "$ifNull expects 2 operands, found {}",
            items.len()
        )));
    }
    let first = expr::compute(ctx, obj, &items[0])?;
    if first.is_nil() {
        expr::compute(ctx, obj, &items[1])
    } else {
        Ok(first)
    }
}

/// `$switch` scans `branches` in order and evaluates the first `then` whose
/// `case` is truthy, falling back to `default`.
pub fn switch(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let Expr::Record(entries) = expr else {
        return Err(Error::InvalidOperand(
            "$switch expects { branches, default }".to_string(),
        ));
    };
    let mut branches = None;
    let mut default = None;
    for (key, sub) in entries {
        match key.as_str() {
            "branches" => branches = Some(sub),
            "default" => default = Some(sub),
            other => {
                return Err(Error::InvalidOperand(format!(
                    "$switch: unexpected argument {other}"
                )));
            }
        }
    }
    let Some(Expr::Array(branches)) = branches else {
        return Err(Error::InvalidOperand(
            "$switch requires an array of branches".to_string(),
        ));
    };
    for branch in branches {
        let Expr::Record(parts) = branch else {
            return Err(Error::InvalidOperand(
                "$switch branches must be { case, then }".to_string(),
            ));
        };
        let case = parts.iter().find(|(k, _)| k == "case");
        let then = parts.iter().find(|(k, _)| k == "then");
        let (Some((_, case)), Some((_, then))) = (case, then) else {
            return Err(Error::InvalidOperand(
                "$switch branches must be { case, then }".to_string(),
            ));
        };
        if expr::compute(ctx, obj, case)?.is_truthy() {
            return expr::compute(ctx, obj, then);
        }
    }
    match default {
        Some(default) => expr::compute(ctx, obj, default),
        None => Err(Error::InvalidOperand(
            "$switch found no matching branch and no default".to_string(),
        )),
    }
}
