//! Variable-binding operators. Bindings extend the evaluation context's
//! environment for the duration of the body; documents are never touched.

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::value::Value;

/// `$map` transforms each element of `input`, binding it to `$$<as>`
/// (default `$$this`) while `in` is evaluated.
pub fn map(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let Expr::Record(entries) = expr else {
        return Err(Error::InvalidOperand(
            "$map expects { input, as, in }".to_string(),
        ));
    };
    let mut input = None;
    let mut as_name = None;
    let mut body = None;
    for (key, sub) in entries {
        match key.as_str() {
            "input" => input = Some(sub),
            "as" => as_name = Some(sub),
            "in" => body = Some(sub),
            other => {
                return Err(Error::InvalidOperand(format!(
                    "$map: unexpected argument {other}"
                )));
            }
        }
    }
    let (Some(input), Some(body)) = (input, body) else {
        return Err(Error::InvalidOperand(
            "$map requires input and in".to_string(),
        ));
    };
    let as_name = match as_name {
        None => "this".to_string(),
        Some(e) => match expr::compute(ctx, obj, e)? {
            Value::String(s) if !s.is_empty() => s,
            other => {
                return Err(Error::InvalidOperand(format!(
                    "$map 'as' must be a non-empty string, got {}",
                    other.type_name()
                )));
            }
        },
    };
    let input = expr::compute(ctx, obj, input)?;
    if input.is_nil() {
        return Ok(Value::Null);
    }
    let items = match input {
        Value::Array(items) => items,
        other => {
            return Err(Error::InvalidOperand(format!(
                "$map input must be an array, got {}",
                other.type_name()
            )));
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let scoped = ctx.with_var(&as_name, item);
        out.push(expr::compute(&scoped, obj, body)?);
    }
    Ok(Value::Array(out))
}

/// `$let` evaluates `vars` in declaration order and binds each (without its
/// `$$` prefix) while `in` is evaluated.
pub fn let_op(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let Expr::Record(entries) = expr else {
        return Err(Error::InvalidOperand(
            "$let expects { vars, in }".to_string(),
        ));
    };
    let mut vars = None;
    let mut body = None;
    for (key, sub) in entries {
        match key.as_str() {
            "vars" => vars = Some(sub),
            "in" => body = Some(sub),
            other => {
                return Err(Error::InvalidOperand(format!(
                    "$let: unexpected argument {other}"
                )));
            }
        }
    }
    let (Some(Expr::Record(vars)), Some(body)) = (vars, body) else {
        return Err(Error::InvalidOperand(
            "$let requires vars (an object) and in".to_string(),
        ));
    };
    let mut scoped = ctx.clone();
    for (name, sub) in vars {
        let value = expr::compute(&scoped, obj, sub)?;
        scoped = scoped.with_var(name, value);
    }
    expr::compute(&scoped, obj, body)
}
