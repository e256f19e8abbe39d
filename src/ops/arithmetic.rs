//! Arithmetic operators.
//!
//! All of them evaluate their operand first, short-circuit to null when any
//! operand is null or undefined, propagate NaN, and fail with a validation
//! error when an operand is not numeric. Integer results are preserved where
//! the math is exact; mixed integer/float arithmetic goes through
//! high-precision decimals so that e.g. `100 * 1.1` stays integral.

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::value::Value;

/// Render a float as an integer when it is exactly integral.
pub(crate) fn number(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9e15 {
        Value::Integer(f as i64)
    } else {
        Value::Float(f)
    }
}

/// Evaluate a unary numeric operand: `None` means null/undefined input.
fn unary(ctx: &EvalCtx, obj: &Value, expr: &Expr, name: &str) -> Result<Option<Value>> {
    let v = expr::compute(ctx, obj, expr)?;
    if v.is_nil() {
        return Ok(None);
    }
    if !v.is_number() {
        return Err(Error::InvalidOperand(format!(
            "{name} expects a numeric operand, got {}",
            v.type_name()
        )));
    }
    Ok(Some(v))
}

/// Evaluate an operand array of numbers: `None` means some operand was
/// null/undefined. `arity` pins the expected length when given.
fn operands(
    ctx: &EvalCtx,
    obj: &Value,
    expr: &Expr,
    name: &str,
    arity: Option<usize>,
) -> Result<Option<Vec<Value>>> {
    let items = match expr::compute(ctx, obj, expr)? {
        Value::Array(items) => items,
        other => {
            return Err(Error::InvalidOperand(format!(
                "{name} expects an array of operands, got {}",
                other.type_name()
            )));
        }
    };
    if let Some(n) = arity {
        if items.len() != n {
            return Err(Error::InvalidOperand(format!(
                "{name} expects {n} operands, found {}",
                items.len()
            )));
        }
    }
    if items.iter().any(Value::is_nil) {
        return Ok(None);
    }
    if let Some(bad) = items.iter().find(|v| !v.is_number()) {
        return Err(Error::InvalidOperand(format!(
            "{name} expects numeric operands, got {}",
            bad.type_name()
        )));
    }
    Ok(Some(items))
}

/// Exact mixed integer/float arithmetic: run the operation through decimals
/// and keep the integer kind when the result is whole.
fn decimal_binop(a: &Value, b: &Value, f: fn(Decimal, Decimal) -> Decimal, fallback: f64) -> Value {
    let ad = match a {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    };
    let bd = match b {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    };
    if let (Some(ad), Some(bd)) = (ad, bd) {
        let rd = f(ad, bd);
        if rd.is_integer()
            && let Some(r) = rd.to_i64()
        {
            return Value::Integer(r);
        } else if let Some(r) = rd.to_f64() {
            return Value::Float(r);
        }
    }
    Value::Float(fallback)
}

pub(crate) fn add2(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => match x.checked_add(*y) {
            Some(r) => Value::Integer(r),
            None => Value::Float(*x as f64 + *y as f64),
        },
        (Value::Float(x), Value::Float(y)) => Value::Float(x + y),
        _ => {
            let fallback = a.as_f64().unwrap_or(f64::NAN) + b.as_f64().unwrap_or(f64::NAN);
            decimal_binop(a, b, |x, y| x + y, fallback)
        }
    }
}

fn mul2(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => match x.checked_mul(*y) {
            Some(r) => Value::Integer(r),
            None => Value::Float(*x as f64 * *y as f64),
        },
        (Value::Float(x), Value::Float(y)) => Value::Float(x * y),
        _ => {
            let fallback = a.as_f64().unwrap_or(f64::NAN) * b.as_f64().unwrap_or(f64::NAN);
            decimal_binop(a, b, |x, y| x * y, fallback)
        }
    }
}

fn sub2(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => match x.checked_sub(*y) {
            Some(r) => Value::Integer(r),
            None => Value::Float(*x as f64 - *y as f64),
        },
        (Value::Float(x), Value::Float(y)) => Value::Float(x - y),
        _ => {
            let fallback = a.as_f64().unwrap_or(f64::NAN) - b.as_f64().unwrap_or(f64::NAN);
            decimal_binop(a, b, |x, y| x - y, fallback)
        }
    }
}

fn div2(a: &Value, b: &Value) -> Value {
    let bf = b.as_f64().unwrap_or(f64::NAN);
    if bf == 0.0 {
        // JavaScript division semantics: x/0 is infinite, 0/0 is NaN
        return Value::Float(a.as_f64().unwrap_or(f64::NAN) / bf);
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            if x % y == 0 {
                Value::Integer(x / y)
            } else {
                Value::Float(*x as f64 / *y as f64)
            }
        }
        (Value::Float(x), Value::Float(y)) => Value::Float(x / y),
        _ => {
            let fallback = a.as_f64().unwrap_or(f64::NAN) / bf;
            decimal_binop(a, b, |x, y| x / y, fallback)
        }
    }
}

fn mod2(a: &Value, b: &Value) -> Value {
    let bf = b.as_f64().unwrap_or(f64::NAN);
    if bf == 0.0 {
        return Value::Float(f64::NAN);
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Value::Integer(x % y),
        _ => Value::Float(a.as_f64().unwrap_or(f64::NAN) % bf),
    }
}

pub fn abs(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match unary(ctx, obj, expr, "$abs")? {
        None => Value::Null,
        Some(Value::Integer(n)) => Value::Integer(n.abs()),
        Some(v) => Value::Float(v.as_f64().unwrap_or(f64::NAN).abs()),
    })
}

pub fn add(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match operands(ctx, obj, expr, "$add", None)? {
        None => Value::Null,
        Some(items) => items.iter().fold(Value::Integer(0), |acc, v| add2(&acc, v)),
    })
}

pub fn ceil(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match unary(ctx, obj, expr, "$ceil")? {
        None => Value::Null,
        Some(Value::Integer(n)) => Value::Integer(n),
        Some(v) => number(v.as_f64().unwrap_or(f64::NAN).ceil()),
    })
}

pub fn divide(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match operands(ctx, obj, expr, "$divide", Some(2))? {
        None => Value::Null,
        Some(items) => div2(&items[0], &items[1]),
    })
}

pub fn exp(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match unary(ctx, obj, expr, "$exp")? {
        None => Value::Null,
        Some(v) => number(v.as_f64().unwrap_or(f64::NAN).exp()),
    })
}

pub fn floor(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match unary(ctx, obj, expr, "$floor")? {
        None => Value::Null,
        Some(Value::Integer(n)) => Value::Integer(n),
        Some(v) => number(v.as_f64().unwrap_or(f64::NAN).floor()),
    })
}

pub fn ln(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match unary(ctx, obj, expr, "$ln")? {
        None => Value::Null,
        Some(v) => Value::Float(v.as_f64().unwrap_or(f64::NAN).ln()),
    })
}

pub fn log(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match operands(ctx, obj, expr, "$log", Some(2))? {
        None => Value::Null,
        Some(items) => {
            let x = items[0].as_f64().unwrap_or(f64::NAN);
            let base = items[1].as_f64().unwrap_or(f64::NAN);
            Value::Float(x.ln() / base.ln())
        }
    })
}

pub fn log10(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match unary(ctx, obj, expr, "$log10")? {
        None => Value::Null,
        Some(v) => Value::Float(v.as_f64().unwrap_or(f64::NAN).log10()),
    })
}

pub fn mod_op(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match operands(ctx, obj, expr, "$mod", Some(2))? {
        None => Value::Null,
        Some(items) => mod2(&items[0], &items[1]),
    })
}

pub fn multiply(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match operands(ctx, obj, expr, "$multiply", None)? {
        None => Value::Null,
        Some(items) => items.iter().fold(Value::Integer(1), |acc, v| mul2(&acc, v)),
    })
}

pub fn pow(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    match operands(ctx, obj, expr, "$pow", Some(2))? {
        None => Ok(Value::Null),
        Some(items) => {
            let base = items[0].as_f64().unwrap_or(f64::NAN);
            let exponent = items[1].as_f64().unwrap_or(f64::NAN);
            if base == 0.0 && exponent < 0.0 {
                return Err(Error::InvalidOperand(
                    "$pow cannot raise 0 to a negative exponent".to_string(),
                ));
            }
            if let (Value::Integer(b), Value::Integer(e)) = (&items[0], &items[1]) {
                if (0..=u32::MAX as i64).contains(e)
                    && let Some(r) = b.checked_pow(*e as u32)
                {
                    return Ok(Value::Integer(r));
                }
            }
            Ok(number(base.powf(exponent)))
        }
    }
}

pub fn sqrt(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    match unary(ctx, obj, expr, "$sqrt")? {
        None => Ok(Value::Null),
        Some(v) => {
            let x = v.as_f64().unwrap_or(f64::NAN);
            if x.is_nan() {
                return Ok(Value::Float(f64::NAN));
            }
            if x < 0.0 {
                return Err(Error::InvalidOperand(
                    "$sqrt expects a non-negative number".to_string(),
                ));
            }
            Ok(number(x.sqrt()))
        }
    }
}

pub fn subtract(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match operands(ctx, obj, expr, "$subtract", Some(2))? {
        None => Value::Null,
        Some(items) => sub2(&items[0], &items[1]),
    })
}

pub fn trunc(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    Ok(match unary(ctx, obj, expr, "$trunc")? {
        None => Value::Null,
        Some(Value::Integer(n)) => Value::Integer(n),
        Some(v) => number(v.as_f64().unwrap_or(f64::NAN).trunc()),
    })
}
