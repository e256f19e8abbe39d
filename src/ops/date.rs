//! Date operators. All extraction reads UTC; non-date input yields
//! `Undefined`.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::value::Value;

fn date_operand(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Option<DateTime<Utc>>> {
    match expr::compute(ctx, obj, expr)? {
        Value::DateTime(d) => Ok(Some(d)),
        _ => Ok(None),
    }
}

fn extract(
    ctx: &EvalCtx,
    obj: &Value,
    expr: &Expr,
    f: fn(&DateTime<Utc>) -> i64,
) -> Result<Value> {
    Ok(match date_operand(ctx, obj, expr)? {
        Some(d) => Value::Integer(f(&d)),
        None => Value::Undefined,
    })
}

pub fn year(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.year() as i64)
}

pub fn month(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.month() as i64)
}

pub fn day_of_month(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.day() as i64)
}

pub fn day_of_year(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.ordinal() as i64)
}

/// Day of week: 1 (Sunday) through 7 (Saturday).
pub fn day_of_week(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| {
        d.weekday().num_days_from_sunday() as i64 + 1
    })
}

/// ISO week number (weeks anchored on Thursday).
pub fn week(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.iso_week().week() as i64)
}

pub fn hour(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.hour() as i64)
}

pub fn minute(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.minute() as i64)
}

pub fn second(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.second() as i64)
}

pub fn millisecond(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    extract(ctx, obj, expr, |d| d.timestamp_subsec_millis() as i64)
}

/// `$dateToString` formats a date with a `%`-token table:
/// `%Y %m %d %H %M %S %L %j %w %U %%`. Unknown tokens pass through.
pub fn date_to_string(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let Expr::Record(entries) = expr else {
        return Err(Error::InvalidOperand(
            "$dateToString expects { format, date }".to_string(),
        ));
    };
    let mut format = None;
    let mut date = None;
    for (key, sub) in entries {
        match key.as_str() {
            "format" => format = Some(sub),
            "date" => date = Some(sub),
            other => {
                return Err(Error::InvalidOperand(format!(
                    "$dateToString: unexpected argument {other}"
                )));
            }
        }
    }
    let (Some(format), Some(date)) = (format, date) else {
        return Err(Error::InvalidOperand(
            "$dateToString requires both format and date".to_string(),
        ));
    };
    let format = match expr::compute(ctx, obj, format)? {
        Value::String(s) => s,
        other => {
            return Err(Error::InvalidOperand(format!(
                "$dateToString format must be a string, got {}",
                other.type_name()
            )));
        }
    };
    let Some(d) = date_operand(ctx, obj, date)? else {
        return Ok(Value::Undefined);
    };

    let mut out = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&format!("{:04}", d.year())),
            Some('m') => out.push_str(&format!("{:02}", d.month())),
            Some('d') => out.push_str(&format!("{:02}", d.day())),
            Some('H') => out.push_str(&format!("{:02}", d.hour())),
            Some('M') => out.push_str(&format!("{:02}", d.minute())),
            Some('S') => out.push_str(&format!("{:02}", d.second())),
            Some('L') => out.push_str(&format!("{:03}", d.timestamp_subsec_millis())),
            Some('j') => out.push_str(&format!("{:03}", d.ordinal())),
            Some('w') => out.push_str(&format!("{}", d.weekday().num_days_from_sunday() + 1)),
            Some('U') => out.push_str(&format!("{:02}", d.iso_week().week())),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    Ok(Value::String(out))
}
