//! Set operators. Arrays are treated as sets collapsed through canonical
//! identity; element order in results follows first occurrence.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::util::{canonical_key, intersection, union, unique};
use crate::value::Value;

/// Evaluate the operand into a list of arrays.
fn set_operands(
    ctx: &EvalCtx,
    obj: &Value,
    expr: &Expr,
    name: &str,
    arity: Option<usize>,
) -> Result<Vec<Vec<Value>>> {
    let v = expr::compute(ctx, obj, expr)?;
    let items = match v {
        Value::Array(items) => items,
        other => {
            return Err(Error::InvalidOperand(format!(
                "{name} expects an array of arrays, got {}",
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
    items
        .into_iter()
        .map(|item| match item {
            Value::Array(inner) => Ok(inner),
            other => Err(Error::InvalidOperand(format!(
                "{name} expects array operands, got {}",
                other.type_name()
            ))),
        })
        .collect()
}

pub fn set_equals(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let sets = set_operands(ctx, obj, expr, "$setEquals", None)?;
    if sets.len() < 2 {
        return Err(Error::InvalidOperand(
            "$setEquals expects at least 2 operands".to_string(),
        ));
    }
    let first: HashSet<String> = sets[0].iter().map(canonical_key).collect();
    let equal = sets[1..].iter().all(|s| {
        let keys: HashSet<String> = s.iter().map(canonical_key).collect();
        keys == first
    });
    Ok(Value::Boolean(equal))
}

pub fn set_intersection(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let sets = set_operands(ctx, obj, expr, "$setIntersection", None)?;
    let mut iter = sets.into_iter();
    let mut acc = unique(&iter.next().unwrap_or_default());
    for s in iter {
        acc = intersection(&acc, &s);
    }
    Ok(Value::Array(acc))
}

pub fn set_difference(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let sets = set_operands(ctx, obj, expr, "$setDifference", Some(2))?;
    let exclude: HashSet<String> = sets[1].iter().map(canonical_key).collect();
    let mut seen = HashSet::new();
    let out: Vec<Value> = sets[0]
        .iter()
        .filter(|v| {
            let k = canonical_key(v);
            !exclude.contains(&k) && seen.insert(k)
        })
        .cloned()
        .collect();
    Ok(Value::Array(out))
}

pub fn set_union(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let sets = set_operands(ctx, obj, expr, "$setUnion", None)?;
    let mut acc = Vec::new();
    for s in sets {
        acc = union(&acc, &s);
    }
    Ok(Value::Array(acc))
}

pub fn set_is_subset(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let sets = set_operands(ctx, obj, expr, "$setIsSubset", Some(2))?;
    let superset: HashSet<String> = sets[1].iter().map(canonical_key).collect();
    Ok(Value::Boolean(
        sets[0].iter().all(|v| superset.contains(&canonical_key(v))),
    ))
}

/// The truth operators take a single array wrapped in the operand list.
fn truth_operand(ctx: &EvalCtx, obj: &Value, expr: &Expr, name: &str) -> Result<Vec<Value>> {
    let mut sets = set_operands(ctx, obj, expr, name, Some(1))?;
    Ok(sets.pop().unwrap())
}

pub fn all_elements_true(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = truth_operand(ctx, obj, expr, "$allElementsTrue")?;
    Ok(Value::Boolean(items.iter().all(Value::is_truthy)))
}

pub fn any_element_true(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    let items = truth_operand(ctx, obj, expr, "$anyElementTrue")?;
    Ok(Value::Boolean(items.iter().any(Value::is_truthy)))
}
