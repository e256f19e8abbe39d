//! Group accumulators. Each reduces the list of per-document values that
//! `$group` (or an expression-position use) has already materialized.

use crate::error::Result;
use crate::ops::arithmetic::add2;
use crate::util::{compare_values, stddev, unique};
use crate::value::Value;

/// `$push` keeps every value, including nulls.
pub fn push(values: &[Value]) -> Result<Value> {
    Ok(Value::Array(values.to_vec()))
}

/// `$addToSet` keeps the distinct values in first-occurrence order.
pub fn add_to_set(values: &[Value]) -> Result<Value> {
    Ok(Value::Array(unique(values)))
}

/// `$sum` adds the numeric values, ignoring everything else; an empty or
/// non-numeric input sums to 0.
pub fn sum(values: &[Value]) -> Result<Value> {
    Ok(values
        .iter()
        .filter(|v| v.is_number())
        .fold(Value::Integer(0), |acc, v| add2(&acc, v)))
}

/// `$avg` averages the numeric values; null when there are none.
pub fn avg(values: &[Value]) -> Result<Value> {
    let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    if nums.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Float(nums.iter().sum::<f64>() / nums.len() as f64))
}

/// `$min` of the non-nil values; null when there are none.
pub fn min(values: &[Value]) -> Result<Value> {
    Ok(values
        .iter()
        .filter(|v| !v.is_nil())
        .min_by(|a, b| compare_values(a, b))
        .cloned()
        .unwrap_or(Value::Null))
}

/// `$max` of the non-nil values; null when there are none.
pub fn max(values: &[Value]) -> Result<Value> {
    Ok(values
        .iter()
        .filter(|v| !v.is_nil())
        .max_by(|a, b| compare_values(a, b))
        .cloned()
        .unwrap_or(Value::Null))
}

pub fn first(values: &[Value]) -> Result<Value> {
    Ok(values.first().cloned().unwrap_or(Value::Undefined))
}

pub fn last(values: &[Value]) -> Result<Value> {
    Ok(values.last().cloned().unwrap_or(Value::Undefined))
}

fn std_dev(values: &[Value], sampled: bool) -> Value {
    let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    match stddev(&nums, sampled) {
        Some(sd) => Value::Float(sd),
        None => Value::Null,
    }
}

pub fn std_dev_pop(values: &[Value]) -> Result<Value> {
    Ok(std_dev(values, false))
}

pub fn std_dev_samp(values: &[Value]) -> Result<Value> {
    Ok(std_dev(values, true))
}
