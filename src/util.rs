//! Value utilities shared across the engine: ordering, canonical identity,
//! set operations, and the statistics helpers the accumulators use.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::Write;

use crate::value::Value;

/// Total order over values used by `$sort`, `$min`/`$max`, and the ordered
/// comparison operators. Values of different kinds order by a fixed type
/// rank; within a kind the natural order applies.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Regex(x), Value::Regex(y)) => x.as_str().cmp(y.as_str()),
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                let ord = compare_values(ex, ey);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => canonical_key(a).cmp(&canonical_key(b)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Undefined => 0,
        Value::Null => 1,
        Value::Integer(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
        Value::Function(_) => 6,
        Value::Boolean(_) => 7,
        Value::DateTime(_) => 8,
        Value::Regex(_) => 9,
    }
}

/// True when an ordered comparison between the two values is meaningful:
/// both numbers, both strings, both booleans, or both dates.
pub fn is_comparable(a: &Value, b: &Value) -> bool {
    (a.is_number() && b.is_number())
        || matches!((a, b), (Value::String(_), Value::String(_)))
        || matches!((a, b), (Value::Boolean(_), Value::Boolean(_)))
        || matches!((a, b), (Value::DateTime(_), Value::DateTime(_)))
}

/// Canonical encoding of a value, used as set identity and as the grouping
/// key of `$group`. Object keys are sorted so key order never affects
/// identity; the encoding distinguishes every kind (notably null from
/// undefined) and renders integral floats like integers so that numeric
/// equality and canonical identity agree.
pub fn canonical_key(v: &Value) -> String {
    let mut out = String::new();
    write_canonical(v, &mut out);
    out
}

fn write_canonical(v: &Value, out: &mut String) {
    match v {
        Value::Null => out.push_str("null"),
        Value::Undefined => out.push_str("undefined"),
        Value::Boolean(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Integer(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float(n) => {
            if n.is_nan() {
                out.push_str("NaN");
            } else if n.is_infinite() {
                out.push_str(if *n > 0.0 { "Infinity" } else { "-Infinity" });
            } else if n.fract() == 0.0 && n.abs() < 9e15 {
                let _ = write!(out, "{}", *n as i64);
            } else {
                let _ = write!(out, "{n}");
            }
        }
        Value::String(s) => {
            let _ = write!(out, "{}", serde_json::Value::String(s.clone()));
        }
        Value::DateTime(d) => {
            let _ = write!(out, "date({})", d.timestamp_millis());
        }
        Value::Regex(r) => {
            let _ = write!(out, "regex({})", r.as_str());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", serde_json::Value::String((*k).clone()));
                write_canonical(&map[k.as_str()], out);
            }
            out.push('}');
        }
        Value::Function(_) => out.push_str("function"),
    }
}

/// 32-bit hash of a value: the `(h << 5) - h + byte` fold over the canonical
/// encoding and the type tag.
pub fn hashcode(v: &Value) -> i32 {
    let mut h: i32 = 0;
    for b in canonical_key(v).bytes().chain(v.type_name().bytes()) {
        h = (h << 5).wrapping_sub(h).wrapping_add(b as i32);
    }
    h
}

/// Elements of `a` that also occur in `b`, deduplicated, in `a`'s order.
pub fn intersection(a: &[Value], b: &[Value]) -> Vec<Value> {
    let keys: HashSet<String> = b.iter().map(canonical_key).collect();
    let mut seen = HashSet::new();
    a.iter()
        .filter(|v| {
            let k = canonical_key(v);
            keys.contains(&k) && seen.insert(k)
        })
        .cloned()
        .collect()
}

/// All distinct elements of `a` and `b`, in first-occurrence order.
pub fn union(a: &[Value], b: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    a.iter()
        .chain(b.iter())
        .filter(|v| seen.insert(canonical_key(v)))
        .cloned()
        .collect()
}

/// Distinct elements in first-occurrence order.
pub fn unique(xs: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    xs.iter()
        .filter(|v| seen.insert(canonical_key(v)))
        .cloned()
        .collect()
}

/// Flatten nested arrays down to `depth` levels; `-1` means unbounded.
pub fn flatten(xs: &[Value], depth: i32) -> Vec<Value> {
    let mut out = Vec::with_capacity(xs.len());
    for item in xs {
        match item {
            Value::Array(inner) if depth != 0 => {
                out.extend(flatten(inner, if depth < 0 { depth } else { depth - 1 }));
            }
            other => out.push(other.clone()),
        }
    }
    out
}

/// Standard deviation of a numeric dataset. The mean always divides by `N`;
/// the variance denominator is `N - 1` for the sampled form.
pub fn stddev(data: &[f64], sampled: bool) -> Option<f64> {
    let n = data.len();
    if n == 0 || (sampled && n < 2) {
        return None;
    }
    let mean = data.iter().sum::<f64>() / n as f64;
    let denom = if sampled { n - 1 } else { n } as f64;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / denom;
    Some(variance.sqrt())
}

/// Wrap a non-array value into a one-element array; arrays pass through.
pub fn array_wrap(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Array slicing with the `$slice` argument rules: a single count takes the
/// first `n` elements, or the last `|n|` when negative; a skip/limit pair
/// counts the skip from the end when negative.
pub fn slice(xs: &[Value], skip: i64, limit: Option<i64>) -> Vec<Value> {
    let len = xs.len() as i64;
    let (start, count) = match limit {
        None => {
            if skip < 0 {
                ((len + skip).max(0), skip.unsigned_abs() as i64)
            } else {
                (0, skip)
            }
        }
        Some(limit) => {
            let start = if skip < 0 { (len + skip).max(0) } else { skip.min(len) };
            (start, limit.max(0))
        }
    };
    let start = start.min(len) as usize;
    let end = (start + count.max(0) as usize).min(xs.len());
    xs[start..end].to_vec()
}
