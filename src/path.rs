//! Dot-path traversal over documents.
//!
//! A path is a dot-separated string of segments. A segment consisting only
//! of digits indexes an array; any other segment is an object key. When a
//! non-index segment reaches an array, resolution broadcasts into every
//! element, which is what gives queries their array-traversal semantics.

use crate::value::{Object, Value};

/// True when the segment addresses an array element by position.
fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Resolve `selector` against `obj`, returning `Undefined` once any segment
/// is missing.
///
/// For each non-index segment that reaches an array, resolution recurses
/// into every element and collects the results; one-element results unwrap.
/// A broadcast never immediately re-broadcasts: when the recursion starts on
/// a value that is already an array, the array is returned as-is.
pub fn resolve(obj: &Value, selector: &str) -> Value {
    let segments: Vec<&str> = selector.split('.').collect();
    resolve_segments(obj, &segments, false)
}

fn resolve_segments(obj: &Value, segments: &[&str], deep: bool) -> Value {
    let mut current = obj;
    for (i, segment) in segments.iter().enumerate() {
        match current {
            Value::Array(items) if !is_index(segment) => {
                if i == 0 && deep {
                    return current.clone();
                }
                let rest = &segments[i..];
                let mut out: Vec<Value> = items
                    .iter()
                    .map(|item| resolve_segments(item, rest, true))
                    .collect();
                if out.len() == 1 {
                    return out.pop().unwrap();
                }
                return Value::Array(out);
            }
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|n| items.get(n)) {
                Some(v) => current = v,
                None => return Value::Undefined,
            },
            Value::Object(map) => match map.get(*segment) {
                Some(v) => current = v,
                None => return Value::Undefined,
            },
            _ => return Value::Undefined,
        }
    }
    current.clone()
}

/// Resolve `selector` but return the minimal object subtree containing the
/// result, preserving nesting. Used by `$project` to rebuild sub-documents.
/// Empty intermediate results collapse to `Undefined`.
pub fn resolve_obj(obj: &Value, selector: &str) -> Value {
    let segments: Vec<&str> = selector.split('.').collect();
    resolve_obj_segments(obj, &segments)
}

fn resolve_obj_segments(obj: &Value, segments: &[&str]) -> Value {
    let segment = segments[0];
    let rest = &segments[1..];
    match obj {
        Value::Array(items) if is_index(segment) => {
            let Some(child) = segment.parse::<usize>().ok().and_then(|n| items.get(n)) else {
                return Value::Undefined;
            };
            let inner = if rest.is_empty() {
                child.clone()
            } else {
                resolve_obj_segments(child, rest)
            };
            if inner.is_undefined() {
                Value::Undefined
            } else {
                Value::Array(vec![inner])
            }
        }
        Value::Array(items) => {
            let out: Vec<Value> = items
                .iter()
                .map(|item| resolve_obj_segments(item, segments))
                .filter(|v| !v.is_undefined())
                .collect();
            if out.is_empty() {
                Value::Undefined
            } else {
                Value::Array(out)
            }
        }
        Value::Object(map) => {
            let Some(child) = map.get(segment) else {
                return Value::Undefined;
            };
            let inner = if rest.is_empty() {
                child.clone()
            } else {
                resolve_obj_segments(child, rest)
            };
            if inner.is_undefined() {
                return Value::Undefined;
            }
            let mut out = Object::new();
            out.insert(segment.to_string(), inner);
            Value::Object(out)
        }
        _ => Value::Undefined,
    }
}

/// Set the value at `selector`, creating missing intermediate objects.
/// Out-of-range array indices extend the array with nulls.
pub fn set_value(obj: &mut Value, selector: &str, value: Value) {
    let segments: Vec<&str> = selector.split('.').collect();
    set_segments(obj, &segments, value);
}

fn set_segments(current: &mut Value, segments: &[&str], value: Value) {
    let segment = segments[0];
    if segments.len() == 1 {
        match current {
            Value::Object(map) => {
                map.insert(segment.to_string(), value);
            }
            Value::Array(items) if is_index(segment) => {
                if let Ok(i) = segment.parse::<usize>() {
                    if i >= items.len() {
                        items.resize(i + 1, Value::Null);
                    }
                    items[i] = value;
                }
            }
            _ => {}
        }
        return;
    }
    match current {
        Value::Object(map) => {
            let child = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Object::new()));
            set_segments(child, &segments[1..], value);
        }
        Value::Array(items) if is_index(segment) => {
            if let Some(child) = segment.parse::<usize>().ok().and_then(|n| items.get_mut(n)) {
                set_segments(child, &segments[1..], value);
            }
        }
        _ => {}
    }
}

/// Remove the value at `selector`. An array-index terminal segment splices
/// the element out. Silent no-op when the path does not exist.
pub fn remove_value(obj: &mut Value, selector: &str) {
    let segments: Vec<&str> = selector.split('.').collect();
    remove_segments(obj, &segments);
}

fn remove_segments(current: &mut Value, segments: &[&str]) {
    let segment = segments[0];
    if segments.len() == 1 {
        match current {
            Value::Object(map) => {
                map.shift_remove(segment);
            }
            Value::Array(items) if is_index(segment) => {
                if let Ok(i) = segment.parse::<usize>() {
                    if i < items.len() {
                        items.remove(i);
                    }
                }
            }
            _ => {}
        }
        return;
    }
    match current {
        Value::Object(map) => {
            if let Some(child) = map.get_mut(segment) {
                remove_segments(child, &segments[1..]);
            }
        }
        Value::Array(items) if is_index(segment) => {
            if let Some(child) = segment.parse::<usize>().ok().and_then(|n| items.get_mut(n)) {
                remove_segments(child, &segments[1..]);
            }
        }
        _ => {}
    }
}

/// Deep-merge `src` into `target`: objects merge per key, equal-length
/// arrays merge element-wise, anything else overwrites. Used to combine the
/// minimal subtrees `resolve_obj` produces for sibling projection paths.
pub fn merge(target: &mut Value, src: Value) {
    match (target, src) {
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                match dst.get_mut(&k) {
                    Some(slot) => merge(slot, v),
                    None => {
                        dst.insert(k, v);
                    }
                }
            }
        }
        (Value::Array(dst), Value::Array(src)) if dst.len() == src.len() => {
            for (slot, v) in dst.iter_mut().zip(src) {
                merge(slot, v);
            }
        }
        (slot, src) => *slot = src,
    }
}
