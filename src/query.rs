//! The query matcher.
//!
//! [`Query`] compiles a criteria document once into a conjunction of
//! per-field predicates. Each predicate resolves its field path against the
//! candidate document — which may broadcast into arrays, giving MongoDB's
//! array-traversal matching — and applies one query operator to the result.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::ops as registry;
use crate::path;
use crate::value::Value;
use crate::Settings;

pub(crate) type Predicate = Arc<dyn Fn(&Value) -> Result<bool> + Send + Sync>;

/// A compiled criteria document.
///
/// # Examples
///
/// ```
/// use cumin::{Query, Value};
/// use serde_json::json;
///
/// let q = Query::new(Value::from(json!({"qty": {"$gt": 10}}))).unwrap();
/// assert!(q.test(&Value::from(json!({"qty": 11}))).unwrap());
/// assert!(!q.test(&Value::from(json!({"qty": 9}))).unwrap());
/// ```
#[derive(Clone)]
pub struct Query {
    criteria: Value,
    settings: Settings,
    projection: Option<Value>,
    predicates: Vec<Predicate>,
}

impl Query {
    /// Compile a criteria document with default settings.
    pub fn new(criteria: Value) -> Result<Query> {
        Query::with_settings(criteria, Settings::default())
    }

    /// Compile a criteria document, renaming the identity field per
    /// `settings`.
    pub fn with_settings(criteria: Value, settings: Settings) -> Result<Query> {
        let predicates = compile(&criteria)?;
        debug!(predicates = predicates.len(), "compiled query");
        Ok(Query {
            criteria,
            settings,
            projection: None,
            predicates,
        })
    }

    /// Attach a projection applied when the query materializes through a
    /// cursor.
    pub fn with_projection(mut self, projection: Value) -> Query {
        self.projection = Some(projection);
        self
    }

    pub fn criteria(&self) -> &Value {
        &self.criteria
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn projection(&self) -> Option<&Value> {
        self.projection.as_ref()
    }

    /// Test a document against the compiled conjunction.
    pub fn test(&self, doc: &Value) -> Result<bool> {
        for predicate in &self.predicates {
            if !predicate(doc)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Lazily filter a collection into a [`Cursor`].
    pub fn find(&self, collection: &[Value]) -> Cursor {
        Cursor::new(self.clone(), collection)
    }

    /// The complement of `find`: every document the criteria does not match.
    pub fn remove(&self, collection: &[Value]) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        for doc in collection {
            if !self.test(doc)? {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }
}

fn compile(criteria: &Value) -> Result<Vec<Predicate>> {
    let map = match criteria {
        Value::Object(map) => map,
        other => {
            return Err(Error::InvalidCriteria(format!(
                "criteria must be an object, got {}",
                other.type_name()
            )));
        }
    };
    let mut predicates: Vec<Predicate> = Vec::new();
    for (key, value) in map {
        if key.starts_with('$') {
            match key.as_str() {
                "$and" | "$or" | "$nor" => predicates.push(compile_logical(key, value)?),
                "$where" => predicates.push(compile_where(value)?),
                other => {
                    return Err(Error::UnknownOperator(format!(
                        "{other} is not a top-level operator"
                    )));
                }
            }
        } else {
            for (op, operand) in normalize(value)? {
                let f = registry::query_op(&op)
                    .ok_or_else(|| Error::UnknownOperator(op.clone()))?;
                let selector = key.clone();
                predicates.push(Arc::new(move |doc: &Value| {
                    let resolved = path::resolve(doc, &selector);
                    f(doc, &selector, &resolved, &operand)
                }));
            }
        }
    }
    Ok(predicates)
}

fn compile_logical(op: &str, operand: &Value) -> Result<Predicate> {
    let items = match operand {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(Error::InvalidCriteria(format!(
                "{op} operand must be a non-empty array"
            )));
        }
    };
    let queries: Vec<Query> = items
        .iter()
        .map(|item| Query::new(item.clone()))
        .collect::<Result<_>>()?;
    let any = |doc: &Value, queries: &[Query]| -> Result<bool> {
        for q in queries {
            if q.test(doc)? {
                return Ok(true);
            }
        }
        Ok(false)
    };
    Ok(match op {
        "$and" => Arc::new(move |doc| {
            for q in &queries {
                if !q.test(doc)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }),
        "$or" => Arc::new(move |doc| any(doc, &queries)),
        _ => Arc::new(move |doc| Ok(!any(doc, &queries)?)),
    })
}

fn compile_where(operand: &Value) -> Result<Predicate> {
    match operand {
        Value::Function(f) => {
            let f = f.clone();
            Ok(Arc::new(move |doc| Ok(f(doc))))
        }
        other => Err(Error::InvalidCriteria(format!(
            "$where requires a native predicate function, got {}",
            other.type_name()
        ))),
    }
}

/// Normalize a field predicate: scalars and regexes wrap into `$eq` /
/// `$regex`, operator-free objects into `$eq`, and `$options` folds into the
/// `$regex` operand.
fn normalize(value: &Value) -> Result<Vec<(String, Value)>> {
    match value {
        Value::Regex(_) => Ok(vec![("$regex".to_string(), value.clone())]),
        Value::Object(map) => {
            if !map.keys().any(|k| k.starts_with('$')) {
                return Ok(vec![("$eq".to_string(), value.clone())]);
            }
            let mut out = Vec::new();
            let mut pattern = None;
            let mut options = None;
            for (k, v) in map {
                match k.as_str() {
                    "$regex" => pattern = Some(v),
                    "$options" => match v {
                        Value::String(s) => options = Some(s.clone()),
                        other => {
                            return Err(Error::InvalidOperand(format!(
                                "$options must be a string, got {}",
                                other.type_name()
                            )));
                        }
                    },
                    other => {
                        if !registry::is_query_op(other) {
                            return Err(Error::UnknownOperator(other.to_string()));
                        }
                        out.push((other.to_string(), v.clone()));
                    }
                }
            }
            match (pattern, options) {
                (Some(pattern), options) => {
                    out.push(("$regex".to_string(), build_regex(pattern, options.as_deref())?));
                }
                (None, Some(_)) => {
                    return Err(Error::UnknownOperator(
                        "$options without $regex".to_string(),
                    ));
                }
                (None, None) => {}
            }
            Ok(out)
        }
        other => Ok(vec![("$eq".to_string(), other.clone())]),
    }
}

/// Combine a `$regex` operand with its `$options` flags into one compiled
/// regex. The JavaScript `g` flag is meaningless for matching and dropped.
fn build_regex(operand: &Value, options: Option<&str>) -> Result<Value> {
    let pattern = match operand {
        Value::String(s) => s.clone(),
        Value::Regex(r) => r.as_str().to_string(),
        other => {
            return Err(Error::InvalidOperand(format!(
                "$regex operand must be a string or regex, got {}",
                other.type_name()
            )));
        }
    };
    let mut flags = String::new();
    for c in options.unwrap_or("").chars() {
        match c {
            'i' | 'm' | 's' | 'x' => {
                if !flags.contains(c) {
                    flags.push(c);
                }
            }
            'g' => {}
            other => {
                return Err(Error::InvalidOperand(format!(
                    "unsupported $options flag: {other}"
                )));
            }
        }
    }
    let full = if flags.is_empty() {
        pattern
    } else {
        format!("(?{flags}){pattern}")
    };
    let re = Regex::new(&full)
        .map_err(|e| Error::InvalidOperand(format!("invalid $regex pattern: {e}")))?;
    Ok(Value::Regex(re))
}

/// The simple query operators. Each receives the candidate document, the
/// field selector, the resolved value (possibly an array from broadcast
/// traversal), and the operand.
pub(crate) mod ops {
    use std::cmp::Ordering;

    use super::*;
    use crate::util::{array_wrap, canonical_key, compare_values, intersection, is_comparable};

    pub(crate) fn eq(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        if resolved == operand {
            return Ok(true);
        }
        if let Value::Array(items) = resolved {
            return Ok(items.iter().any(|v| v == operand));
        }
        Ok(false)
    }

    pub(crate) fn ne(doc: &Value, sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        Ok(!eq(doc, sel, resolved, operand)?)
    }

    pub(crate) fn in_op(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        let Value::Array(choices) = operand else {
            return Err(Error::InvalidOperand("$in expects an array".to_string()));
        };
        let lhs = array_wrap(resolved);
        Ok(!intersection(&lhs, choices).is_empty())
    }

    pub(crate) fn nin(doc: &Value, sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        Ok(!in_op(doc, sel, resolved, operand)?)
    }

    fn ordered(resolved: &Value, operand: &Value, keep: fn(Ordering) -> bool) -> bool {
        array_wrap(resolved)
            .iter()
            .any(|v| is_comparable(v, operand) && keep(compare_values(v, operand)))
    }

    pub(crate) fn lt(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        Ok(ordered(resolved, operand, |o| o == Ordering::Less))
    }

    pub(crate) fn lte(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        Ok(ordered(resolved, operand, |o| o != Ordering::Greater))
    }

    pub(crate) fn gt(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        Ok(ordered(resolved, operand, |o| o == Ordering::Greater))
    }

    pub(crate) fn gte(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        Ok(ordered(resolved, operand, |o| o != Ordering::Less))
    }

    pub(crate) fn mod_op(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        let (divisor, remainder) = match operand {
            Value::Array(items) if items.len() == 2 => {
                match (items[0].as_f64(), items[1].as_f64()) {
                    (Some(d), Some(r)) => (d, r),
                    _ => {
                        return Err(Error::InvalidOperand(
                            "$mod expects numeric [divisor, remainder]".to_string(),
                        ));
                    }
                }
            }
            _ => {
                return Err(Error::InvalidOperand(
                    "$mod expects a 2-element array [divisor, remainder]".to_string(),
                ));
            }
        };
        Ok(array_wrap(resolved)
            .iter()
            .filter_map(Value::as_f64)
            .any(|v| v % divisor == remainder))
    }

    pub(crate) fn regex_op(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        let re = match operand {
            Value::Regex(re) => re.clone(),
            Value::String(s) => match super::build_regex(operand, None)? {
                Value::Regex(re) => re,
                _ => unreachable!("build_regex({s:?}) returned a non-regex"),
            },
            other => {
                return Err(Error::InvalidOperand(format!(
                    "$regex operand must be a string or regex, got {}",
                    other.type_name()
                )));
            }
        };
        for v in array_wrap(resolved) {
            match v {
                Value::String(s) => {
                    if re.is_match(&s) {
                        return Ok(true);
                    }
                }
                Value::Null | Value::Undefined => {}
                other => {
                    return Err(Error::InvalidOperand(format!(
                        "$regex applied to a non-string value of type {}",
                        other.type_name()
                    )));
                }
            }
        }
        Ok(false)
    }

    pub(crate) fn exists(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        Ok(operand.is_truthy() == !resolved.is_undefined())
    }

    pub(crate) fn all(doc: &Value, sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        let Value::Array(required) = operand else {
            return Err(Error::InvalidOperand("$all expects an array".to_string()));
        };
        if required.is_empty() {
            return Ok(false);
        }
        let elem_match_operands: Vec<Option<&Value>> = required
            .iter()
            .map(|item| match item {
                Value::Object(map) if map.len() == 1 => map.get("$elemMatch"),
                _ => None,
            })
            .collect();
        if elem_match_operands.iter().all(Option::is_some) {
            for sub in elem_match_operands.into_iter().flatten() {
                if !elem_match(doc, sel, resolved, sub)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        let have: std::collections::HashSet<String> =
            array_wrap(resolved).iter().map(canonical_key).collect();
        Ok(required.iter().all(|v| have.contains(&canonical_key(v))))
    }

    pub(crate) fn size(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        let Some(n) = operand.as_i64() else {
            return Err(Error::InvalidOperand("$size expects a number".to_string()));
        };
        Ok(matches!(resolved, Value::Array(items) if items.len() as i64 == n))
    }

    pub(crate) fn elem_match(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        let Value::Array(items) = resolved else {
            return Ok(false);
        };
        if !matches!(operand, Value::Object(_)) {
            return Err(Error::InvalidOperand(
                "$elemMatch expects an object".to_string(),
            ));
        }
        let query = Query::new(operand.clone())?;
        for item in items {
            if query.test(item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn type_op(_doc: &Value, _sel: &str, resolved: &Value, operand: &Value) -> Result<bool> {
        let Some(code) = operand.as_i64() else {
            return Err(Error::InvalidOperand(
                "$type expects a numeric type code".to_string(),
            ));
        };
        Ok(match code {
            1 => resolved.is_number(),
            2 => matches!(resolved, Value::String(_)),
            3 => matches!(resolved, Value::Object(_)),
            4 => matches!(resolved, Value::Array(_)),
            8 => matches!(resolved, Value::Boolean(_)),
            9 => matches!(resolved, Value::DateTime(_)),
            10 => matches!(resolved, Value::Null),
            11 => matches!(resolved, Value::Regex(_)),
            16 => matches!(resolved, Value::Integer(n) if i32::try_from(*n).is_ok()),
            18 => matches!(resolved, Value::Integer(n) if i32::try_from(*n).is_err()),
            _ => false,
        })
    }

    /// `$not` compiles `{selector: operand}` into a nested query and negates
    /// it against the whole document.
    pub(crate) fn not_op(doc: &Value, sel: &str, _resolved: &Value, operand: &Value) -> Result<bool> {
        let mut criteria = crate::value::Object::new();
        criteria.insert(sel.to_string(), operand.clone());
        let query = Query::new(Value::Object(criteria))?;
        Ok(!query.test(doc)?)
    }
}
