//! The pipeline runtime.
//!
//! An [`Aggregator`] threads a document batch through a sequence of stages.
//! Stage handlers are methods on the aggregator so that composite stages
//! (`$sortByCount`) can invoke other stages directly.

use std::collections::HashMap;

use rand::Rng;
use tracing::trace;

use crate::error::{Error, Result};
use crate::expr::{self, EvalCtx, Expr};
use crate::ops as registry;
use crate::path;
use crate::query::Query;
use crate::util::{canonical_key, compare_values};
use crate::value::{Object, Value};
use crate::Settings;

/// A compiled-enough aggregation pipeline: stages are validated as they run.
///
/// # Examples
///
/// ```
/// use cumin::{Aggregator, Value};
/// use serde_json::json;
///
/// let docs: Vec<Value> = [json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]
///     .map(Value::from)
///     .to_vec();
/// let agg = Aggregator::new(vec![Value::from(json!({"$match": {"n": {"$gte": 2}}}))]);
/// assert_eq!(agg.run(&docs).unwrap().len(), 2);
/// ```
pub struct Aggregator {
    pipeline: Vec<Value>,
    settings: Settings,
}

impl Aggregator {
    pub fn new(pipeline: Vec<Value>) -> Aggregator {
        Aggregator::with_settings(pipeline, Settings::default())
    }

    pub fn with_settings(pipeline: Vec<Value>, settings: Settings) -> Aggregator {
        Aggregator { pipeline, settings }
    }

    /// Run the pipeline over a collection. Every stage must be an object
    /// with a single key naming a registered pipeline operator.
    pub fn run(&self, collection: &[Value]) -> Result<Vec<Value>> {
        let mut coll: Vec<Value> = collection.to_vec();
        for stage in &self.pipeline {
            let map = match stage {
                Value::Object(map) if map.len() == 1 => map,
                _ => {
                    return Err(Error::InvalidCriteria(
                        "every pipeline stage must be an object with a single operator key"
                            .to_string(),
                    ));
                }
            };
            let (name, operand) = map.iter().next().unwrap();
            let op = registry::pipeline_op(name)
                .ok_or_else(|| Error::UnknownOperator(name.clone()))?;
            trace!(stage = %name, docs = coll.len(), "running pipeline stage");
            coll = op(self, coll, operand)?;
        }
        Ok(coll)
    }

    pub(crate) fn match_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let query = Query::with_settings(operand.clone(), self.settings.clone())?;
        let mut out = Vec::new();
        for doc in coll {
            if query.test(&doc)? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    pub(crate) fn project_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let proj = match operand {
            Value::Object(map) if !map.is_empty() => map,
            _ => {
                return Err(Error::InvalidOperand(
                    "$project expects a non-empty object".to_string(),
                ));
            }
        };
        let id_key = self.settings.key.as_str();

        // Inclusion and exclusion may not mix, except for the identity field.
        let mut has_inclusion = false;
        let mut has_exclusion = false;
        for (key, sub) in proj {
            if key == id_key {
                continue;
            }
            match sub {
                Value::Integer(0) | Value::Boolean(false) => has_exclusion = true,
                Value::Integer(1) | Value::Boolean(true) => has_inclusion = true,
                _ => {}
            }
        }
        if has_inclusion && has_exclusion {
            return Err(Error::InvalidCriteria(
                "$project cannot mix inclusion and exclusion".to_string(),
            ));
        }

        let id_excluded = matches!(
            proj.get(id_key),
            Some(Value::Integer(0)) | Some(Value::Boolean(false))
        );
        let keys: Vec<&str> = proj
            .keys()
            .map(String::as_str)
            .filter(|k| !(id_excluded && *k == id_key))
            .collect();
        let id_only_excluded = id_excluded && keys.is_empty();

        let mut out = Vec::with_capacity(coll.len());
        for doc in &coll {
            if id_only_excluded {
                let mut copy = doc.clone();
                path::remove_value(&mut copy, id_key);
                out.push(copy);
                continue;
            }

            let mut included = Value::Object(Object::new());
            let mut computed: Vec<(String, Value)> = Vec::new();
            let mut drop_keys: Vec<&str> = Vec::new();
            let mut merge_mode = false;
            if id_excluded {
                drop_keys.push(id_key);
            } else if !proj.contains_key(id_key) {
                // the identity field is included implicitly
                let id_value = path::resolve(doc, id_key);
                if !id_value.is_undefined() {
                    computed.push((id_key.to_string(), id_value));
                }
            }

            for key in &keys {
                let key = *key;
                let sub = &proj[key];
                match sub {
                    Value::Integer(0) | Value::Boolean(false) => {
                        merge_mode = true;
                        drop_keys.push(key);
                    }
                    Value::Integer(1) | Value::Boolean(true) => {
                        let subtree = path::resolve_obj(doc, key);
                        if !subtree.is_undefined() {
                            path::merge(&mut included, subtree);
                        }
                    }
                    Value::Object(map) => {
                        let single_op = if map.len() == 1 {
                            map.keys().next().filter(|k| k.starts_with('$'))
                        } else {
                            None
                        };
                        match single_op {
                            Some(op)
                                if registry::is_projection_op(op)
                                    && (op != "$slice" || numeric_shape(&map[op.as_str()])) =>
                            {
                                if op == "$slice" {
                                    merge_mode = true;
                                }
                                let f = registry::projection_op(op).unwrap();
                                let value = f(doc, key, &map[op.as_str()])?;
                                if !value.is_undefined() {
                                    computed.push((key.to_string(), value));
                                }
                            }
                            _ => {
                                let value = expr::compute_value(doc, sub)?;
                                if !value.is_undefined() {
                                    computed.push((key.to_string(), value));
                                }
                            }
                        }
                    }
                    _ => {
                        let value = expr::compute_value(doc, sub)?;
                        if !value.is_undefined() {
                            computed.push((key.to_string(), value));
                        }
                    }
                }
            }

            let result = if merge_mode {
                let mut copy = doc.clone();
                for key in &drop_keys {
                    path::remove_value(&mut copy, key);
                }
                if !matches!(&included, Value::Object(m) if m.is_empty()) {
                    path::merge(&mut copy, included);
                }
                for (key, value) in computed {
                    path::set_value(&mut copy, &key, value);
                }
                copy
            } else {
                let mut base = Value::Object(Object::new());
                for (key, value) in computed {
                    path::set_value(&mut base, &key, value);
                }
                path::merge(&mut base, included);
                base
            };
            out.push(result);
        }
        Ok(out)
    }

    pub(crate) fn group_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let spec = match operand {
            Value::Object(map) => map,
            _ => {
                return Err(Error::InvalidOperand(
                    "$group expects an object".to_string(),
                ));
            }
        };
        let id_key = self.settings.key.as_str();
        let id_expr = match spec.get(id_key) {
            Some(v) => Some(Expr::parse(v)?),
            None => None,
        };

        // partition, preserving first-seen group order
        let mut order: Vec<String> = Vec::new();
        let mut buckets: HashMap<String, (Value, Vec<Value>)> = HashMap::new();
        for doc in coll {
            let key_value = match &id_expr {
                Some(e) => expr::compute(&EvalCtx::new(&doc), &doc, e)?,
                None => Value::Undefined,
            };
            let ck = canonical_key(&key_value);
            buckets
                .entry(ck.clone())
                .or_insert_with(|| {
                    order.push(ck.clone());
                    (key_value, Vec::new())
                })
                .1
                .push(doc);
        }

        let mut out = Vec::with_capacity(order.len());
        for ck in order {
            let (key_value, docs) = buckets.remove(&ck).unwrap();
            let mut result = Object::new();
            if !key_value.is_undefined() {
                result.insert(id_key.to_string(), key_value);
            }
            for (field, acc_expr) in spec {
                if field == id_key {
                    continue;
                }
                let value = accumulate(&docs, field, acc_expr)?;
                if !value.is_undefined() {
                    result.insert(field.clone(), value);
                }
            }
            out.push(Value::Object(result));
        }
        Ok(out)
    }

    /// `$sort` applies its keys in reverse declaration order, each pass
    /// stable: documents are grouped by the resolved sort key, the group
    /// keys are ordered, and a `-1` direction reverses the key sequence.
    pub(crate) fn sort_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let sort_keys = match operand {
            Value::Object(map) if !map.is_empty() => map,
            _ => return Ok(coll),
        };
        let mut coll = coll;
        for (key, direction) in sort_keys.iter().rev() {
            let mut order: Vec<String> = Vec::new();
            let mut groups: HashMap<String, (Value, Vec<Value>)> = HashMap::new();
            for doc in coll.drain(..) {
                let sort_value = path::resolve(&doc, key);
                let ck = canonical_key(&sort_value);
                groups
                    .entry(ck.clone())
                    .or_insert_with(|| {
                        order.push(ck.clone());
                        (sort_value, Vec::new())
                    })
                    .1
                    .push(doc);
            }
            order.sort_by(|a, b| compare_values(&groups[a].0, &groups[b].0));
            if direction.as_i64() == Some(-1) {
                order.reverse();
            }
            for ck in order {
                coll.extend(groups.remove(&ck).unwrap().1);
            }
        }
        Ok(coll)
    }

    pub(crate) fn unwind_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let selector = match operand {
            Value::String(s) if s.starts_with('$') => &s[1..],
            _ => {
                return Err(Error::InvalidOperand(
                    "$unwind expects a $-prefixed field path".to_string(),
                ));
            }
        };
        let mut out = Vec::new();
        for doc in &coll {
            let value = path::resolve(doc, selector);
            let Value::Array(items) = value else {
                return Err(Error::InvalidOperand(format!(
                    "$unwind target {selector} is not an array"
                )));
            };
            for item in items {
                let mut copy = doc.clone();
                path::set_value(&mut copy, selector, item);
                out.push(copy);
            }
        }
        Ok(out)
    }

    pub(crate) fn redact_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let parsed = Expr::parse(operand)?;
        let mut out = Vec::new();
        for doc in &coll {
            let kept = self.redact(doc, &parsed)?;
            if !kept.is_undefined() {
                out.push(kept);
            }
        }
        Ok(out)
    }

    fn redact(&self, doc: &Value, expr: &Expr) -> Result<Value> {
        let verdict = expr::compute(&EvalCtx::new(doc), doc, expr)?;
        match RedactAction::from_value(verdict) {
            RedactAction::Keep => Ok(doc.clone()),
            RedactAction::Prune => Ok(Value::Undefined),
            RedactAction::Value(v) => Ok(v),
            RedactAction::Descend => {
                if !expr.is_operator("$cond") {
                    return Ok(doc.clone());
                }
                let mut copy = doc.clone();
                if let Value::Object(map) = &mut copy {
                    let keys: Vec<String> = map.keys().cloned().collect();
                    for key in keys {
                        let child = map[key.as_str()].clone();
                        match child {
                            Value::Object(_) => {
                                let kept = self.redact(&child, expr)?;
                                if kept.is_undefined() {
                                    map.shift_remove(&key);
                                } else {
                                    map.insert(key, kept);
                                }
                            }
                            Value::Array(items) => {
                                let mut survivors = Vec::new();
                                for item in items {
                                    if matches!(item, Value::Object(_)) {
                                        let kept = self.redact(&item, expr)?;
                                        if !kept.is_undefined() {
                                            survivors.push(kept);
                                        }
                                    } else {
                                        survivors.push(item);
                                    }
                                }
                                map.insert(key, Value::Array(survivors));
                            }
                            _ => {}
                        }
                    }
                }
                Ok(copy)
            }
        }
    }

    pub(crate) fn replace_root_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let spec = match operand {
            Value::Object(map) => map,
            _ => {
                return Err(Error::InvalidOperand(
                    "$replaceRoot expects { newRoot: <expression> }".to_string(),
                ));
            }
        };
        let Some(new_root) = spec.get("newRoot") else {
            return Err(Error::InvalidOperand(
                "$replaceRoot requires newRoot".to_string(),
            ));
        };
        let parsed = Expr::parse(new_root)?;
        let mut out = Vec::with_capacity(coll.len());
        for doc in &coll {
            let root = expr::compute(&EvalCtx::new(doc), doc, &parsed)?;
            if !matches!(root, Value::Object(_)) {
                return Err(Error::InvalidOperand(format!(
                    "$replaceRoot expression must evaluate to an object, got {}",
                    root.type_name()
                )));
            }
            out.push(root);
        }
        Ok(out)
    }

    pub(crate) fn add_fields_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let fields = match operand {
            Value::Object(map) => map,
            _ => {
                return Err(Error::InvalidOperand(
                    "$addFields expects an object".to_string(),
                ));
            }
        };
        let mut parsed = Vec::with_capacity(fields.len());
        for (key, sub) in fields {
            parsed.push((key.as_str(), Expr::parse(sub)?));
        }
        let mut out = Vec::with_capacity(coll.len());
        for doc in coll {
            let mut copy = doc.clone();
            for (key, e) in &parsed {
                let value = expr::compute(&EvalCtx::new(&doc), &doc, e)?;
                if !value.is_undefined() {
                    path::set_value(&mut copy, key, value);
                }
            }
            out.push(copy);
        }
        Ok(out)
    }

    /// `$sortByCount` desugars to a `$group` on the expression with a
    /// `$sum: 1` count followed by a descending `$sort` on the count.
    pub(crate) fn sort_by_count_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let mut count = Object::new();
        count.insert("$sum".to_string(), Value::Integer(1));
        let mut group = Object::new();
        group.insert(self.settings.key.clone(), operand.clone());
        group.insert("count".to_string(), Value::Object(count));

        let mut sort = Object::new();
        sort.insert("count".to_string(), Value::Integer(-1));

        let grouped = self.group_stage(coll, &Value::Object(group))?;
        self.sort_stage(grouped, &Value::Object(sort))
    }

    /// `$sample` draws `size` documents uniformly, with replacement.
    pub(crate) fn sample_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let size = operand
            .as_object()
            .and_then(|m| m.get("size"))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                Error::InvalidOperand("$sample expects { size: <number> }".to_string())
            })?;
        if coll.is_empty() {
            return Ok(Vec::new());
        }
        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity(size.max(0) as usize);
        for _ in 0..size.max(0) {
            out.push(coll[rng.gen_range(0..coll.len())].clone());
        }
        Ok(out)
    }

    pub(crate) fn count_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let name = match operand {
            Value::String(s)
                if !s.is_empty() && !s.starts_with('$') && !s.contains('.') =>
            {
                s
            }
            _ => {
                return Err(Error::InvalidOperand(
                    "$count expects a non-empty field name without '$' or '.'".to_string(),
                ));
            }
        };
        let mut result = Object::new();
        result.insert(name.clone(), Value::Integer(coll.len() as i64));
        Ok(vec![Value::Object(result)])
    }

    pub(crate) fn limit_stage(&self, mut coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let n = operand.as_i64().filter(|n| *n >= 0).ok_or_else(|| {
            Error::InvalidOperand("$limit expects a non-negative number".to_string())
        })?;
        coll.truncate(n as usize);
        Ok(coll)
    }

    pub(crate) fn skip_stage(&self, coll: Vec<Value>, operand: &Value) -> Result<Vec<Value>> {
        let n = operand.as_i64().filter(|n| *n >= 0).ok_or_else(|| {
            Error::InvalidOperand("$skip expects a non-negative number".to_string())
        })?;
        Ok(coll.into_iter().skip(n as usize).collect())
    }
}

/// Evaluate one `$group` output field over a partition. The expression is
/// either a direct accumulator application or an object nesting accumulator
/// applications one level down; accumulators may not mix with plain keys.
fn accumulate(docs: &[Value], field: &str, expr: &Value) -> Result<Value> {
    if let Some(op) = registry::group_op(field) {
        let parsed = Expr::parse(expr)?;
        let mut values = Vec::with_capacity(docs.len());
        for doc in docs {
            values.push(expr::compute(&EvalCtx::new(doc), doc, &parsed)?);
        }
        return op(&values);
    }
    match expr {
        Value::Object(map) => {
            let mut result = Object::new();
            for (key, sub) in map {
                if registry::is_group_op(key) {
                    if map.len() != 1 {
                        return Err(Error::InvalidOperand(format!(
                            "invalid accumulator expression for {field}: {key} must stand alone"
                        )));
                    }
                    return accumulate(docs, key, sub);
                }
                let value = accumulate(docs, key, sub)?;
                if !value.is_undefined() {
                    result.insert(key.clone(), value);
                }
            }
            Ok(Value::Object(result))
        }
        _ => Err(Error::InvalidOperand(format!(
            "invalid accumulator expression for field {field}"
        ))),
    }
}

/// What a `$redact` expression's result means.
enum RedactAction {
    Keep,
    Prune,
    Descend,
    Value(Value),
}

impl RedactAction {
    fn from_value(v: Value) -> RedactAction {
        match &v {
            Value::String(s) if s == "$$KEEP" => RedactAction::Keep,
            Value::String(s) if s == "$$PRUNE" => RedactAction::Prune,
            Value::String(s) if s == "$$DESCEND" => RedactAction::Descend,
            _ => RedactAction::Value(v),
        }
    }
}

/// True when a `$slice` operand has the all-numeric shape of the projection
/// form rather than the aggregation form.
fn numeric_shape(operand: &Value) -> bool {
    match operand {
        Value::Integer(_) | Value::Float(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_number),
        _ => false,
    }
}

/// The projection operators usable inside `$project` and query projections.
pub(crate) mod projection {
    use super::*;
    use crate::util;

    /// `$elemMatch` keeps the first array element matching the criteria, or
    /// drops the field entirely.
    pub(crate) fn elem_match(doc: &Value, selector: &str, operand: &Value) -> Result<Value> {
        let resolved = path::resolve(doc, selector);
        let Value::Array(items) = resolved else {
            return Ok(Value::Undefined);
        };
        let query = Query::new(operand.clone())?;
        for item in items {
            if query.test(&item)? {
                return Ok(Value::Array(vec![item]));
            }
        }
        Ok(Value::Undefined)
    }

    /// Projection-form `$slice`: a count or a `[skip, limit]` pair.
    pub(crate) fn slice(doc: &Value, selector: &str, operand: &Value) -> Result<Value> {
        let resolved = path::resolve(doc, selector);
        let Value::Array(items) = resolved else {
            return Ok(Value::Undefined);
        };
        match operand {
            Value::Array(args) if args.len() == 2 => {
                match (args[0].as_i64(), args[1].as_i64()) {
                    (Some(skip), Some(limit)) => {
                        Ok(Value::Array(util::slice(&items, skip, Some(limit))))
                    }
                    _ => Err(Error::InvalidOperand(
                        "$slice positions must be numbers".to_string(),
                    )),
                }
            }
            other => match other.as_i64() {
                Some(n) => Ok(Value::Array(util::slice(&items, n, None))),
                None => Err(Error::InvalidOperand(
                    "$slice expects a count or [skip, limit]".to_string(),
                )),
            },
        }
    }

    fn std_dev(doc: &Value, operand: &Value, sampled: bool) -> Result<Value> {
        let value = expr::compute_value(doc, operand)?;
        let nums: Vec<f64> = match value {
            Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
            other => other.as_f64().into_iter().collect(),
        };
        Ok(match util::stddev(&nums, sampled) {
            Some(sd) => Value::Float(sd),
            None => Value::Null,
        })
    }

    pub(crate) fn std_dev_pop(doc: &Value, _selector: &str, operand: &Value) -> Result<Value> {
        std_dev(doc, operand, false)
    }

    pub(crate) fn std_dev_samp(doc: &Value, _selector: &str, operand: &Value) -> Result<Value> {
        std_dev(doc, operand, true)
    }
}
