//! Deferred materialization of a query result.
//!
//! A [`Cursor`] accumulates `sort`, `skip`, and `limit` modifiers and only
//! filters and reshapes the collection when a consuming method runs. No
//! matter the order the modifiers were applied in, materialization composes
//! an internal pipeline in the fixed order `$sort`, `$skip`, `$limit`,
//! `$project`.

use crate::aggregator::Aggregator;
use crate::error::Result;
use crate::expr;
use crate::ops::accumulators;
use crate::query::Query;
use crate::value::{Object, Value};

pub struct Cursor {
    query: Query,
    source: Vec<Value>,
    sort_keys: Option<Value>,
    skip_count: Option<i64>,
    limit_count: Option<i64>,
    result: Option<Vec<Value>>,
    position: usize,
}

impl Cursor {
    pub(crate) fn new(query: Query, collection: &[Value]) -> Cursor {
        Cursor {
            query,
            source: collection.to_vec(),
            sort_keys: None,
            skip_count: None,
            limit_count: None,
            result: None,
            position: 0,
        }
    }

    /// Sort the results by the given key specification.
    pub fn sort(mut self, keys: Value) -> Cursor {
        self.sort_keys = Some(keys);
        self.result = None;
        self
    }

    /// Skip the first `n` results.
    pub fn skip(mut self, n: i64) -> Cursor {
        self.skip_count = Some(n);
        self.result = None;
        self
    }

    /// Keep at most `n` results.
    pub fn limit(mut self, n: i64) -> Cursor {
        self.limit_count = Some(n);
        self.result = None;
        self
    }

    fn fetch(&mut self) -> Result<&[Value]> {
        if self.result.is_none() {
            let mut matched = Vec::new();
            for doc in &self.source {
                if self.query.test(doc)? {
                    matched.push(doc.clone());
                }
            }
            let mut pipeline = Vec::new();
            let mut stage = |name: &str, operand: Value| {
                let mut map = Object::new();
                map.insert(name.to_string(), operand);
                pipeline.push(Value::Object(map));
            };
            if let Some(keys) = &self.sort_keys {
                stage("$sort", keys.clone());
            }
            if let Some(n) = self.skip_count {
                stage("$skip", Value::Integer(n));
            }
            if let Some(n) = self.limit_count {
                stage("$limit", Value::Integer(n));
            }
            if let Some(projection) = self.query.projection() {
                stage("$project", projection.clone());
            }
            let result = if pipeline.is_empty() {
                matched
            } else {
                Aggregator::with_settings(pipeline, self.query.settings().clone()).run(&matched)?
            };
            self.result = Some(result);
        }
        Ok(self.result.as_deref().unwrap())
    }

    /// All matching documents.
    pub fn all(&mut self) -> Result<Vec<Value>> {
        Ok(self.fetch()?.to_vec())
    }

    /// The number of matching documents.
    pub fn count(&mut self) -> Result<usize> {
        Ok(self.fetch()?.len())
    }

    pub fn first(&mut self) -> Result<Option<Value>> {
        Ok(self.fetch()?.first().cloned())
    }

    pub fn last(&mut self) -> Result<Option<Value>> {
        Ok(self.fetch()?.last().cloned())
    }

    /// Whether iteration has more documents to yield.
    pub fn has_next(&mut self) -> Result<bool> {
        Ok(self.position < self.fetch()?.len())
    }

    /// The next document, advancing the iteration position.
    pub fn next(&mut self) -> Result<Option<Value>> {
        let position = self.position;
        let docs = self.fetch()?;
        let doc = docs.get(position).cloned();
        if doc.is_some() {
            self.position += 1;
        }
        Ok(doc)
    }

    /// Apply `f` to every matching document and collect the results.
    pub fn map<T>(&mut self, f: impl FnMut(&Value) -> T) -> Result<Vec<T>> {
        Ok(self.fetch()?.iter().map(f).collect())
    }

    /// Call `f` on every matching document.
    pub fn for_each(&mut self, f: impl FnMut(&Value)) -> Result<()> {
        self.fetch()?.iter().for_each(f);
        Ok(())
    }

    /// The smallest value of `expr` across the matching documents.
    pub fn min(&mut self, expr: &Value) -> Result<Value> {
        let values = self.values_of(expr)?;
        accumulators::min(&values)
    }

    /// The largest value of `expr` across the matching documents.
    pub fn max(&mut self, expr: &Value) -> Result<Value> {
        let values = self.values_of(expr)?;
        accumulators::max(&values)
    }

    fn values_of(&mut self, e: &Value) -> Result<Vec<Value>> {
        let docs = self.fetch()?.to_vec();
        let mut out = Vec::with_capacity(docs.len());
        for doc in &docs {
            out.push(expr::compute_value(doc, e)?);
        }
        Ok(out)
    }
}
