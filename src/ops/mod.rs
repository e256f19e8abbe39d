//! Operator tables and the extension registry.
//!
//! Operators are grouped into five classes — query, projection, group,
//! pipeline, and aggregate — each with its own name→handler table. The
//! built-in tables are populated once; [`add_operators`] lets callers extend
//! a class at configuration time.

pub mod accumulators;
pub mod arithmetic;
pub mod array;
pub mod boolean;
pub mod comparison;
pub mod conditional;
pub mod date;
pub mod set;
pub mod string;
pub mod variable;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::aggregator::Aggregator;
use crate::error::{Error, Result};
use crate::expr::{EvalCtx, Expr};
use crate::query::{self, Query};
use crate::value::Value;

/// The class an operator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    /// Field predicates inside criteria (`$gt`, `$elemMatch`, ...)
    Query,
    /// Field reshaping inside `$project` (`$slice`, `$elemMatch`, ...)
    Projection,
    /// Accumulators over a partition (`$sum`, `$push`, ...)
    Group,
    /// Pipeline stages (`$match`, `$group`, ...)
    Pipeline,
    /// Scalar expression operators (`$add`, `$cond`, ...)
    Aggregate,
}

/// Query operator: `(document, selector, resolved value, operand) -> bool`.
pub type QueryOpFn = Arc<dyn Fn(&Value, &str, &Value, &Value) -> Result<bool> + Send + Sync>;

/// Projection operator: `(document, selector, operand) -> reshaped value`.
pub type ProjectionOpFn = Arc<dyn Fn(&Value, &str, &Value) -> Result<Value> + Send + Sync>;

/// Aggregate operator: receives its operand unevaluated.
pub type AggregateOpFn = Arc<dyn Fn(&EvalCtx, &Value, &Expr) -> Result<Value> + Send + Sync>;

/// Group operator: reduces the values pushed for a partition.
pub type GroupOpFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Pipeline stage: transforms one document batch into another.
pub type PipelineOpFn =
    Arc<dyn Fn(&Aggregator, Vec<Value>, &Value) -> Result<Vec<Value>> + Send + Sync>;

/// What a user-supplied query operator may produce: a direct verdict, or a
/// nested query the framework tests the document against.
pub enum QueryOpReturn {
    Bool(bool),
    Nested(Query),
}

/// A user-supplied operator, paired with the class it registers under.
#[derive(Clone)]
pub enum UserOperator {
    /// `(selector, resolved value, operand)`; the framework resolves the
    /// selector before the call and interprets the return value.
    Query(Arc<dyn Fn(&str, &Value, &Value) -> Result<QueryOpReturn> + Send + Sync>),
    Projection(ProjectionOpFn),
    Group(GroupOpFn),
    Pipeline(PipelineOpFn),
    Aggregate(AggregateOpFn),
}

struct OperatorRegistry {
    query: HashMap<String, QueryOpFn>,
    projection: HashMap<String, ProjectionOpFn>,
    group: HashMap<String, GroupOpFn>,
    pipeline: HashMap<String, PipelineOpFn>,
    aggregate: HashMap<String, AggregateOpFn>,
}

static REGISTRY: LazyLock<RwLock<OperatorRegistry>> =
    LazyLock::new(|| RwLock::new(OperatorRegistry::builtin()));

impl OperatorRegistry {
    fn builtin() -> OperatorRegistry {
        let mut r = OperatorRegistry {
            query: HashMap::new(),
            projection: HashMap::new(),
            group: HashMap::new(),
            pipeline: HashMap::new(),
            aggregate: HashMap::new(),
        };

        // Arithmetic
        r.agg("$abs", arithmetic::abs);
        r.agg("$add", arithmetic::add);
        r.agg("$ceil", arithmetic::ceil);
        r.agg("$divide", arithmetic::divide);
        r.agg("$exp", arithmetic::exp);
        r.agg("$floor", arithmetic::floor);
        r.agg("$ln", arithmetic::ln);
        r.agg("$log", arithmetic::log);
        r.agg("$log10", arithmetic::log10);
        r.agg("$mod", arithmetic::mod_op);
        r.agg("$multiply", arithmetic::multiply);
        r.agg("$pow", arithmetic::pow);
        r.agg("$sqrt", arithmetic::sqrt);
        r.agg("$subtract", arithmetic::subtract);
        r.agg("$trunc", arithmetic::trunc);

        // Strings
        r.agg("$concat", string::concat);
        r.agg("$indexOfBytes", string::index_of_bytes);
        r.agg("$split", string::split);
        r.agg("$strcasecmp", string::strcasecmp);
        r.agg("$substr", string::substr);
        r.agg("$toLower", string::to_lower);
        r.agg("$toUpper", string::to_upper);

        // Dates
        r.agg("$dayOfYear", date::day_of_year);
        r.agg("$dayOfMonth", date::day_of_month);
        r.agg("$dayOfWeek", date::day_of_week);
        r.agg("$year", date::year);
        r.agg("$month", date::month);
        r.agg("$week", date::week);
        r.agg("$hour", date::hour);
        r.agg("$minute", date::minute);
        r.agg("$second", date::second);
        r.agg("$millisecond", date::millisecond);
        r.agg("$dateToString", date::date_to_string);

        // Arrays
        r.agg("$arrayElemAt", array::array_elem_at);
        r.agg("$concatArrays", array::concat_arrays);
        r.agg("$filter", array::filter);
        r.agg("$indexOfArray", array::index_of_array);
        r.agg("$isArray", array::is_array);
        r.agg("$range", array::range);
        r.agg("$reverseArray", array::reverse_array);
        r.agg("$reduce", array::reduce);
        r.agg("$size", array::size);
        r.agg("$slice", array::slice);
        r.agg("$zip", array::zip);

        // Sets
        r.agg("$setEquals", set::set_equals);
        r.agg("$setIntersection", set::set_intersection);
        r.agg("$setDifference", set::set_difference);
        r.agg("$setUnion", set::set_union);
        r.agg("$setIsSubset", set::set_is_subset);
        r.agg("$allElementsTrue", set::all_elements_true);
        r.agg("$anyElementTrue", set::any_element_true);

        // Booleans
        r.agg("$and", boolean::and);
        r.agg("$or", boolean::or);
        r.agg("$not", boolean::not);

        // Comparisons
        r.agg("$cmp", comparison::cmp);
        r.agg("$eq", comparison::eq);
        r.agg("$ne", comparison::ne);
        r.agg("$gt", comparison::gt);
        r.agg("$gte", comparison::gte);
        r.agg("$lt", comparison::lt);
        r.agg("$lte", comparison::lte);

        // Conditionals
        r.agg("$cond", conditional::cond);
        r.agg("$ifNull", conditional::if_null);
        r.agg("$switch", conditional::switch);

        // Variables
        r.agg("$let", variable::let_op);
        r.agg("$map", variable::map);

        // Literal
        r.agg("$literal", literal);

        r.grp("$sum", accumulators::sum);
        r.grp("$avg", accumulators::avg);
        r.grp("$min", accumulators::min);
        r.grp("$max", accumulators::max);
        r.grp("$push", accumulators::push);
        r.grp("$addToSet", accumulators::add_to_set);
        r.grp("$first", accumulators::first);
        r.grp("$last", accumulators::last);
        r.grp("$stdDevPop", accumulators::std_dev_pop);
        r.grp("$stdDevSamp", accumulators::std_dev_samp);

        r.qry("$eq", query::ops::eq);
        r.qry("$ne", query::ops::ne);
        r.qry("$in", query::ops::in_op);
        r.qry("$nin", query::ops::nin);
        r.qry("$lt", query::ops::lt);
        r.qry("$lte", query::ops::lte);
        r.qry("$gt", query::ops::gt);
        r.qry("$gte", query::ops::gte);
        r.qry("$mod", query::ops::mod_op);
        r.qry("$regex", query::ops::regex_op);
        r.qry("$exists", query::ops::exists);
        r.qry("$all", query::ops::all);
        r.qry("$size", query::ops::size);
        r.qry("$elemMatch", query::ops::elem_match);
        r.qry("$type", query::ops::type_op);
        r.qry("$not", query::ops::not_op);

        r.prj("$elemMatch", crate::aggregator::projection::elem_match);
        r.prj("$slice", crate::aggregator::projection::slice);
        r.prj("$stdDevPop", crate::aggregator::projection::std_dev_pop);
        r.prj("$stdDevSamp", crate::aggregator::projection::std_dev_samp);

        r.pipe("$match", |agg, coll, operand| agg.match_stage(coll, operand));
        r.pipe("$project", |agg, coll, operand| agg.project_stage(coll, operand));
        r.pipe("$group", |agg, coll, operand| agg.group_stage(coll, operand));
        r.pipe("$sort", |agg, coll, operand| agg.sort_stage(coll, operand));
        r.pipe("$unwind", |agg, coll, operand| agg.unwind_stage(coll, operand));
        r.pipe("$redact", |agg, coll, operand| agg.redact_stage(coll, operand));
        r.pipe("$replaceRoot", |agg, coll, operand| agg.replace_root_stage(coll, operand));
        r.pipe("$addFields", |agg, coll, operand| agg.add_fields_stage(coll, operand));
        r.pipe("$sortByCount", |agg, coll, operand| agg.sort_by_count_stage(coll, operand));
        r.pipe("$sample", |agg, coll, operand| agg.sample_stage(coll, operand));
        r.pipe("$count", |agg, coll, operand| agg.count_stage(coll, operand));
        r.pipe("$limit", |agg, coll, operand| agg.limit_stage(coll, operand));
        r.pipe("$skip", |agg, coll, operand| agg.skip_stage(coll, operand));

        r
    }

    fn agg(&mut self, name: &str, f: fn(&EvalCtx, &Value, &Expr) -> Result<Value>) {
        self.aggregate.insert(name.to_string(), Arc::new(f));
    }

    fn grp(&mut self, name: &str, f: fn(&[Value]) -> Result<Value>) {
        self.group.insert(name.to_string(), Arc::new(f));
    }

    fn qry(&mut self, name: &str, f: fn(&Value, &str, &Value, &Value) -> Result<bool>) {
        self.query.insert(name.to_string(), Arc::new(f));
    }

    fn prj(&mut self, name: &str, f: fn(&Value, &str, &Value) -> Result<Value>) {
        self.projection.insert(name.to_string(), Arc::new(f));
    }

    fn pipe(&mut self, name: &str, f: fn(&Aggregator, Vec<Value>, &Value) -> Result<Vec<Value>>) {
        self.pipeline.insert(name.to_string(), Arc::new(f));
    }
}

/// `$literal` returns its operand without interpretation. The parser stores
/// the operand as a literal, so evaluation is a plain clone.
fn literal(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    crate::expr::compute(ctx, obj, expr)
}

pub(crate) fn aggregate_op(name: &str) -> Option<AggregateOpFn> {
    REGISTRY.read().unwrap().aggregate.get(name).cloned()
}

pub(crate) fn group_op(name: &str) -> Option<GroupOpFn> {
    REGISTRY.read().unwrap().group.get(name).cloned()
}

pub(crate) fn query_op(name: &str) -> Option<QueryOpFn> {
    REGISTRY.read().unwrap().query.get(name).cloned()
}

pub(crate) fn projection_op(name: &str) -> Option<ProjectionOpFn> {
    REGISTRY.read().unwrap().projection.get(name).cloned()
}

pub(crate) fn pipeline_op(name: &str) -> Option<PipelineOpFn> {
    REGISTRY.read().unwrap().pipeline.get(name).cloned()
}

pub(crate) fn is_expression_op(name: &str) -> bool {
    let r = REGISTRY.read().unwrap();
    r.aggregate.contains_key(name) || r.group.contains_key(name)
}

pub(crate) fn is_group_op(name: &str) -> bool {
    REGISTRY.read().unwrap().group.contains_key(name)
}

pub(crate) fn is_query_op(name: &str) -> bool {
    REGISTRY.read().unwrap().query.contains_key(name)
}

pub(crate) fn is_projection_op(name: &str) -> bool {
    REGISTRY.read().unwrap().projection.contains_key(name)
}

/// Register user-supplied operators under a class.
///
/// The factory returns `(name, operator)` pairs. Names must match `$\w+`
/// and must not collide with an operator already registered in the class;
/// each operator variant must match the class it is registered under.
///
/// # Examples
///
/// ```
/// use cumin::{add_operators, OperatorClass, QueryOpReturn, UserOperator, Value};
/// use std::sync::Arc;
///
/// add_operators(OperatorClass::Query, || {
///     vec![(
///         "$withinRange".to_string(),
///         UserOperator::Query(Arc::new(|_selector, resolved, operand| {
///             let bounds = operand.as_array().unwrap_or(&[]);
///             Ok(QueryOpReturn::Bool(
///                 bounds.len() == 2
///                     && cumin::compare_values(resolved, &bounds[0]).is_ge()
///                     && cumin::compare_values(resolved, &bounds[1]).is_le(),
///             ))
///         })),
///     )]
/// })
/// .unwrap();
/// ```
pub fn add_operators<F>(class: OperatorClass, factory: F) -> Result<()>
where
    F: FnOnce() -> Vec<(String, UserOperator)>,
{
    let ops = factory();
    let mut registry = REGISTRY.write().unwrap();
    for (name, op) in &ops {
        if !valid_op_name(name) {
            return Err(Error::Registration(format!(
                "operator name {name:?} must match $\\w+"
            )));
        }
        let variant_ok = matches!(
            (class, op),
            (OperatorClass::Query, UserOperator::Query(_))
                | (OperatorClass::Projection, UserOperator::Projection(_))
                | (OperatorClass::Group, UserOperator::Group(_))
                | (OperatorClass::Pipeline, UserOperator::Pipeline(_))
                | (OperatorClass::Aggregate, UserOperator::Aggregate(_))
        );
        if !variant_ok {
            return Err(Error::Registration(format!(
                "operator {name} does not match class {class:?}"
            )));
        }
        let taken = match class {
            OperatorClass::Query => registry.query.contains_key(name),
            OperatorClass::Projection => registry.projection.contains_key(name),
            OperatorClass::Group => registry.group.contains_key(name),
            OperatorClass::Pipeline => registry.pipeline.contains_key(name),
            OperatorClass::Aggregate => registry.aggregate.contains_key(name),
        };
        if taken {
            return Err(Error::Registration(format!("operator {name} already exists")));
        }
    }
    for (name, op) in ops {
        match (class, op) {
            (OperatorClass::Query, UserOperator::Query(f)) => {
                let wrapped: QueryOpFn = Arc::new(move |doc, selector, resolved, operand| {
                    match f(selector, resolved, operand)? {
                        QueryOpReturn::Bool(b) => Ok(b),
                        QueryOpReturn::Nested(q) => q.test(doc),
                    }
                });
                registry.query.insert(name, wrapped);
            }
            (OperatorClass::Projection, UserOperator::Projection(f)) => {
                registry.projection.insert(name, f);
            }
            (OperatorClass::Group, UserOperator::Group(f)) => {
                registry.group.insert(name, f);
            }
            (OperatorClass::Pipeline, UserOperator::Pipeline(f)) => {
                registry.pipeline.insert(name, f);
            }
            (OperatorClass::Aggregate, UserOperator::Aggregate(f)) => {
                registry.aggregate.insert(name, f);
            }
            (class, _) => {
                return Err(Error::Registration(format!(
                    "operator variant does not match class {class:?}"
                )));
            }
        }
    }
    Ok(())
}

fn valid_op_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('$')
        && name.len() > 1
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
