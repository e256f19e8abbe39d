//! MongoDB-style queries and aggregation pipelines over in-memory JSON
//! documents.
//!
//! ```
//! use cumin::{find, Value};
//! use serde_json::json;
//!
//! let docs: Vec<Value> = [json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]
//!     .map(Value::from)
//!     .to_vec();
//! let matched = find(&docs, Value::from(json!({"a": {"$gt": 1}})))
//!     .unwrap()
//!     .all()
//!     .unwrap();
//! assert_eq!(matched.len(), 2);
//! ```

pub mod aggregator;
pub mod cursor;
pub mod error;
pub mod expr;
pub mod ops;
pub mod path;
pub mod query;
pub mod util;
pub mod value;

pub use aggregator::Aggregator;
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use expr::{compute, compute_value, EvalCtx, Expr};
pub use ops::{add_operators, OperatorClass, QueryOpReturn, UserOperator};
pub use query::Query;
pub use util::{compare_values, hashcode, unique};
pub use value::{Object, Value};

/// Engine settings. `key` names the identity field used by `$group`,
/// `$project`, and cursor identity logic.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub key: String,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            key: "_id".to_string(),
        }
    }
}

/// Query a collection, returning a lazy [`Cursor`] over the matches.
pub fn find(collection: &[Value], criteria: Value) -> Result<Cursor> {
    Ok(Query::new(criteria)?.find(collection))
}

/// Query a collection with a projection applied on materialization.
pub fn find_with_projection(
    collection: &[Value],
    criteria: Value,
    projection: Value,
) -> Result<Cursor> {
    Ok(Query::new(criteria)?
        .with_projection(projection)
        .find(collection))
}

/// Return the documents the criteria does not match.
pub fn remove(collection: &[Value], criteria: Value) -> Result<Vec<Value>> {
    Query::new(criteria)?.remove(collection)
}

/// Run an aggregation pipeline over a collection.
pub fn aggregate(collection: &[Value], pipeline: &[Value]) -> Result<Vec<Value>> {
    Aggregator::new(pipeline.to_vec()).run(collection)
}
