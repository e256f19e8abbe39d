use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;

/// An object is a mapping from string keys to values. Insertion order is
/// preserved because key declaration order is observable: `$sort` applies its
/// keys in declaration order and `$project` emits fields in the order they
/// were specified.
pub type Object = IndexMap<String, Value>;

/// A native predicate usable as the operand of `$where`.
pub type NativeFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A JSON-shaped document value as understood by the query engine.
///
/// This covers all JSON types with a distinction between integers and floats,
/// plus the extra kinds the MongoDB query language needs: a missing-field
/// marker, dates, regular expressions, and native predicates.
///
/// # Missing vs. null
///
/// `Undefined` is what a field path resolves to when any segment is absent.
/// It is a distinct kind: `Undefined != Null` under equality, `$exists`
/// distinguishes them, and `$project`/`$group` drop `Undefined` results
/// instead of emitting them.
///
/// # Examples
///
/// ```
/// use cumin::Value;
///
/// let n = Value::Integer(42);
/// assert_eq!(n, Value::Float(42.0)); // numeric equality crosses the split
///
/// let doc = Value::from(serde_json::json!({"name": "basil", "qty": 2}));
/// assert!(matches!(doc, Value::Object(_)));
/// ```
#[derive(Clone)]
pub enum Value {
    /// JSON null
    Null,

    /// A missing field (the result of resolving a nonexistent path)
    Undefined,

    /// JSON boolean
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// UTC instant
    DateTime(DateTime<Utc>),

    /// Compiled regular expression
    Regex(Regex),

    /// Array of values
    Array(Vec<Value>),

    /// Object with string keys, in insertion order
    Object(Object),

    /// Native predicate (only meaningful as a `$where` operand)
    Function(NativeFn),
}

impl Value {
    /// Build a string value.
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    /// Build a date value.
    pub fn date(d: DateTime<Utc>) -> Value {
        Value::DateTime(d)
    }

    /// Build a regular-expression value from a pattern.
    pub fn regex(pattern: &str) -> Result<Value, regex::Error> {
        Ok(Value::Regex(Regex::new(pattern)?))
    }

    /// Wrap a native predicate for use with `$where`.
    pub fn function(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Value {
        Value::Function(Arc::new(f))
    }

    /// The coarse type tag: one of `array`, `object`, `string`, `number`,
    /// `boolean`, `date`, `regexp`, `null`, `undefined`, `function`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::DateTime(_) => "date",
            Value::Regex(_) => "regexp",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Check if the value is truthy, with JavaScript coercion rules: `false`,
    /// zero, NaN, the empty string, null, and undefined are falsy; arrays and
    /// objects are always truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Undefined => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// True for both `Null` and `Undefined`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Get as float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer (floats are rounded)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) => Some(n.round() as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality: NaN equals NaN, integers and floats compare
    /// numerically, dates compare by instant, regexes by pattern string,
    /// arrays element-wise, objects by key set regardless of order.
    fn eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Undefined, Undefined) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Regex(a), Regex(b)) => a.as_str() == b.as_str(),
            (Array(a), Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y),
            (Object(a), Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Function(a), Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Undefined => write!(f, "Undefined"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Float(n) => write!(f, "Float({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::DateTime(d) => write!(f, "DateTime({})", d.to_rfc3339()),
            Value::Regex(r) => write!(f, "Regex(/{}/)", r.as_str()),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Function(_) => write!(f, "Function(<native>)"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Value {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = Object::new();
                for (k, v) in map {
                    out.insert(k, Value::from(v));
                }
                Value::Object(out)
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    /// Convert back to plain JSON. `Undefined` maps to null; dates render as
    /// RFC 3339 strings, regexes as their pattern, functions as null.
    fn from(v: Value) -> serde_json::Value {
        match v {
            Value::Null | Value::Undefined | Value::Function(_) => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(b),
            Value::Integer(n) => serde_json::Value::from(n),
            Value::Float(n) => {
                serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::String(s) => serde_json::Value::String(s),
            Value::DateTime(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Regex(r) => serde_json::Value::String(r.as_str().to_string()),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    if !v.is_undefined() {
                        out.insert(k, serde_json::Value::from(v));
                    }
                }
                serde_json::Value::Object(out)
            }
        }
    }
}
