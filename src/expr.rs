//! The expression tree and its evaluator.
//!
//! An expression arrives as a plain document and is parsed once into a
//! tagged [`Expr`] before evaluation: a literal, a `$`-prefixed field path,
//! a `$$`-prefixed variable, an operator application (an object whose single
//! key names a registered aggregate or group operator), a record of
//! sub-expressions, or an element-wise array.
//!
//! Variable bindings (`$map`/`$let`/`$filter`/`$reduce`, plus the system
//! variables `$$ROOT` and `$$CURRENT`) live in an explicit environment on
//! the evaluation context; expressions never write onto the documents they
//! evaluate.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ops;
use crate::path;
use crate::value::{Object, Value};

/// A parsed expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A value returned as-is (cloned) on evaluation
    Literal(Value),

    /// Field path reference, with the leading `$` stripped
    ///
    /// # Example
    /// `"$item.price"` → `Path("item.price")`
    Path(String),

    /// Variable reference, with the leading `$$` stripped. The name may
    /// carry a dotted suffix that is resolved against the bound value, as
    /// in `$$item.price`.
    Variable(String),

    /// Operator application: `{ "$add": [1, "$n"] }`
    Operator(String, Box<Expr>),

    /// Record of sub-expressions, evaluated entry-wise
    Record(Vec<(String, Expr)>),

    /// Array of sub-expressions, evaluated element-wise
    Array(Vec<Expr>),
}

impl Expr {
    /// Parse a document into an expression tree.
    ///
    /// An object with a `$`-prefixed key is an operator application: it must
    /// have exactly that one key, and the name must be registered in the
    /// aggregate or group operator table. `$literal` captures its operand
    /// without interpretation.
    pub fn parse(value: &Value) -> Result<Expr> {
        match value {
            Value::String(s) if s.starts_with("$$") => Ok(Expr::Variable(s[2..].to_string())),
            Value::String(s) if s.starts_with('$') => Ok(Expr::Path(s[1..].to_string())),
            Value::Array(items) => Ok(Expr::Array(
                items.iter().map(Expr::parse).collect::<Result<_>>()?,
            )),
            Value::Object(map) => {
                let dollar_keys: Vec<&String> =
                    map.keys().filter(|k| k.starts_with('$')).collect();
                if dollar_keys.is_empty() {
                    let entries = map
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), Expr::parse(v)?)))
                        .collect::<Result<_>>()?;
                    return Ok(Expr::Record(entries));
                }
                if map.len() != 1 {
                    return Err(Error::InvalidExpression(format!(
                        "operator application must have exactly one key, found {}",
                        map.len()
                    )));
                }
                let name = dollar_keys[0];
                if !ops::is_expression_op(name) {
                    return Err(Error::UnknownOperator(name.clone()));
                }
                let operand = &map[name.as_str()];
                let operand = if name == "$literal" {
                    Expr::Literal(operand.clone())
                } else {
                    Expr::parse(operand)?
                };
                Ok(Expr::Operator(name.clone(), Box::new(operand)))
            }
            other => Ok(Expr::Literal(other.clone())),
        }
    }

    /// True when the expression is an application of the given operator.
    pub fn is_operator(&self, name: &str) -> bool {
        matches!(self, Expr::Operator(op, _) if op == name)
    }
}

/// Evaluation context: the root document plus the variable environment.
#[derive(Debug, Clone)]
pub struct EvalCtx {
    /// The document at the root of evaluation (`$$ROOT`)
    root: Value,
    /// Variable bindings in scope
    vars: HashMap<String, Value>,
}

impl EvalCtx {
    /// Create a context rooted at `root`.
    pub fn new(root: &Value) -> EvalCtx {
        EvalCtx {
            root: root.clone(),
            vars: HashMap::new(),
        }
    }

    /// A child context with one extra binding in scope.
    pub fn with_var(&self, name: &str, value: Value) -> EvalCtx {
        let mut vars = self.vars.clone();
        vars.insert(name.to_string(), value);
        EvalCtx {
            root: self.root.clone(),
            vars,
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }
}

/// Evaluate an expression against `obj` (the current document, `$$CURRENT`).
///
/// Dispatch order: operator applications first (aggregate operators receive
/// their operand unevaluated; group operators receive the fully evaluated
/// operand, which must be an array), then variables, paths, element-wise
/// arrays, entry-wise records, and literals.
pub fn compute(ctx: &EvalCtx, obj: &Value, expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(selector) => Ok(path::resolve(obj, selector)),
        Expr::Variable(name) => resolve_variable(ctx, obj, name),
        Expr::Operator(name, operand) => {
            if let Some(op) = ops::aggregate_op(name) {
                return op(ctx, obj, operand);
            }
            if let Some(op) = ops::group_op(name) {
                let items = match compute(ctx, obj, operand)? {
                    Value::Array(items) => items,
                    other => {
                        return Err(Error::InvalidOperand(format!(
                            "{name} expects its operand to evaluate to an array, got {}",
                            other.type_name()
                        )));
                    }
                };
                return op(&items);
            }
            Err(Error::UnknownOperator(name.clone()))
        }
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(compute(ctx, obj, item)?);
            }
            Ok(Value::Array(out))
        }
        Expr::Record(entries) => {
            let mut out = Object::new();
            for (key, sub) in entries {
                let value = compute(ctx, obj, sub)?;
                if !value.is_undefined() {
                    out.insert(key.clone(), value);
                }
            }
            Ok(Value::Object(out))
        }
    }
}

/// Convenience entry point: parse and evaluate `expr` with `obj` as both the
/// root and current document.
pub fn compute_value(obj: &Value, expr: &Value) -> Result<Value> {
    let parsed = Expr::parse(expr)?;
    compute(&EvalCtx::new(obj), obj, &parsed)
}

/// Resolve a `$$name` reference. `ROOT` and `CURRENT` are bound implicitly;
/// the redact sentinels evaluate to themselves; anything else must be bound
/// in the environment. A dotted suffix resolves as a path against the bound
/// value.
fn resolve_variable(ctx: &EvalCtx, obj: &Value, name: &str) -> Result<Value> {
    let (head, rest) = match name.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (name, None),
    };
    let base = match head {
        "ROOT" => ctx.root.clone(),
        "CURRENT" => obj.clone(),
        "KEEP" | "PRUNE" | "DESCEND" if rest.is_none() => {
            return Ok(Value::String(format!("$${head}")));
        }
        _ => ctx
            .vars
            .get(head)
            .cloned()
            .ok_or_else(|| Error::UndefinedVariable(head.to_string()))?,
    };
    Ok(match rest {
        Some(rest) => path::resolve(&base, rest),
        None => base,
    })
}
