use chrono::{TimeZone, Utc};
use cumin::{compute_value, Error, Object, Value};
use serde_json::json;

fn doc(v: serde_json::Value) -> Value {
    Value::from(v)
}

fn eval(d: serde_json::Value, e: serde_json::Value) -> Value {
    compute_value(&doc(d), &doc(e)).unwrap()
}

fn eval_err(d: serde_json::Value, e: serde_json::Value) -> Error {
    compute_value(&doc(d), &doc(e)).unwrap_err()
}

fn op_expr(name: &str, operand: Value) -> Value {
    let mut map = Object::new();
    map.insert(name.to_string(), operand);
    Value::Object(map)
}

// ========================================================================
// Dispatch & structure
// ========================================================================

#[test]
fn test_path_and_variables() {
    let d = json!({"a": {"b": 7}});
    assert_eq!(eval(d.clone(), json!("$a.b")), Value::Integer(7));
    assert_eq!(eval(d.clone(), json!("$$ROOT")), doc(d.clone()));
    assert_eq!(eval(d.clone(), json!("$$CURRENT.a.b")), Value::Integer(7));
    assert_eq!(eval(d, json!("$missing")), Value::Undefined);
}

#[test]
fn test_record_and_array_expressions() {
    let d = json!({"x": 2, "y": 3});
    assert_eq!(
        eval(d.clone(), json!({"sum": {"$add": ["$x", "$y"]}, "keep": "$x"})),
        doc(json!({"sum": 5, "keep": 2}))
    );
    assert_eq!(eval(d, json!(["$x", "$y", 9])), doc(json!([2, 3, 9])));
}

#[test]
fn test_operator_application_must_have_single_key() {
    let err = eval_err(json!({}), json!({"$add": [1, 2], "$subtract": [3, 1]}));
    assert!(matches!(err, Error::InvalidExpression(_)));
}

#[test]
fn test_unknown_operator_is_rejected() {
    let err = eval_err(json!({}), json!({"$frobnicate": 1}));
    assert!(matches!(err, Error::UnknownOperator(_)));
}

#[test]
fn test_undefined_variable_is_rejected() {
    let err = eval_err(json!({}), json!("$$nope"));
    assert!(matches!(err, Error::UndefinedVariable(_)));
}

#[test]
fn test_literal_is_not_interpreted() {
    assert_eq!(
        eval(json!({}), json!({"$literal": {"$add": [1, 2]}})),
        doc(json!({"$add": [1, 2]}))
    );
}

// ========================================================================
// Arithmetic
// ========================================================================

#[test]
fn test_add_multiply_preserve_integers() {
    assert_eq!(eval(json!({}), json!({"$add": [1, 2, 3]})), Value::Integer(6));
    assert_eq!(
        eval(json!({"p": 100}), json!({"$multiply": ["$p", 1.1]})),
        Value::Integer(110)
    );
    assert_eq!(
        eval(json!({}), json!({"$add": [1, 0.5]})),
        Value::Float(1.5)
    );
}

#[test]
fn test_arithmetic_soft_null() {
    assert_eq!(eval(json!({}), json!({"$add": [1, null]})), Value::Null);
    assert_eq!(eval(json!({}), json!({"$abs": "$missing"})), Value::Null);
    assert_eq!(
        eval(json!({}), json!({"$subtract": ["$missing", 3]})),
        Value::Null
    );
}

#[test]
fn test_arithmetic_rejects_non_numbers() {
    let err = eval_err(json!({}), json!({"$add": [1, "x"]}));
    assert!(matches!(err, Error::InvalidOperand(_)));
}

#[test]
fn test_divide() {
    assert_eq!(eval(json!({}), json!({"$divide": [6, 3]})), Value::Integer(2));
    assert_eq!(eval(json!({}), json!({"$divide": [7, 2]})), Value::Float(3.5));
}

#[test]
fn test_mod_subtract() {
    assert_eq!(eval(json!({}), json!({"$mod": [7, 3]})), Value::Integer(1));
    assert_eq!(
        eval(json!({}), json!({"$subtract": [10, 3]})),
        Value::Integer(7)
    );
}

#[test]
fn test_pow_rejects_zero_to_negative() {
    assert_eq!(eval(json!({}), json!({"$pow": [2, 10]})), Value::Integer(1024));
    let err = eval_err(json!({}), json!({"$pow": [0, -1]}));
    assert!(matches!(err, Error::InvalidOperand(_)));
}

#[test]
fn test_sqrt_accepts_zero_rejects_negative() {
    assert_eq!(eval(json!({}), json!({"$sqrt": 0})), Value::Integer(0));
    assert_eq!(eval(json!({}), json!({"$sqrt": 2.25})), Value::Float(1.5));
    let err = eval_err(json!({}), json!({"$sqrt": -1}));
    assert!(matches!(err, Error::InvalidOperand(_)));
}

#[test]
fn test_trunc_handles_any_real() {
    assert_eq!(eval(json!({}), json!({"$trunc": 7.8})), Value::Integer(7));
    assert_eq!(eval(json!({}), json!({"$trunc": -7.8})), Value::Integer(-7));
}

#[test]
fn test_floor_ceil() {
    assert_eq!(eval(json!({}), json!({"$floor": 7.8})), Value::Integer(7));
    assert_eq!(eval(json!({}), json!({"$ceil": 7.2})), Value::Integer(8));
}

#[test]
fn test_log_requires_two_numbers() {
    let v = eval(json!({}), json!({"$log": [8, 2]}));
    assert!((v.as_f64().unwrap() - 3.0).abs() < 1e-9);
    let err = eval_err(json!({}), json!({"$log": [8]}));
    assert!(matches!(err, Error::InvalidOperand(_)));
}

// ========================================================================
// Strings
// ========================================================================

#[test]
fn test_concat_nulls_out() {
    assert_eq!(
        eval(json!({}), json!({"$concat": ["a", "b", "c"]})),
        Value::string("abc")
    );
    assert_eq!(
        eval(json!({}), json!({"$concat": ["a", null, "c"]})),
        Value::Null
    );
}

#[test]
fn test_substr_negative_arguments() {
    let d = json!({"s": "hello world"});
    assert_eq!(
        eval(d.clone(), json!({"$substr": ["$s", 0, 5]})),
        Value::string("hello")
    );
    assert_eq!(
        eval(d.clone(), json!({"$substr": ["$s", -1, 3]})),
        Value::string("")
    );
    assert_eq!(
        eval(d, json!({"$substr": ["$s", 6, -1]})),
        Value::string("world")
    );
}

#[test]
fn test_case_operators() {
    assert_eq!(
        eval(json!({}), json!({"$toUpper": "abc"})),
        Value::string("ABC")
    );
    assert_eq!(
        eval(json!({}), json!({"$toLower": "ABC"})),
        Value::string("abc")
    );
    assert_eq!(
        eval(json!({}), json!({"$strcasecmp": ["Hello", "hello"]})),
        Value::Integer(0)
    );
    assert_eq!(
        eval(json!({}), json!({"$strcasecmp": ["abc", "abd"]})),
        Value::Integer(-1)
    );
}

#[test]
fn test_split() {
    assert_eq!(
        eval(json!({}), json!({"$split": ["a,b,c", ","]})),
        doc(json!(["a", "b", "c"]))
    );
    assert_eq!(
        eval(json!({}), json!({"$split": [null, ","]})),
        Value::Null
    );
}

#[test]
fn test_index_of_bytes() {
    assert_eq!(
        eval(json!({}), json!({"$indexOfBytes": ["cafeteria", "e"]})),
        Value::Integer(3)
    );
    assert_eq!(
        eval(json!({}), json!({"$indexOfBytes": ["cafeteria", "e", 4]})),
        Value::Integer(5)
    );
    // start beyond end yields -1
    assert_eq!(
        eval(json!({}), json!({"$indexOfBytes": ["abc", "b", 3, 1]})),
        Value::Integer(-1)
    );
    assert_eq!(
        eval(json!({}), json!({"$indexOfBytes": ["abc", "q"]})),
        Value::Integer(-1)
    );
    assert_eq!(
        eval(json!({}), json!({"$indexOfBytes": [null, "q"]})),
        Value::Null
    );
}

// ========================================================================
// Dates (all extraction in UTC)
// ========================================================================

#[test]
fn test_date_extraction() {
    let d = Value::date(Utc.with_ymd_and_hms(2017, 6, 18, 14, 30, 45).unwrap());
    let base = Value::Object(Object::new());
    assert_eq!(
        compute_value(&base, &op_expr("$year", d.clone())).unwrap(),
        Value::Integer(2017)
    );
    assert_eq!(
        compute_value(&base, &op_expr("$month", d.clone())).unwrap(),
        Value::Integer(6)
    );
    assert_eq!(
        compute_value(&base, &op_expr("$dayOfMonth", d.clone())).unwrap(),
        Value::Integer(18)
    );
    // 2017-06-18 is a Sunday
    assert_eq!(
        compute_value(&base, &op_expr("$dayOfWeek", d.clone())).unwrap(),
        Value::Integer(1)
    );
    assert_eq!(
        compute_value(&base, &op_expr("$hour", d.clone())).unwrap(),
        Value::Integer(14)
    );
    assert_eq!(
        compute_value(&base, &op_expr("$minute", d.clone())).unwrap(),
        Value::Integer(30)
    );
    assert_eq!(
        compute_value(&base, &op_expr("$second", d)).unwrap(),
        Value::Integer(45)
    );
}

#[test]
fn test_date_operator_on_non_date_is_undefined() {
    assert_eq!(eval(json!({}), json!({"$year": "2017"})), Value::Undefined);
}

#[test]
fn test_date_to_string() {
    let mut args = Object::new();
    args.insert("format".to_string(), Value::string("%Y-%m-%d"));
    args.insert(
        "date".to_string(),
        Value::date(Utc.with_ymd_and_hms(2014, 1, 9, 0, 0, 0).unwrap()),
    );
    let expr = op_expr("$dateToString", Value::Object(args));
    assert_eq!(
        compute_value(&Value::Object(Object::new()), &expr).unwrap(),
        Value::string("2014-01-09")
    );
}

#[test]
fn test_date_to_string_tokens() {
    let mut args = Object::new();
    args.insert("format".to_string(), Value::string("%H:%M:%S.%L (%j) %%"));
    args.insert(
        "date".to_string(),
        Value::date(Utc.with_ymd_and_hms(2014, 1, 9, 8, 5, 2).unwrap()),
    );
    let expr = op_expr("$dateToString", Value::Object(args));
    assert_eq!(
        compute_value(&Value::Object(Object::new()), &expr).unwrap(),
        Value::string("08:05:02.000 (009) %")
    );
}

// ========================================================================
// Arrays
// ========================================================================

#[test]
fn test_array_elem_at() {
    let d = json!({"a": [10, 20, 30]});
    assert_eq!(
        eval(d.clone(), json!({"$arrayElemAt": ["$a", 1]})),
        Value::Integer(20)
    );
    assert_eq!(
        eval(d.clone(), json!({"$arrayElemAt": ["$a", -1]})),
        Value::Integer(30)
    );
    assert_eq!(
        eval(d, json!({"$arrayElemAt": ["$a", 9]})),
        Value::Undefined
    );
}

#[test]
fn test_concat_arrays() {
    assert_eq!(
        eval(json!({}), json!({"$concatArrays": [[1, 2], [3]]})),
        doc(json!([1, 2, 3]))
    );
    assert_eq!(
        eval(json!({"x": null}), json!({"$concatArrays": [[1], "$x"]})),
        Value::Null
    );
}

#[test]
fn test_filter_binds_as_variable() {
    let d = json!({"items": [{"price": 5}, {"price": 50}, {"price": 500}]});
    assert_eq!(
        eval(
            d,
            json!({"$filter": {
                "input": "$items",
                "as": "item",
                "cond": {"$gte": ["$$item.price", 50]}
            }})
        ),
        doc(json!([{"price": 50}, {"price": 500}]))
    );
}

#[test]
fn test_map_identity_reproduces_input() {
    let d = json!({"a": [1, "x", null, [2], {"k": 3}]});
    assert_eq!(
        eval(
            d.clone(),
            json!({"$map": {"input": "$a", "as": "e", "in": "$$e"}})
        ),
        doc(json!([1, "x", null, [2], {"k": 3}]))
    );
}

#[test]
fn test_map_default_binding_is_this() {
    let d = json!({"a": [1, 2, 3]});
    assert_eq!(
        eval(d, json!({"$map": {"input": "$a", "in": {"$add": ["$$this", 1]}}})),
        doc(json!([2, 3, 4]))
    );
}

#[test]
fn test_reduce_exposes_value_and_this() {
    let d = json!({"a": [1, 2, 3, 4]});
    assert_eq!(
        eval(
            d,
            json!({"$reduce": {
                "input": "$a",
                "initialValue": 0,
                "in": {"$add": ["$$value", "$$this"]}
            }})
        ),
        Value::Integer(10)
    );
}

#[test]
fn test_range() {
    assert_eq!(
        eval(json!({}), json!({"$range": [0, 10, 3]})),
        doc(json!([0, 3, 6, 9]))
    );
    assert_eq!(
        eval(json!({}), json!({"$range": [5, 0, -2]})),
        doc(json!([5, 3, 1]))
    );
    let err = eval_err(json!({}), json!({"$range": [0, 5, 0]}));
    assert!(matches!(err, Error::InvalidOperand(_)));
}

#[test]
fn test_slice_argument_quirks() {
    let d = json!({"a": [1, 2, 3, 4, 5]});
    assert_eq!(
        eval(d.clone(), json!({"$slice": ["$a", 2]})),
        doc(json!([1, 2]))
    );
    assert_eq!(
        eval(d.clone(), json!({"$slice": ["$a", -2]})),
        doc(json!([4, 5]))
    );
    assert_eq!(
        eval(d.clone(), json!({"$slice": ["$a", 1, 2]})),
        doc(json!([2, 3]))
    );
    assert_eq!(
        eval(d, json!({"$slice": ["$a", -3, 2]})),
        doc(json!([3, 4]))
    );
}

#[test]
fn test_zip() {
    assert_eq!(
        eval(json!({}), json!({"$zip": {"inputs": [[1, 2], ["a", "b", "c"]]}})),
        doc(json!([[1, "a"], [2, "b"]]))
    );
    assert_eq!(
        eval(
            json!({}),
            json!({"$zip": {
                "inputs": [[1, 2], ["a"]],
                "useLongestLength": true,
                "defaults": [0, "z"]
            }})
        ),
        doc(json!([[1, "a"], [2, "z"]]))
    );
    let err = eval_err(
        json!({}),
        json!({"$zip": {"inputs": [[1]], "defaults": [0]}}),
    );
    assert!(matches!(err, Error::InvalidOperand(_)));
}

#[test]
fn test_is_array_size_reverse_index_of() {
    assert_eq!(
        eval(json!({"a": [1]}), json!({"$isArray": ["$a"]})),
        Value::Boolean(true)
    );
    assert_eq!(
        eval(json!({"a": 1}), json!({"$isArray": ["$a"]})),
        Value::Boolean(false)
    );
    assert_eq!(
        eval(json!({"a": [1, 2, 3]}), json!({"$size": "$a"})),
        Value::Integer(3)
    );
    assert_eq!(
        eval(json!({"a": [1, 2]}), json!({"$reverseArray": "$a"})),
        doc(json!([2, 1]))
    );
    assert_eq!(
        eval(json!({}), json!({"$indexOfArray": [["a", "b", "c"], "b"]})),
        Value::Integer(1)
    );
    assert_eq!(
        eval(json!({}), json!({"$indexOfArray": [["a"], "q"]})),
        Value::Integer(-1)
    );
}

// ========================================================================
// Sets
// ========================================================================

#[test]
fn test_set_operators() {
    assert_eq!(
        eval(json!({}), json!({"$setEquals": [[1, 2, 2], [2, 1]]})),
        Value::Boolean(true)
    );
    assert_eq!(
        eval(json!({}), json!({"$setIntersection": [[1, 2, 3], [3, 4, 2]]})),
        doc(json!([2, 3]))
    );
    assert_eq!(
        eval(json!({}), json!({"$setDifference": [[1, 2, 3], [2]]})),
        doc(json!([1, 3]))
    );
    assert_eq!(
        eval(json!({}), json!({"$setUnion": [[1, 2], [2, 3]]})),
        doc(json!([1, 2, 3]))
    );
    assert_eq!(
        eval(json!({}), json!({"$setIsSubset": [[1, 2], [1, 2, 3]]})),
        Value::Boolean(true)
    );
    assert_eq!(
        eval(json!({}), json!({"$allElementsTrue": [[1, "x", true]]})),
        Value::Boolean(true)
    );
    assert_eq!(
        eval(json!({}), json!({"$anyElementTrue": [[0, false, 1]]})),
        Value::Boolean(true)
    );
}

// ========================================================================
// Booleans & comparisons
// ========================================================================

#[test]
fn test_boolean_operators() {
    assert_eq!(
        eval(json!({}), json!({"$and": [1, "x", true]})),
        Value::Boolean(true)
    );
    assert_eq!(
        eval(json!({}), json!({"$or": [0, "", false]})),
        Value::Boolean(false)
    );
    assert_eq!(eval(json!({}), json!({"$not": [0]})), Value::Boolean(true));
}

#[test]
fn test_comparison_operators() {
    assert_eq!(eval(json!({}), json!({"$cmp": [5, 2]})), Value::Integer(1));
    assert_eq!(
        eval(json!({}), json!({"$eq": [1, 1.0]})),
        Value::Boolean(true)
    );
    assert_eq!(
        eval(json!({}), json!({"$lt": ["a", "b"]})),
        Value::Boolean(true)
    );
    assert_eq!(
        eval(json!({}), json!({"$gte": [3, 3]})),
        Value::Boolean(true)
    );
}

// ========================================================================
// Conditionals
// ========================================================================

#[test]
fn test_cond_both_forms() {
    assert_eq!(
        eval(json!({"q": 150}), json!({"$cond": [{"$gt": ["$q", 100]}, "big", "small"]})),
        Value::string("big")
    );
    assert_eq!(
        eval(
            json!({"q": 50}),
            json!({"$cond": {"if": {"$gt": ["$q", 100]}, "then": "big", "else": "small"}})
        ),
        Value::string("small")
    );
}

#[test]
fn test_if_null() {
    assert_eq!(
        eval(json!({}), json!({"$ifNull": ["$missing", "fallback"]})),
        Value::string("fallback")
    );
    assert_eq!(
        eval(json!({"a": 0}), json!({"$ifNull": ["$a", "fallback"]})),
        Value::Integer(0)
    );
    let err = eval_err(json!({}), json!({"$ifNull": ["$a"]}));
    assert!(matches!(err, Error::InvalidOperand(_)));
}

#[test]
fn test_switch() {
    let e = json!({"$switch": {
        "branches": [
            {"case": {"$gt": ["$n", 10]}, "then": "big"},
            {"case": {"$gt": ["$n", 5]}, "then": "medium"}
        ],
        "default": "small"
    }});
    assert_eq!(eval(json!({"n": 50}), e.clone()), Value::string("big"));
    assert_eq!(eval(json!({"n": 7}), e.clone()), Value::string("medium"));
    assert_eq!(eval(json!({"n": 1}), e), Value::string("small"));
}

// ========================================================================
// $let
// ========================================================================

#[test]
fn test_let_binds_in_order() {
    assert_eq!(
        eval(
            json!({"price": 10}),
            json!({"$let": {
                "vars": {"base": "$price", "total": {"$multiply": ["$$base", 3]}},
                "in": {"$add": ["$$total", 1]}
            }})
        ),
        Value::Integer(31)
    );
}
