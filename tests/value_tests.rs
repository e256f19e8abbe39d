use chrono::{TimeZone, Utc};
use cumin::util::{canonical_key, flatten, intersection, stddev, union};
use cumin::{compare_values, hashcode, unique, Value};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashSet;

fn doc(v: serde_json::Value) -> Value {
    Value::from(v)
}

// ========================================================================
// Equality
// ========================================================================

#[test]
fn test_numeric_equality_crosses_integer_float() {
    assert_eq!(Value::Integer(1), Value::Float(1.0));
    assert_ne!(Value::Integer(1), Value::Float(1.5));
}

#[test]
fn test_nan_equals_nan() {
    assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
}

#[test]
fn test_null_is_not_undefined() {
    assert_ne!(Value::Null, Value::Undefined);
    assert_eq!(Value::Undefined, Value::Undefined);
}

#[test]
fn test_object_equality_ignores_key_order() {
    let a = doc(json!({"x": 1, "y": 2}));
    let b = doc(json!({"y": 2, "x": 1}));
    assert_eq!(a, b);
}

#[test]
fn test_array_equality_is_elementwise() {
    assert_eq!(doc(json!([1, "a", null])), doc(json!([1, "a", null])));
    assert_ne!(doc(json!([1, 2])), doc(json!([2, 1])));
}

#[test]
fn test_date_equality_by_instant() {
    let d = Utc.with_ymd_and_hms(2017, 3, 1, 12, 0, 0).unwrap();
    assert_eq!(Value::date(d), Value::date(d));
}

#[test]
fn test_regex_equality_by_pattern() {
    assert_eq!(
        Value::regex("^ab+$").unwrap(),
        Value::regex("^ab+$").unwrap()
    );
    assert_ne!(Value::regex("a").unwrap(), Value::regex("b").unwrap());
}

#[test]
fn test_clone_round_trip() {
    let values = vec![
        doc(json!({"a": [1, 2.5, "x", null, {"b": [true, false]}]})),
        Value::Float(f64::NAN),
        Value::date(Utc.with_ymd_and_hms(2001, 7, 8, 9, 10, 11).unwrap()),
        Value::regex("x+").unwrap(),
        Value::Undefined,
    ];
    for v in values {
        assert_eq!(v.clone(), v);
    }
}

// ========================================================================
// Truthiness & type names
// ========================================================================

#[test]
fn test_truthiness() {
    assert!(!Value::Null.is_truthy());
    assert!(!Value::Undefined.is_truthy());
    assert!(!Value::Integer(0).is_truthy());
    assert!(!Value::Float(f64::NAN).is_truthy());
    assert!(!Value::string("").is_truthy());
    assert!(Value::string("x").is_truthy());
    assert!(Value::Integer(-1).is_truthy());
    // arrays and objects are always truthy, even empty
    assert!(doc(json!([])).is_truthy());
    assert!(doc(json!({})).is_truthy());
}

#[test]
fn test_type_names() {
    assert_eq!(Value::Integer(1).type_name(), "number");
    assert_eq!(Value::Float(1.5).type_name(), "number");
    assert_eq!(doc(json!([])).type_name(), "array");
    assert_eq!(doc(json!({})).type_name(), "object");
    assert_eq!(Value::Null.type_name(), "null");
    assert_eq!(Value::Undefined.type_name(), "undefined");
    assert_eq!(Value::regex("a").unwrap().type_name(), "regexp");
}

// ========================================================================
// Canonical identity & hashing
// ========================================================================

#[test]
fn test_canonical_key_ignores_object_key_order() {
    let a = doc(json!({"x": 1, "y": [2, 3]}));
    let b = doc(json!({"y": [2, 3], "x": 1}));
    assert_eq!(canonical_key(&a), canonical_key(&b));
}

#[test]
fn test_canonical_key_aligns_with_numeric_equality() {
    assert_eq!(
        canonical_key(&Value::Integer(2)),
        canonical_key(&Value::Float(2.0))
    );
}

#[test]
fn test_canonical_key_distinguishes_null_and_undefined() {
    assert_ne!(canonical_key(&Value::Null), canonical_key(&Value::Undefined));
}

#[test]
fn test_hashcode_is_stable() {
    let v = doc(json!({"a": [1, "b"]}));
    assert_eq!(hashcode(&v), hashcode(&v.clone()));
}

// ========================================================================
// Set operations
// ========================================================================

#[test]
fn test_unique_counts_distinct_values() {
    let xs = vec![
        doc(json!(1)),
        doc(json!(1.0)),
        doc(json!("1")),
        doc(json!({"a": 1})),
        doc(json!({"a": 1})),
        doc(json!(2)),
    ];
    let distinct: HashSet<String> = xs.iter().map(canonical_key).collect();
    assert_eq!(unique(&xs).len(), distinct.len());
    assert_eq!(unique(&xs), vec![doc(json!(1)), doc(json!("1")), doc(json!({"a": 1})), doc(json!(2))]);
}

#[test]
fn test_intersection_preserves_left_order() {
    let a = vec![doc(json!(3)), doc(json!(1)), doc(json!(2))];
    let b = vec![doc(json!(2)), doc(json!(3))];
    assert_eq!(intersection(&a, &b), vec![doc(json!(3)), doc(json!(2))]);
}

#[test]
fn test_union_dedupes() {
    let a = vec![doc(json!(1)), doc(json!(2))];
    let b = vec![doc(json!(2)), doc(json!(3))];
    assert_eq!(
        union(&a, &b),
        vec![doc(json!(1)), doc(json!(2)), doc(json!(3))]
    );
}

#[test]
fn test_flatten_depths() {
    let xs = vec![doc(json!([1, [2, [3, [4]]]]))];
    let xs = match &xs[0] {
        Value::Array(items) => items.clone(),
        _ => unreachable!(),
    };
    assert_eq!(flatten(&xs, 1), vec![doc(json!(1)), doc(json!(2)), doc(json!([3, [4]]))]);
    assert_eq!(
        flatten(&xs, -1),
        vec![doc(json!(1)), doc(json!(2)), doc(json!(3)), doc(json!(4))]
    );
}

// ========================================================================
// Statistics
// ========================================================================

#[test]
fn test_stddev_population() {
    let sd = stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], false).unwrap();
    assert!((sd - 2.0).abs() < 1e-9);
}

#[test]
fn test_stddev_sample_divides_variance_by_n_minus_1() {
    let sd = stddev(&[1.0, 2.0, 3.0, 4.0], true).unwrap();
    // mean 2.5, squared deviations sum 5.0, variance 5/3
    assert!((sd - (5.0f64 / 3.0).sqrt()).abs() < 1e-9);
}

#[test]
fn test_stddev_sample_needs_two_points() {
    assert_eq!(stddev(&[1.0], true), None);
    assert_eq!(stddev(&[], false), None);
}

// ========================================================================
// Ordering
// ========================================================================

#[test]
fn test_compare_numbers_and_strings() {
    assert_eq!(
        compare_values(&Value::Integer(1), &Value::Float(1.5)),
        Ordering::Less
    );
    assert_eq!(
        compare_values(&Value::string("a"), &Value::string("b")),
        Ordering::Less
    );
}

#[test]
fn test_compare_ranks_types() {
    // null < numbers < strings
    assert_eq!(
        compare_values(&Value::Null, &Value::Integer(0)),
        Ordering::Less
    );
    assert_eq!(
        compare_values(&Value::Integer(99), &Value::string("a")),
        Ordering::Less
    );
}

// ========================================================================
// serde_json interop
// ========================================================================

#[test]
fn test_json_round_trip() {
    let original = json!({"a": [1, 2.5, "x", null, {"b": true}], "c": "d"});
    let value = Value::from(original.clone());
    let back: serde_json::Value = value.into();
    assert_eq!(back, original);
}
