use cumin::{find, remove, Error, Query, Value};
use serde_json::json;

fn doc(v: serde_json::Value) -> Value {
    Value::from(v)
}

fn docs(vs: Vec<serde_json::Value>) -> Vec<Value> {
    vs.into_iter().map(Value::from).collect()
}

fn query(criteria: serde_json::Value) -> Query {
    Query::new(doc(criteria)).unwrap()
}

fn matches(criteria: serde_json::Value, d: serde_json::Value) -> bool {
    query(criteria).test(&doc(d)).unwrap()
}

// ========================================================================
// Normalization & comparison operators
// ========================================================================

#[test]
fn test_scalar_criteria_normalizes_to_eq() {
    assert!(matches(json!({"a": 1}), json!({"a": 1})));
    assert!(!matches(json!({"a": 1}), json!({"a": 2})));
}

#[test]
fn test_operator_free_object_normalizes_to_eq() {
    assert!(matches(json!({"a": {"b": 1}}), json!({"a": {"b": 1}})));
    assert!(!matches(json!({"a": {"b": 1}}), json!({"a": {"b": 2}})));
}

#[test]
fn test_find_gt() {
    let collection = docs(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]);
    let result = find(&collection, doc(json!({"a": {"$gt": 1}})))
        .unwrap()
        .all()
        .unwrap();
    assert_eq!(result, docs(vec![json!({"a": 2}), json!({"a": 3})]));
}

#[test]
fn test_ordered_comparisons() {
    assert!(matches(json!({"a": {"$gte": 2}}), json!({"a": 2})));
    assert!(matches(json!({"a": {"$lt": 2}}), json!({"a": 1})));
    assert!(matches(json!({"a": {"$lte": 2}}), json!({"a": 2})));
    // strings only compare against strings
    assert!(!matches(json!({"a": {"$gt": 1}}), json!({"a": "x"})));
    assert!(matches(json!({"a": {"$gt": "a"}}), json!({"a": "b"})));
}

#[test]
fn test_array_traversal_match() {
    let collection = docs(vec![json!({"tags": ["x", "y"]}), json!({"tags": ["z"]})]);
    let count = find(&collection, doc(json!({"tags": "x"})))
        .unwrap()
        .count()
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_nested_path_with_array_broadcast() {
    let d = json!({"items": [{"qty": 5}, {"qty": 50}]});
    assert!(matches(json!({"items.qty": 50}), d.clone()));
    assert!(!matches(json!({"items.qty": 99}), d));
}

#[test]
fn test_ne_on_arrays() {
    assert!(!matches(json!({"tags": {"$ne": "x"}}), json!({"tags": ["x", "y"]})));
    assert!(matches(json!({"tags": {"$ne": "q"}}), json!({"tags": ["x", "y"]})));
}

// ========================================================================
// $in / $nin / $mod / $size / $all
// ========================================================================

#[test]
fn test_in_and_nin() {
    assert!(matches(json!({"a": {"$in": [1, 2]}}), json!({"a": 2})));
    assert!(matches(json!({"a": {"$in": [2]}}), json!({"a": [1, 2]})));
    assert!(!matches(json!({"a": {"$in": [5]}}), json!({"a": 2})));
    assert!(matches(json!({"a": {"$nin": [5]}}), json!({"a": 2})));
    // a missing field is not in any list
    assert!(matches(json!({"b": {"$nin": [1]}}), json!({"a": 2})));
    let q = Query::new(doc(json!({"a": {"$in": 5}}))).unwrap();
    assert!(matches!(
        q.test(&doc(json!({"a": 1}))),
        Err(Error::InvalidOperand(_))
    ));
}

#[test]
fn test_mod() {
    assert!(matches(json!({"a": {"$mod": [4, 0]}}), json!({"a": 8})));
    assert!(!matches(json!({"a": {"$mod": [4, 1]}}), json!({"a": 8})));
    assert!(matches!(
        query(json!({"a": {"$mod": [4]}})).test(&doc(json!({"a": 8}))),
        Err(Error::InvalidOperand(_))
    ));
}

#[test]
fn test_size() {
    assert!(matches(json!({"a": {"$size": 2}}), json!({"a": [1, 2]})));
    assert!(!matches(json!({"a": {"$size": 2}}), json!({"a": [1]})));
    assert!(!matches(json!({"a": {"$size": 2}}), json!({"a": "xy"})));
}

#[test]
fn test_all() {
    assert!(matches(
        json!({"tags": {"$all": ["x", "y"]}}),
        json!({"tags": ["y", "x", "z"]})
    ));
    assert!(!matches(
        json!({"tags": {"$all": ["x", "q"]}}),
        json!({"tags": ["x", "y"]})
    ));
    assert!(!matches(json!({"tags": {"$all": []}}), json!({"tags": ["x"]})));
}

#[test]
fn test_all_with_elem_match() {
    let d = json!({"qty": [{"size": "M", "num": 50}, {"size": "S", "num": 100}]});
    assert!(matches(
        json!({"qty": {"$all": [
            {"$elemMatch": {"size": "M", "num": {"$gt": 40}}},
            {"$elemMatch": {"num": 100}}
        ]}}),
        d.clone()
    ));
    assert!(!matches(
        json!({"qty": {"$all": [{"$elemMatch": {"num": {"$gt": 500}}}]}}),
        d
    ));
}

// ========================================================================
// $exists / $type / $elemMatch
// ========================================================================

#[test]
fn test_exists_distinguishes_null_from_missing() {
    assert!(matches(json!({"a": {"$exists": true}}), json!({"a": null})));
    assert!(!matches(json!({"a": {"$exists": true}}), json!({"b": 1})));
    assert!(matches(json!({"a": {"$exists": false}}), json!({"b": 1})));
}

#[test]
fn test_null_does_not_match_missing() {
    assert!(matches(json!({"a": null}), json!({"a": null})));
    assert!(!matches(json!({"a": null}), json!({"b": 1})));
}

#[test]
fn test_type_codes() {
    assert!(matches(json!({"a": {"$type": 2}}), json!({"a": "x"})));
    assert!(matches(json!({"a": {"$type": 1}}), json!({"a": 1.5})));
    assert!(matches(json!({"a": {"$type": 16}}), json!({"a": 5})));
    assert!(matches(json!({"a": {"$type": 18}}), json!({"a": 5000000000i64})));
    assert!(matches(json!({"a": {"$type": 3}}), json!({"a": {"b": 1}})));
    assert!(matches(json!({"a": {"$type": 4}}), json!({"a": [1]})));
    assert!(matches(json!({"a": {"$type": 8}}), json!({"a": true})));
    assert!(matches(json!({"a": {"$type": 10}}), json!({"a": null})));
    assert!(!matches(json!({"a": {"$type": 2}}), json!({"a": 1})));
}

#[test]
fn test_elem_match() {
    let d = json!({"results": [{"product": "xyz", "score": 5}, {"product": "abc", "score": 8}]});
    assert!(matches(
        json!({"results": {"$elemMatch": {"product": "xyz", "score": {"$gte": 5}}}}),
        d.clone()
    ));
    assert!(!matches(
        json!({"results": {"$elemMatch": {"product": "xyz", "score": {"$gte": 8}}}}),
        d
    ));
}

// ========================================================================
// $regex
// ========================================================================

#[test]
fn test_regex_with_options() {
    assert!(matches(
        json!({"name": {"$regex": "^ac", "$options": "i"}}),
        json!({"name": "Acme Corp"})
    ));
    assert!(!matches(
        json!({"name": {"$regex": "^ac"}}),
        json!({"name": "Acme Corp"})
    ));
}

#[test]
fn test_regex_value_criteria() {
    let criteria = {
        let mut map = cumin::Object::new();
        map.insert("name".to_string(), Value::regex("me{2,}").unwrap());
        Value::Object(map)
    };
    let q = Query::new(criteria).unwrap();
    assert!(q.test(&doc(json!({"name": "hammeeer"}))).unwrap());
    assert!(!q.test(&doc(json!({"name": "hamer"}))).unwrap());
}

#[test]
fn test_regex_over_array_of_strings() {
    assert!(matches(
        json!({"tags": {"$regex": "^fo"}}),
        json!({"tags": ["bar", "foo"]})
    ));
}

#[test]
fn test_invalid_regex_pattern_fails_compilation() {
    assert!(matches!(
        Query::new(doc(json!({"a": {"$regex": "("}}))),
        Err(Error::InvalidOperand(_))
    ));
}

// ========================================================================
// $not / logical operators / $where
// ========================================================================

#[test]
fn test_not() {
    assert!(matches(json!({"a": {"$not": {"$gt": 5}}}), json!({"a": 3})));
    assert!(!matches(json!({"a": {"$not": {"$gt": 5}}}), json!({"a": 7})));
    // $not also matches documents missing the field
    assert!(matches(json!({"a": {"$not": {"$gt": 5}}}), json!({"b": 1})));
}

#[test]
fn test_and_or_nor() {
    let d = json!({"a": 1, "b": 2});
    assert!(matches(json!({"$and": [{"a": 1}, {"b": 2}]}), d.clone()));
    assert!(!matches(json!({"$and": [{"a": 1}, {"b": 3}]}), d.clone()));
    assert!(matches(json!({"$or": [{"a": 9}, {"b": 2}]}), d.clone()));
    assert!(!matches(json!({"$nor": [{"a": 1}]}), d.clone()));
    assert!(matches(json!({"$nor": [{"a": 9}, {"b": 9}]}), d));
}

#[test]
fn test_logical_operand_must_be_array() {
    assert!(matches!(
        Query::new(doc(json!({"$and": {"a": 1}}))),
        Err(Error::InvalidCriteria(_))
    ));
}

#[test]
fn test_unknown_operator_is_rejected() {
    assert!(matches!(
        Query::new(doc(json!({"a": {"$near": 1}}))),
        Err(Error::UnknownOperator(_))
    ));
    assert!(matches!(
        Query::new(doc(json!({"$everywhere": []}))),
        Err(Error::UnknownOperator(_))
    ));
}

#[test]
fn test_criteria_must_be_an_object() {
    assert!(matches!(
        Query::new(doc(json!([1, 2]))),
        Err(Error::InvalidCriteria(_))
    ));
}

#[test]
fn test_where_native_predicate() {
    let mut criteria = cumin::Object::new();
    criteria.insert(
        "$where".to_string(),
        Value::function(|d: &Value| {
            d.as_object()
                .and_then(|m| m.get("a"))
                .and_then(Value::as_i64)
                .is_some_and(|n| n % 2 == 0)
        }),
    );
    let q = Query::new(Value::Object(criteria)).unwrap();
    assert!(q.test(&doc(json!({"a": 4}))).unwrap());
    assert!(!q.test(&doc(json!({"a": 3}))).unwrap());
}

#[test]
fn test_where_rejects_non_function() {
    assert!(matches!(
        Query::new(doc(json!({"$where": "this.a > 1"}))),
        Err(Error::InvalidCriteria(_))
    ));
}

// ========================================================================
// Query surface
// ========================================================================

#[test]
fn test_test_agrees_with_find_count() {
    let cases = vec![
        (json!({"a": {"$gt": 1}}), json!({"a": 2})),
        (json!({"a": {"$gt": 1}}), json!({"a": 0})),
        (json!({"tags": "x"}), json!({"tags": ["x", "y"]})),
        (json!({"a.b": {"$exists": true}}), json!({"a": {"b": null}})),
    ];
    for (criteria, d) in cases {
        let q = query(criteria);
        let direct = q.test(&doc(d.clone())).unwrap();
        let counted = q.find(&[doc(d)]).count().unwrap() == 1;
        assert_eq!(direct, counted);
    }
}

#[test]
fn test_remove_is_the_complement() {
    let collection = docs(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]);
    let kept = remove(&collection, doc(json!({"a": {"$gt": 1}}))).unwrap();
    assert_eq!(kept, docs(vec![json!({"a": 1})]));
}

#[test]
fn test_mixed_operator_and_plain_keys_rejected() {
    assert!(matches!(
        Query::new(doc(json!({"a": {"$gt": 1, "b": 2}}))),
        Err(Error::UnknownOperator(_))
    ));
}
