//! Structural JSON comparison for `JSON` bodies.
//!
//! - `ONLY_MATCHING_FIELDS` - the pattern must be a subset of the candidate: extra
//!   object fields are ignored and array elements may appear in any order
//! - `STRICT` - same fields, same array order, nothing extra
//!
//! Numbers compare by value, so `1` and `1.0` are equal.

use serde_json::Value;

use crate::model::MatchType;

/// Compare `expected` against `actual`, pushing a reason per mismatch.
pub fn json_matches(
    expected: &Value,
    actual: &Value,
    match_type: MatchType,
    reasons: &mut Vec<String>,
) -> bool {
    compare(expected, actual, match_type, "$", reasons)
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn compare(
    expected: &Value,
    actual: &Value,
    match_type: MatchType,
    path: &str,
    reasons: &mut Vec<String>,
) -> bool {
    match (expected, actual) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) if a == b => true,
        (Value::Number(a), Value::Number(b)) if numbers_equal(a, b) => true,
        (Value::String(a), Value::String(b)) if a == b => true,
        (Value::Object(expected_fields), Value::Object(actual_fields)) => {
            let mut ok = true;
            for (key, expected_value) in expected_fields {
                let child = format!("{path}.{key}");
                match actual_fields.get(key) {
                    Some(actual_value) => {
                        ok &= compare(expected_value, actual_value, match_type, &child, reasons);
                    }
                    None => {
                        reasons.push(format!("missing field {child}"));
                        ok = false;
                    }
                }
            }
            if match_type == MatchType::Strict {
                for key in actual_fields.keys() {
                    if !expected_fields.contains_key(key) {
                        reasons.push(format!("unexpected field {path}.{key}"));
                        ok = false;
                    }
                }
            }
            ok
        }
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            if expected_items.len() != actual_items.len() {
                reasons.push(format!(
                    "array {path} expected {} elements found {}",
                    expected_items.len(),
                    actual_items.len()
                ));
                return false;
            }
            match match_type {
                MatchType::Strict => {
                    let mut ok = true;
                    for (i, (e, a)) in expected_items.iter().zip(actual_items).enumerate() {
                        ok &= compare(e, a, match_type, &format!("{path}[{i}]"), reasons);
                    }
                    ok
                }
                MatchType::OnlyMatchingFields => {
                    if assign_unordered(expected_items, actual_items, match_type) {
                        true
                    } else {
                        reasons.push(format!(
                            "array {path} elements do not match in any order"
                        ));
                        false
                    }
                }
            }
        }
        _ => {
            reasons.push(format!(
                "{path} expected {} {} found {} {}",
                type_name(expected),
                expected,
                type_name(actual),
                actual
            ));
            false
        }
    }
}

/// Find a one-to-one assignment of expected elements to actual elements.
///
/// Pairwise comparisons are computed once, then assigned with augmenting
/// paths, so the cost stays polynomial in the array lengths.
fn assign_unordered(expected: &[Value], actual: &[Value], match_type: MatchType) -> bool {
    let candidates: Vec<Vec<usize>> = expected
        .iter()
        .map(|item| {
            actual
                .iter()
                .enumerate()
                .filter(|(_, candidate)| compare(item, candidate, match_type, "", &mut Vec::new()))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();
    if candidates.iter().any(Vec::is_empty) {
        return false;
    }

    let mut owner: Vec<Option<usize>> = vec![None; actual.len()];
    for item in 0..expected.len() {
        let mut visited = vec![false; actual.len()];
        if !augment(item, &candidates, &mut owner, &mut visited) {
            return false;
        }
    }
    true
}

fn augment(
    item: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &slot in &candidates[item] {
        if visited[slot] {
            continue;
        }
        visited[slot] = true;
        let free = match owner[slot] {
            None => true,
            Some(other) => augment(other, candidates, owner, visited),
        };
        if free {
            owner[slot] = Some(item);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches(expected: Value, actual: Value, match_type: MatchType) -> bool {
        json_matches(&expected, &actual, match_type, &mut Vec::new())
    }

    #[test]
    fn test_subset_ignores_extra_fields() {
        assert!(matches(
            json!({"a": 1}),
            json!({"a": 1, "b": 2}),
            MatchType::OnlyMatchingFields
        ));
        assert!(!matches(
            json!({"a": 1}),
            json!({"a": 1, "b": 2}),
            MatchType::Strict
        ));
    }

    #[test]
    fn test_nested_subset() {
        assert!(matches(
            json!({"order": {"id": 7}}),
            json!({"order": {"id": 7, "items": []}, "meta": null}),
            MatchType::OnlyMatchingFields
        ));
    }

    #[test]
    fn test_array_order() {
        assert!(matches(
            json!([1, 2, 3]),
            json!([3, 1, 2]),
            MatchType::OnlyMatchingFields
        ));
        assert!(!matches(json!([1, 2, 3]), json!([3, 1, 2]), MatchType::Strict));
        assert!(!matches(
            json!([1, 2]),
            json!([1, 2, 3]),
            MatchType::OnlyMatchingFields
        ));
    }

    #[test]
    fn test_unordered_array_backtracks() {
        assert!(matches(
            json!([{"a": 1}, {"a": 1, "b": 2}]),
            json!([{"a": 1, "b": 2}, {"a": 1, "c": 3}]),
            MatchType::OnlyMatchingFields
        ));
    }

    #[test]
    fn test_large_unordered_array_is_bounded() {
        let mut expected = vec![json!({"a": 1}); 200];
        expected.push(json!({"a": 2}));
        let actual = vec![json!({"a": 1, "b": true}); 201];

        let started = std::time::Instant::now();
        assert!(!matches(
            Value::Array(expected.clone()),
            Value::Array(actual.clone()),
            MatchType::OnlyMatchingFields
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        let mut actual = actual;
        actual[100] = json!({"a": 2});
        assert!(matches(
            Value::Array(expected),
            Value::Array(actual),
            MatchType::OnlyMatchingFields
        ));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(matches(json!(1), json!(1.0), MatchType::Strict));
        assert!(!matches(json!(1), json!("1"), MatchType::Strict));
    }

    #[test]
    fn test_reasons_name_paths() {
        let mut reasons = Vec::new();
        let ok = json_matches(
            &json!({"id": 1, "name": "a"}),
            &json!({"id": 2}),
            MatchType::OnlyMatchingFields,
            &mut reasons,
        );
        assert!(!ok);
        assert!(reasons.iter().any(|r| r.contains("$.id")));
        assert!(reasons.iter().any(|r| r == "missing field $.name"));
    }
}
