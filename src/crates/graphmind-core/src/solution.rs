//! Emptiness predicate for retrieve results.
//!
//! A retrieve result counts as empty when there is nothing a solution
//! could be built from: JSON null, empty collections, or nested
//! structures whose leaves are all empty. Scalars, including strings,
//! are always answers.

use serde_json::Value;

/// Returns true when `value` carries no usable content.
pub fn is_empty_solution(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
        Value::Array(items) => items.iter().all(is_empty_solution),
        Value::Object(map) => map.values().all(is_empty_solution),
    }
}

/// Emptiness over a list of candidate solutions.
pub fn all_solutions_empty(solutions: &[Value]) -> bool {
    solutions.iter().all(is_empty_solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_is_empty() {
        assert!(is_empty_solution(&Value::Null));
    }

    #[test]
    fn scalars_are_never_empty() {
        assert!(!is_empty_solution(&json!(0)));
        assert!(!is_empty_solution(&json!(false)));
        assert!(!is_empty_solution(&json!("")));
        assert!(!is_empty_solution(&json!("   ")));
    }

    #[test]
    fn empty_collections_are_empty() {
        assert!(is_empty_solution(&json!([])));
        assert!(is_empty_solution(&json!({})));
    }

    #[test]
    fn nested_all_empty_is_empty() {
        assert!(is_empty_solution(&json!([[], {"a": null}, [null, []]])));
    }

    #[test]
    fn string_leaves_make_a_structure_non_empty() {
        assert!(!is_empty_solution(&json!(["", []])));
        assert!(!is_empty_solution(&json!({"rows": [""]})));
    }

    #[test]
    fn any_non_empty_leaf_counts() {
        assert!(!is_empty_solution(&json!([[], {"a": "8"}])));
        assert!(!is_empty_solution(&json!({"rows": [{"legs": 8}]})));
    }

    #[test]
    fn list_predicate_matches_elementwise() {
        assert!(all_solutions_empty(&[json!(null), json!([])]));
        assert!(!all_solutions_empty(&[json!(null), json!("8")]));
    }
}
