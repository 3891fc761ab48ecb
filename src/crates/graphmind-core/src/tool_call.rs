//! Tool calls and tool specifications.
//!
//! A [`ToolCall`] is the unit the oracle emits when it wants external
//! information; equality (and the result-cache key) is defined over the
//! lowercased tool name plus the canonical-JSON form of the arguments,
//! so two calls that differ only in argument key order are the same call.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to invoke a named tool with JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name (stored lowercased; registry lookup is case-insensitive).
    pub name: String,

    /// Tool arguments as a JSON object.
    pub args: Value,
}

impl ToolCall {
    /// Create a tool call. The name is lowercased on construction.
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into().to_lowercase(),
            args,
        }
    }

    /// Cache key: lowercased name plus canonical-JSON arguments.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.name, canonical_json(&self.args))
    }
}

impl PartialEq for ToolCall {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && canonical_json(&self.args) == canonical_json(&other.args)
    }
}

impl Eq for ToolCall {}

impl fmt::Display for ToolCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"name\": \"{}\", \"args\": {}}}",
            self.name,
            canonical_json(&self.args)
        )
    }
}

/// Serialize a JSON value with all object keys sorted, recursively.
///
/// Used for cache keys and call equality; arrays keep their order.
pub fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
                sorted.sort_by_key(|(k, _)| k.as_str());
                Value::Object(
                    sorted
                        .into_iter()
                        .map(|(k, v)| (k.clone(), sort(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }

    sort(value).to_string()
}

/// Specification of a tool as presented to the oracle: a name, a
/// human-readable description and a JSON Schema for the arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name (unique, lowercased).
    pub name: String,

    /// Description shown to the oracle for tool selection.
    pub description: String,

    /// JSON Schema of the argument object.
    pub parameters: Value,
}

impl ToolSpec {
    /// Create a tool specification.
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into().to_lowercase(),
            description: description.into(),
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        assert_eq!(canonical_json(&value), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn canonical_json_preserves_array_order() {
        let value = json!({"items": [3, 1, 2]});
        assert_eq!(canonical_json(&value), r#"{"items":[3,1,2]}"#);
    }

    #[test]
    fn tool_calls_equal_regardless_of_key_order() {
        let a = ToolCall::new("Wikipedia_Search", json!({"x": 1, "y": 2}));
        let b = ToolCall::new("wikipedia_search", json!({"y": 2, "x": 1}));
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn tool_calls_with_different_args_differ() {
        let a = ToolCall::new("llm_query", json!({"query": "spiders"}));
        let b = ToolCall::new("llm_query", json!({"query": "beetles"}));
        assert_ne!(a, b);
    }

    #[test]
    fn display_includes_name_and_args() {
        let call = ToolCall::new("llm_query", json!({"query": "spiders"}));
        let shown = call.to_string();
        assert!(shown.contains("llm_query"));
        assert!(shown.contains("spiders"));
    }
}
