//! Structured-output schemas.
//!
//! Every structured oracle call is keyed by an output type: a
//! deserializable struct plus the JSON Schema the model is asked to
//! conform to. The helpers below build the common field shapes so call
//! sites read like the field lists they are.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A typed oracle reply: the schema requested from the model and the
/// strict parse target.
pub trait StructuredOutput: DeserializeOwned {
    /// Schema name sent with the response-format request.
    const NAME: &'static str;

    /// JSON Schema of the expected object.
    fn schema() -> Value;
}

/// Build an object schema from `(name, field schema)` pairs; every field
/// is required and extra properties are rejected.
pub fn object_schema(fields: &[(&str, Value)]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    let required: Vec<Value> = fields
        .iter()
        .map(|(name, _)| Value::String(name.to_string()))
        .collect();

    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// String field with a description.
pub fn string_field(description: &str) -> Value {
    serde_json::json!({"type": "string", "description": description})
}

/// Boolean field with a description.
pub fn bool_field(description: &str) -> Value {
    serde_json::json!({"type": "boolean", "description": description})
}

/// Array-of-strings field with a description.
pub fn string_array_field(description: &str) -> Value {
    serde_json::json!({
        "type": "array",
        "items": {"type": "string"},
        "description": description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[allow(dead_code)]
        query: String,
    }

    impl StructuredOutput for Sample {
        const NAME: &'static str = "sample";

        fn schema() -> Value {
            object_schema(&[("query", string_field("a query"))])
        }
    }

    #[test]
    fn object_schema_lists_all_fields_as_required() {
        let schema = Sample::schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["query"]));
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
        assert_eq!(schema["properties"]["query"]["type"], "string");
    }

    #[test]
    fn schema_helpers_carry_descriptions() {
        assert_eq!(string_field("d")["description"], "d");
        assert_eq!(bool_field("b")["type"], "boolean");
        assert_eq!(string_array_field("l")["items"]["type"], "string");
    }
}
