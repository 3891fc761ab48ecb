//! # graphmind-tools
//!
//! The tool portfolio and its manager. Tools are named, schema-typed
//! callables the oracle can select; the [`ToolManager`] dispatches by
//! name, retries transient faults with backoff, falls back to
//! single-value argument unpacking on argument-shape mismatches, and
//! memoizes results by canonical call key (`extract_zip` excepted).

pub mod browser;
pub mod convert;
pub mod extract_zip;
pub mod image_question;
pub mod llm_query;
pub mod manager;
pub mod python_code;
pub mod surfer;
pub mod text_inspector;
pub mod wikipedia;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use graphmind_core::{ErrorClass, Retryable, ToolSpec};

pub use extract_zip::ExtractZipTool;
pub use image_question::ImageQuestionTool;
pub use llm_query::LlmQueryTool;
pub use manager::ToolManager;
pub use python_code::PythonCodeTool;
pub use surfer::SearchAgentTool;
pub use text_inspector::TextInspectorTool;
pub use wikipedia::WikipediaTool;

/// Errors from tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Argument shape mismatch; the invoker retries once with the
    /// single positional value of the argument object.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Transient fault worth retrying with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Non-retryable tool failure.
    #[error("tool failed: {0}")]
    Failed(String),

    /// Oracle failure inside a tool (classification delegated).
    #[error("oracle error: {0}")]
    Oracle(#[from] llm::LlmError),

    /// Transport failure (classified by kind).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Retryable for ToolError {
    fn error_class(&self) -> ErrorClass {
        match self {
            ToolError::Transient(_) => ErrorClass::Transient,
            ToolError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Unknown
                }
            }
            ToolError::Oracle(e) => e.error_class(),
            ToolError::InvalidArguments(_) | ToolError::Failed(_) | ToolError::Io(_) => {
                ErrorClass::Permanent
            }
        }
    }
}

/// A named, schema-typed callable external to the oracle.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique lowercased name.
    fn name(&self) -> &str;

    /// Description shown to the oracle for tool selection.
    fn description(&self) -> &str;

    /// JSON Schema of the argument object.
    fn parameters(&self) -> Value;

    /// Specification handed to the oracle when binding tools.
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description(), self.parameters())
    }

    /// Invoke with JSON arguments, returning textual or structured data.
    async fn invoke(&self, args: Value) -> Result<Value, ToolError>;
}

/// Deserialize a tool's argument object, mapping shape mismatches to
/// [`ToolError::InvalidArguments`] so the invoker's unpack fallback can
/// kick in.
pub fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_permanent_classes() {
        assert_eq!(
            ToolError::Transient("x".into()).error_class(),
            ErrorClass::Transient
        );
        assert_eq!(
            ToolError::Failed("x".into()).error_class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            ToolError::InvalidArguments("x".into()).error_class(),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn parse_args_maps_shape_mismatch() {
        #[derive(serde::Deserialize)]
        struct Args {
            #[allow(dead_code)]
            query: String,
        }

        let bad = parse_args::<Args>(&serde_json::json!({"other": 1}));
        assert!(matches!(bad, Err(ToolError::InvalidArguments(_))));

        let good = parse_args::<Args>(&serde_json::json!({"query": "q"}));
        assert!(good.is_ok());
    }
}
