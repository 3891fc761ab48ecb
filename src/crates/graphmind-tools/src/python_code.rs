//! Sandboxed code-executor tool.
//!
//! Submits source text plus required module names to the external
//! executor service (`POST /run`) and returns its stdout. When repair is
//! enabled, execution errors are handed to the oracle which rewrites the
//! code, up to a bounded number of attempts. The executor runs untrusted
//! code; its output is treated as text only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use graphmind_prompts::PromptTemplate;
use llm::{object_schema, string_array_field, string_field, Oracle, StructuredOutput};

use crate::{parse_args, Tool, ToolError};

const DESCRIPTION: &str = "\
This tool executes Python code. Users can specify the code and any required packages. Best tool for \
math and statistic computations. **ALWAYS** add a print statement for the final answer.

Limitations:
- Execution Environment: sandboxed interpreter. Some packages may not be supported or installable.
- File Access: Direct file access is not allowed. If your code needs to work with files, they must be accessible via a URL.";

/// Per-call executor timeout.
const EXECUTOR_TIMEOUT: Duration = Duration::from_secs(240);

#[derive(Debug, Deserialize)]
struct RunCodeArgs {
    code: String,
    #[serde(default)]
    required_modules: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FixedCode {
    fixed_code: String,
    #[serde(default)]
    fixed_required_modules: Vec<String>,
}

impl StructuredOutput for FixedCode {
    const NAME: &'static str = "fixed_code";

    fn schema() -> Value {
        object_schema(&[
            ("fixed_code", string_field("The fixed code")),
            (
                "fixed_required_modules",
                string_array_field("The fixed list of required modules"),
            ),
        ])
    }
}

/// `run_python_code`: math/code execution with optional self-repair.
pub struct PythonCodeTool {
    url: String,
    client: reqwest::Client,
    repair: Option<Repair>,
}

struct Repair {
    oracle: Arc<Oracle>,
    times_to_fix: u32,
}

impl PythonCodeTool {
    /// Executor without self-repair.
    pub fn new(executor_url: impl Into<String>) -> Self {
        Self {
            url: executor_url.into(),
            client: reqwest::Client::builder()
                .timeout(EXECUTOR_TIMEOUT)
                .build()
                .expect("HTTP client construction cannot fail with static options"),
            repair: None,
        }
    }

    /// Enable oracle-backed code repair, bounded by `times_to_fix`.
    pub fn with_repair(mut self, oracle: Arc<Oracle>, times_to_fix: u32) -> Self {
        self.repair = Some(Repair {
            oracle,
            times_to_fix,
        });
        self
    }

    /// Probe the executor with a trivial snippet. Used at startup; a
    /// failure means the service is down and the run must not start.
    pub async fn probe(&self) -> Result<(), ToolError> {
        let output = self
            .execute_once("print(\"executor reachable\")", &[])
            .await?;
        match output {
            ExecutorReply::Ok(_) => Ok(()),
            ExecutorReply::Error(message) => Err(ToolError::Failed(format!(
                "executor probe failed: {message}"
            ))),
        }
    }

    async fn execute_once(
        &self,
        code: &str,
        required_modules: &[String],
    ) -> Result<ExecutorReply, ToolError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "code": code,
                "required_modules": required_modules,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let parsed: Value = serde_json::from_str(&body)
                .map_err(|e| ToolError::Failed(format!("unparsable executor reply: {e}")))?;
            let output = parsed
                .get("output")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(ExecutorReply::Ok(output))
        } else {
            Ok(ExecutorReply::Error(body))
        }
    }

    async fn fix_code(
        &self,
        repair: &Repair,
        code: &str,
        required_modules: &[String],
        error_text: &str,
    ) -> Result<(String, Vec<String>), ToolError> {
        let prompt = PromptTemplate::new(graphmind_prompts::tools::FIX_PYTHON_CODE)
            .render(&[
                ("code", code),
                ("required_modules", &required_modules.join(", ")),
                ("error", error_text),
            ])
            .map_err(|e| ToolError::Failed(e.to_string()))?;

        let fixed: FixedCode = repair
            .oracle
            .invoke_structured_prompt("PythonCodeTool.fix_code", &prompt)
            .await?;
        info!("Executor code rewritten after error");
        Ok((fixed.fixed_code, fixed.fixed_required_modules))
    }
}

enum ExecutorReply {
    Ok(String),
    Error(String),
}

#[async_trait]
impl Tool for PythonCodeTool {
    fn name(&self) -> &str {
        "run_python_code"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The Python code to be executed. **ALWAYS** add a print statement for the final answer",
                },
                "required_modules": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Optional list of required modules to be installed before execution. (e.g. ['numpy', 'pandas'])",
                },
            },
            "required": ["code"],
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: RunCodeArgs = match &args {
            Value::String(code) => RunCodeArgs {
                code: code.clone(),
                required_modules: Vec::new(),
            },
            _ => parse_args(&args)?,
        };

        let mut code = args.code;
        let mut required_modules = args.required_modules;
        let mut reply = self.execute_once(&code, &required_modules).await?;

        if let Some(repair) = &self.repair {
            let mut fixes_left = repair.times_to_fix;
            while let ExecutorReply::Error(ref error_text) = reply {
                if fixes_left == 0 {
                    break;
                }
                fixes_left -= 1;
                error!(error = %error_text, fixes_left, "Code execution failed");

                match self.fix_code(repair, &code, &required_modules, error_text).await {
                    Ok((fixed_code, fixed_modules)) => {
                        code = fixed_code;
                        required_modules = fixed_modules;
                    }
                    Err(e) => {
                        error!(error = %e, "Code repair failed");
                        break;
                    }
                }

                reply = self.execute_once(&code, &required_modules).await?;
            }
        }

        match reply {
            ExecutorReply::Ok(output) => Ok(serde_json::json!({"output": output})),
            ExecutorReply::Error(message) => Ok(serde_json::json!({"error": message})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_require_code_only() {
        let tool = PythonCodeTool::new("http://localhost:16000/run");
        let schema = tool.parameters();
        assert_eq!(schema["required"], serde_json::json!(["code"]));
        assert!(schema["properties"]["required_modules"].is_object());
    }

    #[test]
    fn fixed_code_schema_lists_both_fields() {
        let schema = FixedCode::schema();
        assert_eq!(
            schema["required"],
            serde_json::json!(["fixed_code", "fixed_required_modules"])
        );
    }
}
