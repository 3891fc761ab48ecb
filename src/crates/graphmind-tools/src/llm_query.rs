//! Free-text oracle tool: the always-available fallback.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use llm::Oracle;

use crate::{parse_args, Tool, ToolError};

const DESCRIPTION: &str = "\
This tool interfaces with a Large Language Model (LLM) to generate responses based on provided inputs. \
Use it for tasks such as text generation, summarization, question answering, and more. To achieve the \
best results, be *as specific and verbose as possible* in your query. The query is the only source of \
information you can pass to the LLM.

Limitations:
- The LLM might produce responses that are not factually accurate or relevant if the input is ambiguous or lacks context.
- The LLM is not great at math nor at probability related queries.
- The LLM has a knowledge cutoff date and may not be aware of recent events or advancements.";

#[derive(Debug, Deserialize)]
struct LlmQueryArgs {
    query: String,
}

/// `llm_query`: ask the oracle in free text.
pub struct LlmQueryTool {
    oracle: Arc<Oracle>,
}

impl LlmQueryTool {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl Tool for LlmQueryTool {
    fn name(&self) -> &str {
        "llm_query"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The query string to ask the LLM.",
                },
            },
            "required": ["query"],
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        // Bare-string form arrives through the unpack fallback.
        let query = match &args {
            Value::String(query) => query.clone(),
            _ => parse_args::<LlmQueryArgs>(&args)?.query,
        };

        let answer = self.oracle.invoke_prompt("llm_query", &query).await?;
        Ok(Value::String(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_core::UsageStatistics;
    use llm::ChatClient;
    use llm::MockChatClient;
    use tempfile::tempdir;

    fn tool_with_reply(reply: &str) -> (LlmQueryTool, tempfile::TempDir) {
        let mock = MockChatClient::new("mock");
        mock.push_text(reply);
        let dir = tempdir().unwrap();
        let stats = UsageStatistics::new(dir.path().join("usage.jsonl")).unwrap();
        let oracle = Arc::new(Oracle::new(mock.clone_box(), stats, 1));
        (LlmQueryTool::new(oracle), dir)
    }

    #[tokio::test]
    async fn answers_object_form_arguments() {
        let (tool, _dir) = tool_with_reply("Spiders have 8 legs");
        let output = tool
            .invoke(serde_json::json!({"query": "How many legs does a spider have?"}))
            .await
            .unwrap();
        assert_eq!(output, Value::String("Spiders have 8 legs".into()));
    }

    #[tokio::test]
    async fn answers_bare_string_arguments() {
        let (tool, _dir) = tool_with_reply("Yes");
        let output = tool
            .invoke(Value::String("is water wet?".into()))
            .await
            .unwrap();
        assert_eq!(output, Value::String("Yes".into()));
    }
}
