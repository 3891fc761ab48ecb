//! Local-daemon chat client.
//!
//! Talks to a local inference daemon over plain HTTP (`/api/chat`).
//! Structured output is requested with `format: "json"`; generation
//! options (`num_ctx`, `num_predict`, `num_batch`, temperature) come
//! from the model catalog entry. The daemon keeps the model resident
//! (`keep_alive: -1`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use graphmind_core::ToolCall;

use crate::catalog::ModelConfig;
use crate::chat::{
    ChatClient, ChatMessage, ChatRequest, ChatResponse, ChatRole, MessageContent, UsageMetadata,
};
use crate::error::LlmError;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Local inference daemon client.
#[derive(Clone)]
pub struct LocalDaemonClient {
    name: String,
    config: ModelConfig,
    base_url: String,
    client: Client,
}

impl LocalDaemonClient {
    pub fn new(name: &str, config: ModelConfig) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            name: name.to_string(),
            config,
            base_url,
            client,
        })
    }

    /// Probe the daemon's model listing endpoint.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn convert_message(message: &ChatMessage) -> DaemonMessage {
        let role = match message.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            // The daemon has no separate tool role.
            ChatRole::Tool => "user",
        };
        let content = match &message.content {
            MessageContent::Text(text) => text.clone(),
            // Image parts are flattened to their text; local vision
            // support goes through dedicated multimodal models instead.
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    crate::chat::ContentPart::Text { text } => Some(text.as_str()),
                    crate::chat::ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };
        DaemonMessage {
            role: role.to_string(),
            content,
        }
    }
}

#[async_trait]
impl ChatClient for LocalDaemonClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url);

        let messages: Vec<DaemonMessage> =
            request.messages.iter().map(Self::convert_message).collect();

        let mut options = HashMap::new();
        options.insert("temperature", Value::from(self.config.temperature));
        if let Some(num_ctx) = self.config.num_ctx {
            options.insert("num_ctx", Value::from(num_ctx));
        }
        if let Some(num_predict) = self.config.num_predict {
            options.insert("num_predict", Value::from(num_predict));
        }
        if let Some(num_batch) = self.config.num_batch {
            options.insert("num_batch", Value::from(num_batch));
        }

        let tools: Option<Vec<Value>> = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|spec| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": spec.name,
                                "description": spec.description,
                                "parameters": spec.parameters,
                            },
                        })
                    })
                    .collect(),
            )
        };

        let body = DaemonRequest {
            model: self.config.model.clone(),
            messages,
            stream: false,
            format: request.response_schema.as_ref().map(|_| "json".to_string()),
            options,
            tools,
            keep_alive: -1,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider(format!(
                "daemon error {status}: {error_text}"
            )));
        }

        let daemon_response: DaemonResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let tool_calls = daemon_response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall::new(call.function.name, call.function.arguments))
            .collect();

        let usage = if daemon_response.prompt_eval_count.is_some()
            || daemon_response.eval_count.is_some()
        {
            Some(UsageMetadata {
                prompt_tokens: daemon_response.prompt_eval_count.unwrap_or(0),
                completion_tokens: daemon_response.eval_count.unwrap_or(0),
                // Local inference carries no per-token cost.
                cost: 0.0,
            })
        } else {
            None
        };

        Ok(ChatResponse {
            content: daemon_response.message.content,
            tool_calls,
            usage,
            model: daemon_response.model,
        })
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn clone_box(&self) -> Box<dyn ChatClient> {
        Box::new(self.clone())
    }
}

// Wire types
#[derive(Debug, Serialize)]
struct DaemonRequest {
    model: String,
    messages: Vec<DaemonMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    options: HashMap<&'static str, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    keep_alive: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct DaemonMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct DaemonResponse {
    model: String,
    message: DaemonResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DaemonResponseMessage {
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<DaemonToolCall>>,
}

#[derive(Debug, Deserialize)]
struct DaemonToolCall {
    function: DaemonFunctionCall,
}

#[derive(Debug, Deserialize)]
struct DaemonFunctionCall {
    name: String,
    arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelFamily;

    fn config() -> ModelConfig {
        ModelConfig {
            model_family: ModelFamily::LocalDaemon,
            model: "llama3".to_string(),
            temperature: 0.0,
            max_tokens: None,
            api_key: None,
            organization: None,
            base_url: Some("http://localhost:11434".to_string()),
            reasoning_effort: None,
            num_ctx: Some(8192),
            num_predict: Some(-1),
            num_batch: Some(512),
            prompt_cost_per_1k: None,
            completion_cost_per_1k: None,
        }
    }

    #[test]
    fn client_creation() {
        let client = LocalDaemonClient::new("local", config()).unwrap();
        assert_eq!(client.model_name(), "local");
    }

    #[test]
    fn tool_role_maps_to_user() {
        let message = ChatMessage {
            role: ChatRole::Tool,
            content: MessageContent::Text("output".to_string()),
        };
        let converted = LocalDaemonClient::convert_message(&message);
        assert_eq!(converted.role, "user");
        assert_eq!(converted.content, "output");
    }
}
