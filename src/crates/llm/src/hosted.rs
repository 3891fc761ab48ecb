//! Hosted-API chat client (chat-completions wire format).
//!
//! Speaks the widely implemented chat-completions HTTP contract: bearer
//! auth, optional organization header, `response_format: json_schema`
//! for structured output and `tools` + `tool_choice: "required"` for
//! tool binding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use graphmind_core::ToolCall;

use crate::catalog::ModelConfig;
use crate::chat::{
    ChatClient, ChatMessage, ChatRequest, ChatResponse, ChatRole, ContentPart, MessageContent,
    UsageMetadata,
};
use crate::error::LlmError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Hosted chat-completions client.
#[derive(Clone)]
pub struct HostedApiClient {
    name: String,
    config: ModelConfig,
    api_key: String,
    base_url: String,
    client: Client,
}

impl HostedApiClient {
    pub fn new(name: &str, config: ModelConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| LlmError::Config(format!("model '{name}' has no api_key")))?;
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
            api_key,
            base_url,
            client,
        })
    }

    fn convert_message(message: &ChatMessage) -> ApiMessage {
        let role = match message.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        };
        let content = match &message.content {
            MessageContent::Text(text) => Value::String(text.clone()),
            MessageContent::Parts(parts) => Value::Array(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => {
                            serde_json::json!({"type": "text", "text": text})
                        }
                        ContentPart::ImageUrl { url, detail } => serde_json::json!({
                            "type": "image_url",
                            "image_url": {"url": url, "detail": detail.as_deref().unwrap_or("auto")},
                        }),
                    })
                    .collect(),
            ),
        };
        ApiMessage {
            role: role.to_string(),
            content,
        }
    }

    fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let prompt_rate = self.config.prompt_cost_per_1k.unwrap_or(0.0);
        let completion_rate = self.config.completion_cost_per_1k.unwrap_or(0.0);
        (prompt_tokens as f64 / 1000.0) * prompt_rate
            + (completion_tokens as f64 / 1000.0) * completion_rate
    }
}

#[async_trait]
impl ChatClient for HostedApiClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages: Vec<ApiMessage> = request.messages.iter().map(Self::convert_message).collect();

        let response_format = request.response_schema.as_ref().map(|schema| {
            serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": true,
                },
            })
        });

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
        let tool_choice = tools
            .as_ref()
            .and_then(|_| request.tool_choice_required.then(|| "required".to_string()));

        let body = ApiRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
            stop: if request.stop.is_empty() {
                None
            } else {
                Some(request.stop.clone())
            },
            response_format,
            tools,
            tool_choice,
            reasoning_effort: self.config.reasoning_effort.clone(),
            stream: false,
        };

        let mut http_request = self
            .client
            .post(&url)
            .json(&body)
            .header("Authorization", format!("Bearer {}", self.api_key));
        if let Some(org) = &self.config.organization {
            http_request = http_request.header("OpenAI-Organization", org);
        }

        let response = http_request.send().await.map_err(LlmError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 => LlmError::Authentication(error_text),
                429 => LlmError::RateLimit(error_text),
                _ => LlmError::Provider(format!("API error {status}: {error_text}")),
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("reply has no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let args: Value = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments));
                ToolCall::new(call.function.name, args)
            })
            .collect();

        let usage = api_response.usage.map(|u| UsageMetadata {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            cost: self.cost(u.prompt_tokens, u.completion_tokens),
        });

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage,
            model: api_response.model,
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
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelFamily;

    fn config() -> ModelConfig {
        ModelConfig {
            model_family: ModelFamily::HostedApi,
            model: "gpt-test".to_string(),
            temperature: 0.0,
            max_tokens: None,
            api_key: Some("test-key".to_string()),
            organization: None,
            base_url: None,
            reasoning_effort: None,
            num_ctx: None,
            num_predict: None,
            num_batch: None,
            prompt_cost_per_1k: Some(0.5),
            completion_cost_per_1k: Some(1.5),
        }
    }

    #[test]
    fn client_requires_an_api_key() {
        let mut missing = config();
        missing.api_key = None;
        // Only fails when the environment fallback is absent as well.
        if std::env::var("OPENAI_API_KEY").is_err() {
            assert!(HostedApiClient::new("m", missing).is_err());
        }
    }

    #[test]
    fn message_conversion_maps_roles() {
        let converted = HostedApiClient::convert_message(&ChatMessage::user("hi"));
        assert_eq!(converted.role, "user");
        assert_eq!(converted.content, Value::String("hi".to_string()));
    }

    #[test]
    fn image_messages_become_part_arrays() {
        let message = ChatMessage::user_with_image("what?", "data:image/png;base64,AAAA");
        let converted = HostedApiClient::convert_message(&message);
        let parts = converted.content.as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["type"], "image_url");
    }

    #[test]
    fn cost_uses_configured_rates() {
        let client = HostedApiClient::new("m", config()).unwrap();
        let cost = client.cost(2000, 1000);
        assert!((cost - (1.0 + 1.5)).abs() < 1e-9);
    }
}
