//! The oracle: retrying, statistics-logging front end over a chat client.
//!
//! Call sites pass the logical function name making the request (e.g.
//! `Controller.define_next_step`); every call appends one usage record.
//! Transient faults (5xx, connect/read timeouts, structured-output parse
//! failures) are retried with random-exponential backoff up to the
//! configured maximum; other errors surface immediately.

use serde_json::Value;
use tracing::{debug, info};

use graphmind_core::{
    epoch_seconds, retry_with_backoff, RetryConfig, ToolCall, ToolSpec, UsageStatistics,
};

use crate::chat::{ChatClient, ChatMessage, ChatRequest, ChatResponse, ResponseSchema};
use crate::error::LlmError;
use crate::schema::StructuredOutput;

/// Language-model oracle producing structured decisions, queries and
/// text.
pub struct Oracle {
    client: Box<dyn ChatClient>,
    stats: UsageStatistics,
    retry: RetryConfig,
}

impl Oracle {
    /// Wrap a chat client. `max_llm_retries` bounds the retry layer;
    /// backoff is exponential with jitter in the 1–60 s span.
    pub fn new(client: Box<dyn ChatClient>, stats: UsageStatistics, max_llm_retries: u32) -> Self {
        let retry = RetryConfig::new(max_llm_retries)
            .with_initial_backoff(1000)
            .with_max_backoff(60_000)
            .with_jitter(true);
        Self {
            client,
            stats,
            retry,
        }
    }

    /// Logical model name of the underlying client.
    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    async fn call(
        &self,
        function_name: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, LlmError> {
        let start = epoch_seconds();

        let response = retry_with_backoff(&self.retry, function_name, || {
            let request = request.clone();
            async move { self.client.chat(request).await }
        })
        .await?;

        let end = epoch_seconds();
        let usage = response.usage.clone().unwrap_or_default();
        self.stats.log_call(
            function_name,
            start,
            end,
            Some(self.client.model_name()),
            usage.prompt_tokens,
            usage.completion_tokens,
            (usage.cost * 1e6).round() / 1e6,
        )?;

        Ok(response)
    }

    /// Structured call: the reply must parse into `T`.
    ///
    /// A reply that fails to parse counts as a transient fault and is
    /// retried by re-asking the model.
    pub async fn invoke_structured<T: StructuredOutput>(
        &self,
        function_name: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<T, LlmError> {
        let schema = ResponseSchema {
            name: T::NAME.to_string(),
            schema: T::schema(),
        };

        let start = epoch_seconds();
        let parsed = retry_with_backoff(&self.retry, function_name, || {
            let request =
                ChatRequest::new(messages.clone()).with_response_schema(schema.clone());
            async move {
                let response = self.client.chat(request).await?;
                let value: T = serde_json::from_str(response.content.trim())
                    .map_err(|e| LlmError::SchemaMismatch(format!("{e}: {}", response.content)))?;
                Ok::<(T, ChatResponse), LlmError>((value, response))
            }
        })
        .await;

        let (value, response) = parsed?;
        let end = epoch_seconds();
        let usage = response.usage.unwrap_or_default();
        self.stats.log_call(
            function_name,
            start,
            end,
            Some(self.client.model_name()),
            usage.prompt_tokens,
            usage.completion_tokens,
            (usage.cost * 1e6).round() / 1e6,
        )?;

        debug!(function = function_name, "Structured oracle reply parsed");
        Ok(value)
    }

    /// Structured call from a single prompt.
    pub async fn invoke_structured_prompt<T: StructuredOutput>(
        &self,
        function_name: &str,
        prompt: &str,
    ) -> Result<T, LlmError> {
        self.invoke_structured(function_name, vec![ChatMessage::user(prompt)])
            .await
    }

    /// Free-text call.
    pub async fn invoke_text(
        &self,
        function_name: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<String, LlmError> {
        let response = self.call(function_name, ChatRequest::new(messages)).await?;
        Ok(response.content)
    }

    /// Free-text call from a single prompt.
    pub async fn invoke_prompt(
        &self,
        function_name: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        self.invoke_text(function_name, vec![ChatMessage::user(prompt)])
            .await
    }

    /// Tool-bound call: the model must pick at least one tool.
    ///
    /// An empty tool-call list is a transient fault (re-asked), so the
    /// returned vector is never empty.
    pub async fn invoke_tool_calls(
        &self,
        function_name: &str,
        prompt: &str,
        tools: &[ToolSpec],
    ) -> Result<Vec<ToolCall>, LlmError> {
        let start = epoch_seconds();

        let response = retry_with_backoff(&self.retry, function_name, || {
            let request = ChatRequest::from_prompt(prompt).with_tools(tools.to_vec(), true);
            async move {
                let response = self.client.chat(request).await?;
                if response.tool_calls.is_empty() {
                    return Err(LlmError::NoToolCalls);
                }
                Ok(response)
            }
        })
        .await?;

        let end = epoch_seconds();
        let usage = response.usage.clone().unwrap_or_default();
        self.stats.log_call(
            function_name,
            start,
            end,
            Some(self.client.model_name()),
            usage.prompt_tokens,
            usage.completion_tokens,
            (usage.cost * 1e6).round() / 1e6,
        )?;

        info!(
            function = function_name,
            calls = response.tool_calls.len(),
            "Oracle selected tool calls"
        );
        Ok(response.tool_calls)
    }

    /// Structured call that also reports the raw JSON value (used by
    /// callers that want to log the untyped reply).
    pub async fn invoke_structured_value(
        &self,
        function_name: &str,
        prompt: &str,
        schema: ResponseSchema,
    ) -> Result<Value, LlmError> {
        let request = ChatRequest::from_prompt(prompt).with_response_schema(schema);
        let response = self.call(function_name, request).await?;
        serde_json::from_str(response.content.trim())
            .map_err(|e| LlmError::SchemaMismatch(format!("{e}: {}", response.content)))
    }
}
