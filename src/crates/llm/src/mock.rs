//! Scripted chat client for tests.
//!
//! Responses are pushed onto a FIFO and popped one per `chat` call;
//! clones share the queue so a test can keep pushing while the oracle
//! owns a boxed clone.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use graphmind_core::ToolCall;

use crate::chat::{ChatClient, ChatRequest, ChatResponse, UsageMetadata};
use crate::error::LlmError;

/// Scripted test double for [`ChatClient`].
#[derive(Clone)]
pub struct MockChatClient {
    name: String,
    responses: Arc<Mutex<VecDeque<ChatResponse>>>,
    requests_seen: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChatClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a plain-text reply.
    pub fn push_text(&self, content: impl Into<String>) {
        self.push_response(ChatResponse {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: Some(UsageMetadata {
                prompt_tokens: 10,
                completion_tokens: 5,
                cost: 0.0,
            }),
            model: self.name.clone(),
        });
    }

    /// Queue a JSON reply (serialized to the content field).
    pub fn push_json(&self, value: Value) {
        self.push_text(value.to_string());
    }

    /// Queue a reply carrying one tool call.
    pub fn push_tool_call(&self, name: &str, args: Value) {
        self.push_response(ChatResponse {
            content: String::new(),
            tool_calls: vec![ToolCall::new(name, args)],
            usage: Some(UsageMetadata {
                prompt_tokens: 10,
                completion_tokens: 5,
                cost: 0.0,
            }),
            model: self.name.clone(),
        });
    }

    /// Queue a fully custom response.
    pub fn push_response(&self, response: ChatResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Number of queued responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    /// Requests the client has served, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests_seen.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Provider("mock response queue exhausted".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn clone_box(&self) -> Box<dyn ChatClient> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_pop_in_fifo_order() {
        let mock = MockChatClient::new("m");
        mock.push_text("first");
        mock.push_text("second");

        let a = mock.chat(ChatRequest::from_prompt("x")).await.unwrap();
        let b = mock.chat(ChatRequest::from_prompt("y")).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_queue_is_an_error() {
        let mock = MockChatClient::new("m");
        let result = mock.chat(ChatRequest::from_prompt("x")).await;
        assert!(result.is_err());
    }
}
