//! # llm
//!
//! The language-model oracle for graphmind.
//!
//! A JSON configuration file maps logical model names to provider
//! families (`hosted-api` or `local-daemon`); [`ModelCatalog`] resolves a
//! name into a [`ChatClient`]. The [`Oracle`] wraps a client with bounded
//! retries, structured output (typed objects parsed from JSON-schema
//! constrained replies), tool binding and per-call usage statistics.

pub mod catalog;
pub mod chat;
pub mod error;
pub mod hosted;
pub mod local;
pub mod mock;
pub mod oracle;
pub mod schema;

pub use catalog::{ModelCatalog, ModelConfig, ModelFamily};
pub use chat::{
    ChatClient, ChatMessage, ChatRequest, ChatResponse, ChatRole, ContentPart, MessageContent,
    ResponseSchema, UsageMetadata,
};
pub use error::LlmError;
pub use hosted::HostedApiClient;
pub use local::LocalDaemonClient;
pub use mock::MockChatClient;
pub use oracle::Oracle;
pub use schema::{bool_field, object_schema, string_array_field, string_field, StructuredOutput};
