//! Controller error type.
//!
//! Only configuration and connectivity failures reach this type at
//! runtime; transient and semantic failures are consumed by the retry
//! and repair layers below.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Store(#[from] graphmind_store::StoreError),

    #[error(transparent)]
    Oracle(#[from] llm::LlmError),

    #[error("prompt error: {0}")]
    Prompt(#[from] graphmind_prompts::PromptError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Stats(#[from] graphmind_core::StatsError),
}
