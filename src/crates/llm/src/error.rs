//! Oracle error types and their retry classification.

use graphmind_core::{classify_message, ErrorClass, Retryable};
use thiserror::Error;

/// Errors from model resolution and chat calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (connect, timeout, protocol).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication rejected by the provider.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Provider asked us to back off.
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    /// Any other provider-reported failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// The reply could not be decoded at the transport level.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The reply decoded but did not satisfy the requested schema.
    #[error("structured output did not match the requested schema: {0}")]
    SchemaMismatch(String),

    /// The oracle was bound to tools but returned no tool calls.
    #[error("model returned no tool calls although tool choice was required")]
    NoToolCalls,

    /// Logical model name missing from the configuration file.
    #[error("model '{0}' not found in the model configuration file")]
    UnknownModel(String),

    /// Bad configuration (unreadable file, temperature out of range, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure appending to the usage-statistics log.
    #[error("usage statistics error: {0}")]
    Stats(#[from] graphmind_core::StatsError),
}

impl Retryable for LlmError {
    fn error_class(&self) -> ErrorClass {
        match self {
            LlmError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Unknown
                }
            }
            LlmError::RateLimit(_) => ErrorClass::Transient,
            LlmError::Provider(message) => classify_message(message),
            // Parse failures are retried: the model may produce a valid
            // object on the next attempt.
            LlmError::InvalidResponse(_) | LlmError::SchemaMismatch(_) | LlmError::NoToolCalls => {
                ErrorClass::Transient
            }
            LlmError::Authentication(_)
            | LlmError::UnknownModel(_)
            | LlmError::Config(_)
            | LlmError::Stats(_) => ErrorClass::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_is_retryable() {
        assert_eq!(
            LlmError::SchemaMismatch("missing field".into()).error_class(),
            ErrorClass::Transient
        );
    }

    #[test]
    fn config_errors_are_permanent() {
        assert_eq!(
            LlmError::UnknownModel("nope".into()).error_class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            LlmError::Config("bad temperature".into()).error_class(),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn provider_errors_follow_message_classification() {
        assert_eq!(
            LlmError::Provider("500 internal server error".into()).error_class(),
            ErrorClass::Transient
        );
        assert_eq!(
            LlmError::Provider("401 unauthorized".into()).error_class(),
            ErrorClass::Permanent
        );
    }
}
