//! Retry logic with exponential backoff and error classification.
//!
//! Every external call in the system (oracle, tools, graph backends) sits
//! behind a bounded retry layer. Errors are classified as transient
//! (retried), permanent (surfaced immediately) or unknown (retried).

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

/// Classification of errors for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that may succeed on retry (rate limits, timeouts, 5xx).
    Transient,

    /// Permanent errors that won't succeed on retry (4xx, invalid auth, syntax).
    Permanent,

    /// Unknown errors - treated as transient by default.
    Unknown,
}

/// Errors that know their own retry classification.
pub trait Retryable {
    fn error_class(&self) -> ErrorClass;
}

/// Classify an error message by its content.
///
/// Used by error enums whose variants wrap provider messages without
/// a structured status code.
pub fn classify_message(msg: &str) -> ErrorClass {
    let msg_lower = msg.to_lowercase();

    if msg_lower.contains("rate limit")
        || msg_lower.contains("too many requests")
        || msg_lower.contains("429")
    {
        return ErrorClass::Transient;
    }

    if msg_lower.contains("timeout")
        || msg_lower.contains("timed out")
        || msg_lower.contains("deadline exceeded")
    {
        return ErrorClass::Transient;
    }

    if msg_lower.contains("503")
        || msg_lower.contains("service unavailable")
        || msg_lower.contains("502")
        || msg_lower.contains("bad gateway")
        || msg_lower.contains("500")
        || msg_lower.contains("internal server error")
    {
        return ErrorClass::Transient;
    }

    if msg_lower.contains("connection") || msg_lower.contains("network") || msg_lower.contains("dns")
    {
        return ErrorClass::Transient;
    }

    if msg_lower.contains("401")
        || msg_lower.contains("unauthorized")
        || msg_lower.contains("invalid api key")
        || msg_lower.contains("authentication failed")
        || msg_lower.contains("403")
        || msg_lower.contains("forbidden")
        || msg_lower.contains("404")
        || msg_lower.contains("not found")
        || msg_lower.contains("400")
        || msg_lower.contains("bad request")
    {
        return ErrorClass::Permanent;
    }

    ErrorClass::Unknown
}

/// Retry strategy configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (on top of the first try).
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds.
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,

    /// Whether to add random jitter to backoff delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom max retries.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set initial backoff delay.
    pub fn with_initial_backoff(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    /// Set maximum backoff delay.
    pub fn with_max_backoff(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    /// Set backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate backoff delay for a given attempt.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            (self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32)) as u64;

        let delay_ms = delay_ms.min(self.max_backoff_ms);

        let delay_ms = if self.jitter {
            // Up to 25% random jitter on top of the exponential delay.
            let jitter_amount = (delay_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay_ms + jitter_amount
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }
}

/// Execute an async operation with bounded retries.
///
/// Permanent errors abort immediately; transient and unknown errors are
/// retried up to `config.max_retries` times with exponential backoff.
/// Returns the last error once the budget is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            info!(
                operation = operation_name,
                attempt,
                max_retries = config.max_retries,
                "Retrying operation"
            );
        }

        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                let error_class = e.error_class();

                debug!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    classification = ?error_class,
                    "Operation failed"
                );

                if error_class == ErrorClass::Permanent {
                    error!(
                        operation = operation_name,
                        error = %e,
                        "Permanent error detected, aborting retries"
                    );
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < config.max_retries {
                    let delay = config.backoff_delay(attempt);

                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Transient error, will retry after delay"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let final_error = last_error.expect("retry loop runs at least once");
    error!(
        operation = operation_name,
        max_retries = config.max_retries,
        error = %final_error,
        "All retry attempts exhausted"
    );

    Err(final_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct TestError(String);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Retryable for TestError {
        fn error_class(&self) -> ErrorClass {
            classify_message(&self.0)
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 1000);
        assert_eq!(config.max_backoff_ms, 60_000);
        assert!(config.jitter);
    }

    #[test]
    fn test_backoff_delay_exponential() {
        let config = RetryConfig::new(3).with_initial_backoff(1000).with_jitter(false);

        assert_eq!(config.backoff_delay(0).as_millis(), 1000);
        assert_eq!(config.backoff_delay(1).as_millis(), 2000);
        assert_eq!(config.backoff_delay(2).as_millis(), 4000);
    }

    #[test]
    fn test_backoff_delay_max_cap() {
        let config = RetryConfig::new(10)
            .with_initial_backoff(1000)
            .with_max_backoff(5000)
            .with_jitter(false);

        // Would be 32000 without the cap.
        assert_eq!(config.backoff_delay(5).as_millis(), 5000);
    }

    #[test]
    fn test_classify_transient() {
        assert_eq!(classify_message("Rate limit exceeded (429)"), ErrorClass::Transient);
        assert_eq!(classify_message("Request timed out"), ErrorClass::Transient);
        assert_eq!(classify_message("503 Service Unavailable"), ErrorClass::Transient);
        assert_eq!(classify_message("Connection refused"), ErrorClass::Transient);
    }

    #[test]
    fn test_classify_permanent() {
        assert_eq!(classify_message("401 Unauthorized"), ErrorClass::Permanent);
        assert_eq!(classify_message("Invalid API key"), ErrorClass::Permanent);
        assert_eq!(classify_message("400 Bad Request"), ErrorClass::Permanent);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify_message("Some other error"), ErrorClass::Unknown);
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let config = RetryConfig::new(3);
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = retry_with_backoff(&config, "test_operation", move || {
            let count = Arc::clone(&attempts_clone);
            async move {
                *count.lock().unwrap() += 1;
                Ok::<i32, TestError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_errors() {
        let config = RetryConfig::new(3).with_initial_backoff(10).with_jitter(false);
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = retry_with_backoff(&config, "test_operation", move || {
            let count = Arc::clone(&attempts_clone);
            async move {
                let mut c = count.lock().unwrap();
                *c += 1;
                let current = *c;
                drop(c);

                if current < 3 {
                    Err(TestError("503 Service Unavailable".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retry_abort_on_permanent_error() {
        let config = RetryConfig::new(3).with_initial_backoff(10);
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<(), TestError> =
            retry_with_backoff(&config, "test_operation", move || {
                let count = Arc::clone(&attempts_clone);
                async move {
                    *count.lock().unwrap() += 1;
                    Err(TestError("401 Unauthorized".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaust_all_attempts() {
        let config = RetryConfig::new(2).with_initial_backoff(10).with_jitter(false);
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<(), TestError> =
            retry_with_backoff(&config, "test_operation", move || {
                let count = Arc::clone(&attempts_clone);
                async move {
                    *count.lock().unwrap() += 1;
                    Err(TestError("Timeout".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        // Initial try + 2 retries.
        assert_eq!(*attempts.lock().unwrap(), 3);
    }
}
