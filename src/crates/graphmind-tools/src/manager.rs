//! Tool manager: registry, retrying invoker and the result cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{error, info, warn};

use graphmind_core::{ErrorClass, Retryable, RetryConfig, ToolCall, ToolSpec};
use llm::Oracle;

use crate::{
    ExtractZipTool, ImageQuestionTool, LlmQueryTool, PythonCodeTool, SearchAgentTool,
    TextInspectorTool, Tool, ToolError, WikipediaTool,
};

/// Fixed failure strings surfaced to the controller in place of output.
const INVOCATION_FAILED: &str = "Tool invocation failed.";
const INVOCATION_FAILED_RETRIES: &str = "Tool invocation failed after multiple retries.";

/// Tool name whose results are never cached (extraction is a filesystem
/// side effect, not a value).
const UNCACHED_TOOL: &str = "extract_zip";

/// Owns the tool set, dispatches calls by lowercased name and memoizes
/// results keyed by (name, canonical-JSON arguments).
pub struct ToolManager {
    tools: HashMap<String, Arc<dyn Tool>>,
    cache: Mutex<HashMap<String, Value>>,
    retry: RetryConfig,
}

impl ToolManager {
    /// Create an empty manager with the given tool-retry budget.
    pub fn new(max_tool_retries: u32) -> Self {
        Self {
            tools: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
            retry: RetryConfig::new(max_tool_retries)
                .with_initial_backoff(1000)
                .with_max_backoff(60_000)
                .with_jitter(true),
        }
    }

    /// Assemble the standard tool portfolio.
    ///
    /// Probes the code executor with a trivial snippet first; an
    /// unreachable executor fails construction so the run never starts
    /// against a dead sandbox.
    pub async fn with_standard_tools(
        max_tool_retries: u32,
        oracle: Arc<Oracle>,
        python_executor_uri: &str,
        search_api_key: Option<String>,
    ) -> Result<Self, ToolError> {
        let python = PythonCodeTool::new(python_executor_uri).with_repair(oracle.clone(), 3);
        python.probe().await?;

        let mut manager = Self::new(max_tool_retries);
        manager.register(Arc::new(LlmQueryTool::new(oracle.clone())));
        manager.register(Arc::new(ImageQuestionTool::new(oracle.clone())));
        manager.register(Arc::new(TextInspectorTool::new(oracle.clone())));
        manager.register(Arc::new(SearchAgentTool::new(oracle.clone(), search_api_key)));
        manager.register(Arc::new(WikipediaTool::new(oracle)));
        manager.register(Arc::new(python));
        manager.register(Arc::new(ExtractZipTool::new()));
        Ok(manager)
    }

    /// Register a tool under its lowercased name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_lowercase();
        info!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
    }

    /// Specifications of all registered tools, for oracle binding.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Look up a tool by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name.to_lowercase()).cloned()
    }

    /// Invoke a batch of calls in order, consulting the cache first.
    ///
    /// Unknown tools yield `None` outputs (the caller skips the
    /// corresponding graph-update step).
    pub async fn invoke_all(&self, calls: &[ToolCall]) -> Vec<Option<Value>> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            outputs.push(self.invoke_with_cache(call).await);
        }
        outputs
    }

    /// Invoke one call, consulting and populating the result cache.
    pub async fn invoke_with_cache(&self, call: &ToolCall) -> Option<Value> {
        let key = call.cache_key();

        if let Some(cached) = self.cache.lock().expect("tool cache poisoned").get(&key) {
            info!(tool = %call.name, "Tool output served from cache");
            return Some(cached.clone());
        }

        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Tool not found");
            return None;
        };

        let output = self.invoke_with_retry(tool.as_ref(), &call.args).await;

        if call.name != UNCACHED_TOOL {
            self.cache
                .lock()
                .expect("tool cache poisoned")
                .insert(key, output.clone());
        }

        Some(output)
    }

    /// Number of cached results (used by tests and diagnostics).
    pub fn cached_results(&self) -> usize {
        self.cache.lock().expect("tool cache poisoned").len()
    }

    /// Bounded-retry invocation.
    ///
    /// Argument-shape mismatches are retried once per attempt with the
    /// single positional value of the argument object; transient faults
    /// back off exponentially; any other failure stops immediately with
    /// the fixed failure string.
    async fn invoke_with_retry(&self, tool: &dyn Tool, args: &Value) -> Value {
        for attempt in 0..=self.retry.max_retries {
            let result = match tool.invoke(args.clone()).await {
                Err(ToolError::InvalidArguments(message)) => {
                    info!(
                        tool = tool.name(),
                        message, "Retrying with unpacked argument value"
                    );
                    match single_positional_value(args) {
                        Some(value) => tool.invoke(value).await,
                        None => Err(ToolError::InvalidArguments(message)),
                    }
                }
                other => other,
            };

            match result {
                Ok(output) => return output,
                Err(e) if e.error_class() == ErrorClass::Transient => {
                    error!(tool = tool.name(), error = %e, "Transient tool failure, retrying");
                    if attempt < self.retry.max_retries {
                        tokio::time::sleep(self.retry.backoff_delay(attempt)).await;
                        continue;
                    }
                }
                Err(e) => {
                    error!(tool = tool.name(), error = %e, "Tool invocation failed");
                    return Value::String(INVOCATION_FAILED.to_string());
                }
            }
        }

        Value::String(INVOCATION_FAILED_RETRIES.to_string())
    }
}

/// The single positional value of an argument object, when there is
/// exactly one.
fn single_positional_value(args: &Value) -> Option<Value> {
    match args {
        Value::Object(map) if map.len() == 1 => map.values().next().cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingTool {
        invocations: AtomicU32,
        behavior: Behavior,
        name: &'static str,
    }

    enum Behavior {
        Ok,
        TransientThenOk(u32),
        AlwaysTransient,
        AlwaysFailed,
        NeedsBareValue,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
            let n = self.invocations.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Ok => Ok(serde_json::json!({"echo": args})),
                Behavior::TransientThenOk(after) => {
                    if n < *after {
                        Err(ToolError::Transient("flaky".into()))
                    } else {
                        Ok(Value::String("recovered".into()))
                    }
                }
                Behavior::AlwaysTransient => Err(ToolError::Transient("down".into())),
                Behavior::AlwaysFailed => Err(ToolError::Failed("broken".into())),
                Behavior::NeedsBareValue => match args {
                    Value::String(s) => Ok(Value::String(format!("bare:{s}"))),
                    _ => Err(ToolError::InvalidArguments("expected a string".into())),
                },
            }
        }
    }

    fn manager_with(name: &'static str, behavior: Behavior) -> (ToolManager, Arc<CountingTool>) {
        let tool = Arc::new(CountingTool {
            invocations: AtomicU32::new(0),
            behavior,
            name,
        });
        let mut manager = ToolManager::new(2);
        manager.retry = manager.retry.clone().with_initial_backoff(1).with_jitter(false);
        manager.register(tool.clone());
        (manager, tool)
    }

    #[tokio::test]
    async fn second_identical_call_hits_the_cache() {
        let (manager, tool) = manager_with("echo", Behavior::Ok);
        let call = ToolCall::new("echo", serde_json::json!({"b": 2, "a": 1}));
        let reordered = ToolCall::new("Echo", serde_json::json!({"a": 1, "b": 2}));

        let first = manager.invoke_with_cache(&call).await.unwrap();
        let second = manager.invoke_with_cache(&reordered).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(tool.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(manager.cached_results(), 1);
    }

    #[tokio::test]
    async fn extract_zip_results_are_never_cached() {
        let (manager, tool) = manager_with("extract_zip", Behavior::Ok);
        let call = ToolCall::new("extract_zip", serde_json::json!({"zip_path": "/a.zip"}));

        manager.invoke_with_cache(&call).await.unwrap();
        manager.invoke_with_cache(&call).await.unwrap();

        assert_eq!(tool.invocations.load(Ordering::SeqCst), 2);
        assert_eq!(manager.cached_results(), 0);
    }

    #[tokio::test]
    async fn unknown_tool_returns_none() {
        let manager = ToolManager::new(2);
        let call = ToolCall::new("missing", serde_json::json!({}));
        assert!(manager.invoke_with_cache(&call).await.is_none());
    }

    #[tokio::test]
    async fn transient_errors_retry_until_success() {
        let (manager, tool) = manager_with("flaky", Behavior::TransientThenOk(2));
        let call = ToolCall::new("flaky", serde_json::json!({}));

        let output = manager.invoke_with_cache(&call).await.unwrap();
        assert_eq!(output, Value::String("recovered".into()));
        assert_eq!(tool.invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_return_the_fixed_string() {
        let (manager, _tool) = manager_with("down", Behavior::AlwaysTransient);
        let call = ToolCall::new("down", serde_json::json!({}));

        let output = manager.invoke_with_cache(&call).await.unwrap();
        assert_eq!(output, Value::String(INVOCATION_FAILED_RETRIES.into()));
    }

    #[tokio::test]
    async fn non_transient_failure_stops_immediately() {
        let (manager, tool) = manager_with("broken", Behavior::AlwaysFailed);
        let call = ToolCall::new("broken", serde_json::json!({}));

        let output = manager.invoke_with_cache(&call).await.unwrap();
        assert_eq!(output, Value::String(INVOCATION_FAILED.into()));
        assert_eq!(tool.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn argument_unpack_fallback_passes_single_value() {
        let (manager, _tool) = manager_with("bare", Behavior::NeedsBareValue);
        let call = ToolCall::new("bare", serde_json::json!({"query": "hello"}));

        let output = manager.invoke_with_cache(&call).await.unwrap();
        assert_eq!(output, Value::String("bare:hello".into()));
    }

    #[tokio::test]
    async fn specs_are_sorted_by_name() {
        let (mut manager, _tool) = manager_with("zeta", Behavior::Ok);
        manager.register(Arc::new(CountingTool {
            invocations: AtomicU32::new(0),
            behavior: Behavior::Ok,
            name: "alpha",
        }));

        let names: Vec<String> = manager.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
