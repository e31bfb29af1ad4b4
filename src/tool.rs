//! The tool registry (C1): registration, schema validation, and
//! retry/timeout-aware invocation of tool calls emitted by the model.
//!
//! Tool failures are never raised as [`crate::error::Error`] — a failed
//! invocation is a value (`ToolResult` carrying a failure payload) so the
//! step loop can thread it back to the model as a normal turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorCode, Result};
use crate::message::ToolCallRequest;

/// A tool's advertised shape: what the model is told exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name the model refers to the tool by.
    pub name: String,
    /// Natural-language description shown to the model.
    pub description: String,
    /// JSON Schema (object) describing accepted parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Build a definition, generating the parameter schema from `T` via
    /// `schemars`.
    #[must_use]
    pub fn new<T: schemars::JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        let schema = schemars::schema_for!(T);
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({})),
        }
    }

    fn validate_shape(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidToolDefinition("name must not be empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(Error::InvalidToolDefinition(format!(
                "tool '{}' is missing a description",
                self.name
            )));
        }
        if !self.parameters.is_object() {
            return Err(Error::InvalidToolDefinition(format!(
                "tool '{}' parameters schema must be a JSON object",
                self.name
            )));
        }
        Ok(())
    }

    /// Validate a candidate parameter payload against this schema's
    /// `required` list and declared `properties` types.
    ///
    /// This is a structural subset check, not a full JSON Schema
    /// implementation: it is sufficient for the registry's own
    /// `VALIDATION_ERROR` reporting without pulling in a schema-validation
    /// crate the rest of the runtime has no other use for.
    fn validate_params(&self, params: &Value) -> std::result::Result<(), Vec<String>> {
        let mut violations = Vec::new();

        let Some(schema) = self.parameters.as_object() else {
            return Ok(());
        };

        let Some(obj) = params.as_object() else {
            if schema.contains_key("properties") || schema.contains_key("required") {
                violations.push("parameters must be a JSON object".to_string());
            }
            return if violations.is_empty() { Ok(()) } else { Err(violations) };
        };

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for req in required {
                if let Some(field) = req.as_str() {
                    if !obj.contains_key(field) {
                        violations.push(format!("missing required field '{field}'"));
                    }
                }
            }
        }

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, value) in obj {
                let Some(prop_schema) = properties.get(key).and_then(Value::as_object) else {
                    continue;
                };
                let Some(expected_ty) = prop_schema.get("type").and_then(Value::as_str) else {
                    continue;
                };
                if !json_type_matches(expected_ty, value) {
                    violations.push(format!(
                        "field '{key}' expected type '{expected_ty}', got '{}'",
                        json_type_name(value)
                    ));
                }
            }
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn json_type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// A structured failure returned by a tool's own execution, distinct from
/// schema-validation failures which the registry produces itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    /// Human-readable failure message.
    pub message: String,
    /// Optional longer-form detail (a captured underlying error's `Display`,
    /// stack-trace-like diagnostic text, etc).
    pub detail: Option<String>,
}

impl ToolError {
    /// Build a tool error with no additional detail.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Attach detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ToolError {}

/// A tool's own async execution contract. Implementors describe one
/// capability; parameter shape is described separately via
/// [`ToolDefinition`] (usually generated from `Args` with `schemars`).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Strongly typed parameters this tool accepts.
    type Args: serde::de::DeserializeOwned + Send;
    /// Strongly typed successful output.
    type Output: Serialize + Send;

    /// Stable name the model and registry refer to this tool by.
    fn name(&self) -> &str;

    /// Natural-language description shown to the model.
    fn description(&self) -> &str;

    /// Execute the tool against already-deserialized arguments.
    async fn call(&self, args: Self::Args) -> std::result::Result<Self::Output, ToolError>;
}

/// Object-safe view over a [`Tool`], operating on untyped JSON so a
/// registry can hold a heterogeneous collection of tools.
#[async_trait]
pub trait DynTool: Send + Sync {
    /// Stable name the model and registry refer to this tool by.
    fn name(&self) -> &str;

    /// Natural-language description shown to the model.
    fn description(&self) -> &str;

    /// Execute against untyped parameters, deserializing internally.
    async fn call_json(&self, params: Value) -> std::result::Result<Value, ToolError>;
}

#[async_trait]
impl<T> DynTool for T
where
    T: Tool,
    T::Args: 'static,
    T::Output: 'static,
{
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn description(&self) -> &str {
        Tool::description(self)
    }

    async fn call_json(&self, params: Value) -> std::result::Result<Value, ToolError> {
        let args: T::Args = serde_json::from_value(params)
            .map_err(|e| ToolError::new(format!("failed to parse arguments: {e}")))?;
        let output = self.call(args).await?;
        serde_json::to_value(output).map_err(|e| ToolError::new(format!("failed to serialize result: {e}")))
    }
}

/// Retry behaviour applied to a single tool's invocations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Number of attempts before giving up, inclusive of the first try.
    /// Must be at least 1.
    pub max_attempts: u32,
    /// Backoff unit; the wait before attempt `n` (zero-indexed) is
    /// `base_backoff_ms * (n + 1)`.
    pub base_backoff_ms: u64,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_backoff_ms: 0,
        }
    }

    /// Build a retry policy, clamping `max_attempts` to at least 1.
    #[must_use]
    pub const fn new(max_attempts: u32, base_backoff_ms: u64) -> Self {
        let max_attempts = if max_attempts == 0 { 1 } else { max_attempts };
        Self {
            max_attempts,
            base_backoff_ms,
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms * u64::from(attempt + 1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Outcome payload of a completed invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool produced a value.
    Success {
        /// The tool's JSON return value.
        payload: Value,
    },
    /// The tool failed after exhausting its retry budget.
    Failure {
        /// Error message.
        message: String,
        /// Stable error code (`TOOL_NOT_FOUND`, `VALIDATION_ERROR`,
        /// `EXECUTION_ERROR`, or `TIMEOUT`).
        code: &'static str,
        /// Optional structured detail (validation violations, captured
        /// underlying error text).
        detail: Option<Vec<String>>,
    },
}

/// Bookkeeping attached to every invocation regardless of outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToolResultMetadata {
    /// Total wall-clock time spent across all attempts, in milliseconds.
    pub duration_ms: u64,
    /// Unix epoch milliseconds at which the invocation finished.
    pub completed_at_ms: u64,
    /// Zero-indexed count of retries performed (0 if it succeeded or failed
    /// on the first attempt).
    pub retry_count: u32,
}

/// The result of invoking one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Echoes the originating `ToolCallRequest::id`.
    pub id: String,
    /// Echoes the originating `ToolCallRequest::name`.
    pub name: String,
    /// What happened.
    pub outcome: ToolOutcome,
    /// Timing and retry bookkeeping.
    pub metadata: ToolResultMetadata,
}

impl ToolResult {
    /// `true` if the invocation produced a value.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    fn finish(id: String, name: String, outcome: ToolOutcome, started: Instant, retry_count: u32) -> Self {
        Self {
            id,
            name,
            outcome,
            metadata: ToolResultMetadata {
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                completed_at_ms: now_unix_ms(),
                retry_count,
            },
        }
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

struct RegisteredTool {
    dyn_tool: Arc<dyn DynTool>,
    definition: ToolDefinition,
    retry: RetryPolicy,
    timeout: Option<Duration>,
}

/// The tool registry (C1): holds every tool the agent may call, advertises
/// their definitions to the model, and executes invocations with
/// schema validation, retry-with-backoff, and per-tool timeout.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own [`DynTool::name`].
    ///
    /// Rejects a tool with an empty name/description/non-object schema, and
    /// rejects re-registering a name that is still present. Call
    /// [`ToolRegistry::unregister`] first to replace a tool.
    pub fn register(
        &mut self,
        tool: Arc<dyn DynTool>,
        definition: ToolDefinition,
        retry: RetryPolicy,
        timeout: Option<Duration>,
    ) -> Result<()> {
        definition.validate_shape()?;
        if definition.name != tool.name() {
            return Err(Error::InvalidToolDefinition(format!(
                "definition name '{}' does not match tool name '{}'",
                definition.name,
                tool.name()
            )));
        }
        if self.tools.contains_key(&definition.name) {
            return Err(Error::DuplicateToolName(definition.name));
        }
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                dyn_tool: tool,
                definition,
                retry,
                timeout,
            },
        );
        Ok(())
    }

    /// Remove a tool, freeing its name for a later `register` call.
    /// Returns `true` if a tool was present under that name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// `true` if a tool is registered under this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// The definitions of every registered tool, in the shape handed to
    /// [`crate::chat::ChatRequest::with_tools`].
    #[must_use]
    pub fn advertise(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// Invoke one tool call: look it up, validate its parameters, then
    /// execute with retry-with-backoff and a per-tool timeout.
    ///
    /// Never returns `Err` — every failure mode is represented as a
    /// [`ToolOutcome::Failure`] inside the returned [`ToolResult`].
    #[tracing::instrument(skip(self, request), fields(tool = %request.name, call_id = %request.id))]
    pub async fn invoke(&self, request: &ToolCallRequest) -> ToolResult {
        let started = Instant::now();

        let Some(registered) = self.tools.get(&request.name) else {
            tracing::warn!(tool = %request.name, "tool not found");
            return ToolResult::finish(
                request.id.clone(),
                request.name.clone(),
                ToolOutcome::Failure {
                    message: format!("no tool registered under name '{}'", request.name),
                    code: ErrorCode::ToolNotFound.as_str(),
                    detail: None,
                },
                started,
                0,
            );
        };

        if let Err(violations) = registered.definition.validate_params(&request.parameters) {
            tracing::warn!(tool = %request.name, violations = violations.len(), "parameter validation failed");
            return ToolResult::finish(
                request.id.clone(),
                request.name.clone(),
                ToolOutcome::Failure {
                    message: "parameters failed schema validation".to_string(),
                    code: ErrorCode::ValidationError.as_str(),
                    detail: Some(violations),
                },
                started,
                0,
            );
        }

        let mut last_error: Option<ToolError> = None;

        for attempt in 0..registered.retry.max_attempts {
            if attempt > 0 {
                let wait = registered.retry.backoff_for(attempt - 1);
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }

            let call = registered.dyn_tool.call_json(request.parameters.clone());
            let attempt_result = match registered.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::new(format!("Timeout: tool exceeded {}ms", timeout.as_millis()))),
                },
                None => call.await,
            };

            match attempt_result {
                Ok(payload) => {
                    return ToolResult::finish(
                        request.id.clone(),
                        request.name.clone(),
                        ToolOutcome::Success { payload },
                        started,
                        attempt,
                    );
                }
                Err(err) => {
                    tracing::debug!(tool = %request.name, attempt, error = %err, "tool attempt failed");
                    last_error = Some(err);
                }
            }
        }

        let retry_count = registered.retry.max_attempts.saturating_sub(1);
        let err = last_error.unwrap_or_else(|| ToolError::new("tool failed with no captured error"));
        ToolResult::finish(
            request.id.clone(),
            request.name.clone(),
            ToolOutcome::Failure {
                message: err.message,
                code: ErrorCode::ExecutionError.as_str(),
                detail: err.detail.map(|d| vec![d]),
            },
            started,
            retry_count,
        )
    }

    /// Invoke many tool calls concurrently, preserving each result's own
    /// `id`/`name` identity but making no guarantee about output order
    /// relative to `requests`.
    pub async fn invoke_batch(&self, requests: &[ToolCallRequest]) -> Vec<ToolResult> {
        let futures = requests.iter().map(|r| self.invoke(r));
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        type Args = Value;
        type Output = Value;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes its input"
        }

        async fn call(&self, args: Self::Args) -> std::result::Result<Self::Output, ToolError> {
            Ok(args)
        }
    }

    struct FlakyThenOk {
        remaining_failures: AtomicU32,
    }

    #[async_trait]
    impl Tool for FlakyThenOk {
        type Args = Value;
        type Output = Value;

        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "fails a fixed number of times then succeeds"
        }

        async fn call(&self, args: Self::Args) -> std::result::Result<Self::Output, ToolError> {
            if self.remaining_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n == 0 { None } else { Some(n - 1) }
            }).is_ok() {
                return Err(ToolError::new("not yet"));
            }
            Ok(args)
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        type Args = Value;
        type Output = Value;

        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "never returns within any reasonable timeout"
        }

        async fn call(&self, _args: Self::Args) -> std::result::Result<Self::Output, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    fn echo_definition() -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: "echoes its input".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "value": { "type": "string" } },
                "required": ["value"],
            }),
        }
    }

    #[tokio::test]
    async fn register_rejects_missing_description() {
        let mut registry = ToolRegistry::new();
        let def = ToolDefinition {
            name: "x".to_string(),
            description: String::new(),
            parameters: serde_json::json!({}),
        };
        let err = registry
            .register(Arc::new(Echo), def, RetryPolicy::none(), None)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidToolDefinition);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_name() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(Echo), echo_definition(), RetryPolicy::none(), None)
            .unwrap();
        let err = registry
            .register(Arc::new(Echo), echo_definition(), RetryPolicy::none(), None)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateToolName);
    }

    #[tokio::test]
    async fn unregister_allows_idempotent_reregistration() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(Echo), echo_definition(), RetryPolicy::none(), None)
            .unwrap();
        assert!(registry.unregister("echo"));
        registry
            .register(Arc::new(Echo), echo_definition(), RetryPolicy::none(), None)
            .unwrap();
    }

    #[tokio::test]
    async fn invoke_unknown_tool_yields_tool_not_found() {
        let registry = ToolRegistry::new();
        let result = registry
            .invoke(&ToolCallRequest::new("c1", "missing", serde_json::json!({})))
            .await;
        match result.outcome {
            ToolOutcome::Failure { code, .. } => assert_eq!(code, ErrorCode::ToolNotFound.as_str()),
            ToolOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn invoke_rejects_missing_required_field() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(Echo), echo_definition(), RetryPolicy::none(), None)
            .unwrap();
        let result = registry
            .invoke(&ToolCallRequest::new("c1", "echo", serde_json::json!({})))
            .await;
        match result.outcome {
            ToolOutcome::Failure { code, detail, .. } => {
                assert_eq!(code, ErrorCode::ValidationError.as_str());
                assert!(detail.unwrap()[0].contains("value"));
            }
            ToolOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn invoke_succeeds_and_reports_zero_retries() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(Echo), echo_definition(), RetryPolicy::none(), None)
            .unwrap();
        let result = registry
            .invoke(&ToolCallRequest::new("c1", "echo", serde_json::json!({"value": "hi"})))
            .await;
        assert!(result.is_success());
        assert_eq!(result.metadata.retry_count, 0);
    }

    #[tokio::test]
    async fn invoke_retries_then_succeeds_with_matching_retry_count() {
        let mut registry = ToolRegistry::new();
        let def = ToolDefinition {
            name: "flaky".to_string(),
            description: "fails then succeeds".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        registry
            .register(
                Arc::new(FlakyThenOk { remaining_failures: AtomicU32::new(2) }),
                def,
                RetryPolicy::new(5, 1),
                None,
            )
            .unwrap();
        let result = registry
            .invoke(&ToolCallRequest::new("c1", "flaky", serde_json::json!({})))
            .await;
        assert!(result.is_success());
        assert_eq!(result.metadata.retry_count, 2);
    }

    #[tokio::test]
    async fn invoke_exhausts_retries_and_yields_execution_error() {
        let mut registry = ToolRegistry::new();
        let def = ToolDefinition {
            name: "flaky".to_string(),
            description: "always fails".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        registry
            .register(
                Arc::new(FlakyThenOk { remaining_failures: AtomicU32::new(100) }),
                def,
                RetryPolicy::new(3, 0),
                None,
            )
            .unwrap();
        let result = registry
            .invoke(&ToolCallRequest::new("c1", "flaky", serde_json::json!({})))
            .await;
        match result.outcome {
            ToolOutcome::Failure { code, .. } => assert_eq!(code, ErrorCode::ExecutionError.as_str()),
            ToolOutcome::Success { .. } => panic!("expected failure"),
        }
        assert_eq!(result.metadata.retry_count, 2);
    }

    #[tokio::test]
    async fn invoke_times_out_with_execution_error_code() {
        let mut registry = ToolRegistry::new();
        let def = ToolDefinition {
            name: "slow".to_string(),
            description: "never returns".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        registry
            .register(Arc::new(Slow), def, RetryPolicy::none(), Some(Duration::from_millis(10)))
            .unwrap();
        let result = registry
            .invoke(&ToolCallRequest::new("c1", "slow", serde_json::json!({})))
            .await;
        match result.outcome {
            ToolOutcome::Failure { code, message, .. } => {
                assert_eq!(code, ErrorCode::ExecutionError.as_str());
                assert!(message.contains("Timeout"));
            }
            ToolOutcome::Success { .. } => panic!("expected timeout failure"),
        }
    }

    #[tokio::test]
    async fn invoke_batch_runs_concurrently_in_roughly_one_latency() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(Echo), echo_definition(), RetryPolicy::none(), None)
            .unwrap();
        let requests = vec![
            ToolCallRequest::new("c1", "echo", serde_json::json!({"value": "a"})),
            ToolCallRequest::new("c2", "echo", serde_json::json!({"value": "b"})),
            ToolCallRequest::new("c3", "echo", serde_json::json!({"value": "c"})),
        ];
        let results = registry.invoke_batch(&requests).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(ToolResult::is_success));
    }
}
