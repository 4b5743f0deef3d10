//! Routes model tool calls to the backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

use super::catalog::BrowserTool;
use super::ToolBackend;
use crate::llm::ToolCall;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{message}")]
    Execution { tool: BrowserTool, message: String },

    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    Timeout { tool: BrowserTool, timeout: Duration },
}

/// Backend output after the size cap has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub tool: BrowserTool,
    pub arguments: Value,
    pub content: String,
    pub truncated: bool,
}

pub struct ToolDispatcher {
    backend: Arc<dyn ToolBackend>,
    result_cap: usize,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(backend: Arc<dyn ToolBackend>, result_cap: usize, timeout: Duration) -> Self {
        Self {
            backend,
            result_cap,
            timeout,
        }
    }

    pub fn result_cap(&self) -> usize {
        self.result_cap
    }

    /// Resolve, validate and execute one tool call.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutput, DispatchError> {
        let name = call.function.name.as_str();
        let tool: BrowserTool = name
            .parse()
            .map_err(DispatchError::UnknownTool)?;

        let arguments = parse_arguments(&call.function.arguments).map_err(|reason| {
            DispatchError::InvalidArguments {
                tool: name.to_string(),
                reason,
            }
        })?;
        tool.validate(&arguments)
            .map_err(|reason| DispatchError::InvalidArguments {
                tool: name.to_string(),
                reason,
            })?;

        tracing::info!(tool = %tool, call_id = %call.id, args = %arguments, "Dispatching tool call");

        let raw = tokio::time::timeout(self.timeout, self.backend.call_tool(tool.name(), arguments.clone()))
            .await
            .map_err(|_| DispatchError::Timeout {
                tool,
                timeout: self.timeout,
            })?
            .map_err(|e| DispatchError::Execution {
                tool,
                message: format!("{:#}", e),
            })?;

        let (content, truncated) = truncate_chars(&raw, self.result_cap);
        if truncated {
            tracing::debug!(tool = %tool, cap = self.result_cap, "Tool result truncated");
        }

        Ok(ToolOutput {
            tool,
            arguments,
            content,
            truncated,
        })
    }
}

fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {}", e))
}

/// Keep at most `cap` characters, reporting whether anything was dropped.
pub fn truncate_chars(text: &str, cap: usize) -> (String, bool) {
    match text.char_indices().nth(cap) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::StubBackend;

    fn dispatcher(backend: Arc<StubBackend>) -> ToolDispatcher {
        ToolDispatcher::new(backend, 5000, Duration::from_secs(5))
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new("call_1", name, &args)
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), ("hé".to_string(), true));
        assert_eq!(truncate_chars("héllo", 5), ("héllo".to_string(), false));
        assert_eq!(truncate_chars("", 0), (String::new(), false));
    }

    #[tokio::test]
    async fn long_result_is_capped_and_flagged() {
        let backend = Arc::new(StubBackend::new().reply("browser_snapshot", &"x".repeat(5001)));
        let out = dispatcher(backend)
            .dispatch(&call("browser_snapshot", json!({})))
            .await
            .unwrap();
        assert_eq!(out.content.chars().count(), 5000);
        assert!(out.truncated);
    }

    #[tokio::test]
    async fn short_result_is_verbatim() {
        let backend = Arc::new(StubBackend::new().reply("browser_snapshot", "- heading \"Done\" [level=3]"));
        let out = dispatcher(backend)
            .dispatch(&call("browser_snapshot", json!({})))
            .await
            .unwrap();
        assert_eq!(out.content, "- heading \"Done\" [level=3]");
        assert!(!out.truncated);
        assert_eq!(out.tool, BrowserTool::Snapshot);
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_backend() {
        let backend = Arc::new(StubBackend::new());
        let err = dispatcher(backend.clone())
            .dispatch(&call("browser_install", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTool(ref n) if n == "browser_install"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_backend() {
        let backend = Arc::new(StubBackend::new());
        let err = dispatcher(backend.clone())
            .dispatch(&call("browser_navigate", json!({"href": "http://x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArguments { .. }));
        assert!(err.to_string().contains("missing required field 'url'"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_arguments_are_invalid() {
        let backend = Arc::new(StubBackend::new());
        let mut bad = call("browser_navigate", json!({}));
        bad.function.arguments = "{\"url\": ".to_string();
        let err = dispatcher(backend).dispatch(&bad).await.unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn empty_argument_string_means_no_arguments() {
        let backend = Arc::new(StubBackend::new().reply("browser_snapshot", "ok"));
        let mut snap = call("browser_snapshot", json!({}));
        snap.function.arguments = String::new();
        let out = dispatcher(backend).dispatch(&snap).await.unwrap();
        assert_eq!(out.arguments, json!({}));
    }

    #[tokio::test]
    async fn backend_failure_is_an_execution_error() {
        let backend = Arc::new(StubBackend::new().fail("browser_click", "Element not found"));
        let err = dispatcher(backend)
            .dispatch(&call("browser_click", json!({"ref": "e1", "element": "Save"})))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Execution { tool: BrowserTool::Click, .. }));
        assert_eq!(err.to_string(), "Element not found");
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let backend = Arc::new(
            StubBackend::new()
                .reply("browser_wait_for", "done")
                .delay(Duration::from_millis(200)),
        );
        let dispatcher = ToolDispatcher::new(backend, 5000, Duration::from_millis(20));
        let err = dispatcher
            .dispatch(&call("browser_wait_for", json!({"time": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { tool: BrowserTool::WaitFor, .. }));
    }
}
