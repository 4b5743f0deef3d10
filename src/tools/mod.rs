//! Browser tools the model can call.
//!
//! The catalog is fixed ([`BrowserTool`]); execution is delegated to a
//! [`ToolBackend`], normally the Playwright MCP server.

mod catalog;
mod dispatcher;
mod playwright;

use async_trait::async_trait;
use serde_json::Value;

pub use catalog::{tool_schemas, BrowserTool, ToolEffect};
pub use dispatcher::{truncate_chars, DispatchError, ToolDispatcher, ToolOutput};
pub use playwright::PlaywrightBackend;

/// Stateful automation target that executes named actions.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Execute one action and return its textual result.
    async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String>;
}
