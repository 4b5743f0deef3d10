//! Tool backend backed by the Playwright MCP server.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::catalog::BrowserTool;
use super::ToolBackend;
use crate::mcp::McpClient;

pub struct PlaywrightBackend {
    client: Arc<McpClient>,
}

impl PlaywrightBackend {
    /// Spawn the browser MCP server and check it offers the catalog tools.
    pub async fn connect(command: &[String]) -> anyhow::Result<Self> {
        let client = McpClient::connect_local("playwright", command).await?;
        let backend = Self::new(Arc::new(client));

        let advertised: Vec<String> = backend
            .client
            .list_tools()
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();
        tracing::info!("Playwright MCP ready: {} tools available", advertised.len());

        for missing in missing_tools(&advertised) {
            tracing::warn!("Playwright MCP does not advertise catalog tool {}", missing);
        }

        Ok(backend)
    }

    pub fn new(client: Arc<McpClient>) -> Self {
        Self { client }
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        self.client.close().await
    }
}

#[async_trait]
impl ToolBackend for PlaywrightBackend {
    async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String> {
        let result = self.client.call_tool(name, arguments).await?;
        Ok(result.to_text())
    }
}

/// Catalog tools absent from the backend's advertised list.
fn missing_tools(advertised: &[String]) -> Vec<BrowserTool> {
    BrowserTool::ALL
        .into_iter()
        .filter(|tool| !advertised.iter().any(|name| name == tool.name()))
        .collect()
}
