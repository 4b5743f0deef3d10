//! MCP client used for both the browser backend and the resource server.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::transport::{StdioTransport, Transport};
use super::types::{
    methods, CallToolParams, CallToolResult, ClientInfo, InitializeParams, InitializeResult,
    JsonRpcRequest, ListResourcesResult, ListToolsResult, McpTool, ReadResourceParams,
    ReadResourceResult, ResourceContents, MCP_PROTOCOL_VERSION,
};

pub struct McpClient {
    transport: Arc<dyn Transport>,
    server_name: String,
    next_id: AtomicI64,
}

impl McpClient {
    pub fn new(transport: impl Transport + 'static, server_name: impl Into<String>) -> Self {
        Self {
            transport: Arc::new(transport),
            server_name: server_name.into(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Spawn a local MCP server and complete the initialize handshake.
    pub async fn connect_local(server_name: impl Into<String>, command: &[String]) -> Result<Self> {
        let name = server_name.into();
        tracing::info!("Connecting to local MCP server {}: {}", name, command.join(" "));

        let transport = StdioTransport::spawn(command)?;
        let client = Self::new(transport, name);
        client.initialize().await?;
        Ok(client)
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION.into(),
            capabilities: Value::Object(Default::default()),
            client_info: ClientInfo {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        };

        let result: InitializeResult = self
            .request(methods::INITIALIZE, Some(serde_json::to_value(&params)?))
            .await?;

        match &result.server_info {
            Some(info) => tracing::info!(
                "MCP server {} initialized: {} v{} (protocol {})",
                self.server_name,
                info.name,
                info.version,
                result.protocol_version
            ),
            None => tracing::info!("MCP server {} initialized", self.server_name),
        }

        self.transport
            .notify(&JsonRpcRequest::notification(methods::INITIALIZED))
            .await?;

        Ok(result)
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let result: ListToolsResult = self.request(methods::TOOLS_LIST, None).await?;
        Ok(result.tools)
    }

    /// Call a tool. JSON-RPC level errors and `isError` results both surface as `Err`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.into(),
            arguments,
        };
        tracing::debug!("Calling MCP tool {} on {}", name, self.server_name);

        let result: CallToolResult = self
            .request(methods::TOOLS_CALL, Some(serde_json::to_value(&params)?))
            .await?;

        if result.is_error {
            bail!("{}", result.to_text());
        }
        Ok(result)
    }

    pub async fn list_resources(&self) -> Result<Vec<String>> {
        let result: ListResourcesResult = self.request(methods::RESOURCES_LIST, None).await?;
        Ok(result.resources.into_iter().map(|r| r.uri).collect())
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let result: ReadResourceResult = self
            .request(
                methods::RESOURCES_READ,
                Some(serde_json::to_value(ReadResourceParams { uri: uri.into() })?),
            )
            .await?;
        Ok(result.contents)
    }

    pub async fn close(&self) -> Result<()> {
        tracing::info!("Closing MCP client: {}", self.server_name);
        self.transport.close().await
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut request = JsonRpcRequest::new(id, method);
        if let Some(params) = params {
            request = request.with_params(params);
        }

        let response = self.transport.send(&request).await?;

        if let Some(error) = response.error {
            bail!("MCP {} failed: {} ({})", method, error.message, error.code);
        }

        let result = response
            .result
            .with_context(|| format!("MCP {} returned no result", method))?;
        serde_json::from_value(result).with_context(|| format!("Failed to parse MCP {} result", method))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mcp::types::{JsonRpcError, JsonRpcResponse};
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays canned responses and records every request it sees.
    pub(crate) struct MockTransport {
        responses: Mutex<Vec<JsonRpcResponse>>,
        pub(crate) seen: Arc<Mutex<Vec<JsonRpcRequest>>>,
    }

    impl MockTransport {
        pub(crate) fn new(responses: Vec<JsonRpcResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
            self.seen.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                bail!("No more mock responses");
            }
            Ok(responses.remove(0))
        }

        async fn notify(&self, request: &JsonRpcRequest) -> Result<()> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn initialize_sends_initialized_notification() {
        let transport = MockTransport::new(vec![JsonRpcResponse::success(
            1,
            json!({"protocolVersion": "2024-11-05", "serverInfo": {"name": "playwright", "version": "0.0.1"}}),
        )]);
        let seen = transport.seen.clone();
        let client = McpClient::new(transport, "playwright");

        let result = client.initialize().await.unwrap();
        assert_eq!(result.server_info.unwrap().name, "playwright");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, "initialize");
        assert_eq!(seen[1].method, "notifications/initialized");
        assert!(seen[1].id.is_none());
    }

    #[tokio::test]
    async fn tool_error_result_becomes_err() {
        let transport = MockTransport::new(vec![JsonRpcResponse::success(
            1,
            json!({"content": [{"type": "text", "text": "Element ref e9 not found"}], "isError": true}),
        )]);
        let client = McpClient::new(transport, "playwright");

        let err = client
            .call_tool("browser_click", json!({"ref": "e9", "element": "Save"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("e9 not found"));
    }

    #[tokio::test]
    async fn json_rpc_error_mentions_method() {
        let transport = MockTransport::new(vec![JsonRpcResponse::error(
            Some(1),
            JsonRpcError::new(-32002, "Resource not found"),
        )]);
        let client = McpClient::new(transport, "board");

        let err = client.read_resource("ui://snapshot/html").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("resources/read"));
        assert!(msg.contains("Resource not found"));
    }

    #[tokio::test]
    async fn request_ids_increase() {
        let transport = MockTransport::new(vec![
            JsonRpcResponse::success(1, json!({"resources": [{"uri": "assignments://all"}]})),
            JsonRpcResponse::success(2, json!({"tools": [{"name": "browser_snapshot"}]})),
        ]);
        let seen = transport.seen.clone();
        let client = McpClient::new(transport, "board");

        assert_eq!(client.list_resources().await.unwrap(), vec!["assignments://all"]);
        assert_eq!(client.list_tools().await.unwrap()[0].name, "browser_snapshot");

        let ids: Vec<_> = seen.lock().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
    }
}
