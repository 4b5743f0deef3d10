//! MCP server exposing a [`ResourceProvider`] over newline-delimited JSON-RPC.
//!
//! Serves `initialize`, `resources/list` and `resources/read`. A resource the
//! provider cannot find is answered in-band with `Error: ...` text, which
//! [`McpResourceProvider`](crate::resources::McpResourceProvider) reads back as
//! not found.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::types::{
    methods, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListResourcesResult, McpResource, ReadResourceParams, ReadResourceResult, ResourceContents,
    ServerInfo, MCP_PROTOCOL_VERSION,
};
use crate::resources::{
    ResourceError, ResourceProvider, ACCESSIBILITY_SNAPSHOT_URI, ASSIGNMENTS_URI,
    HTML_SNAPSHOT_URI,
};

pub struct McpResourceServer {
    provider: Arc<dyn ResourceProvider>,
}

impl McpResourceServer {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self { provider }
    }

    /// Handle one request. `None` for notifications, which get no reply.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            tracing::debug!("Received notification: {}", request.method);
            return None;
        };

        let response = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(id),
            methods::RESOURCES_LIST => self.handle_resources_list(id).await,
            methods::RESOURCES_READ => self.handle_resources_read(id, request.params).await,
            other => JsonRpcResponse::error(Some(id), JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: i64) -> JsonRpcResponse {
        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.into(),
            capabilities: serde_json::json!({ "resources": {} }),
            server_info: Some(ServerInfo {
                name: "agile-qa-board".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            }),
        };
        respond(id, &result)
    }

    async fn handle_resources_list(&self, id: i64) -> JsonRpcResponse {
        match self.provider.list_resources().await {
            Ok(uris) => respond(
                id,
                &ListResourcesResult {
                    resources: uris.into_iter().map(describe).collect(),
                },
            ),
            Err(e) => JsonRpcResponse::error(Some(id), JsonRpcError::internal_error(e.to_string())),
        }
    }

    async fn handle_resources_read(&self, id: i64, params: Option<Value>) -> JsonRpcResponse {
        let params: ReadResourceParams = match params.map(serde_json::from_value::<ReadResourceParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::invalid_params(format!("Invalid resources/read params: {}", e)),
                )
            }
            None => {
                return JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::invalid_params("Missing resources/read params"),
                )
            }
        };

        let text = match self.provider.read_resource(&params.uri).await {
            Ok(text) => text,
            Err(ResourceError::NotFound(what)) => {
                tracing::warn!("Resource not found: {}", what);
                format!("Error: resource not found: {}", what)
            }
            Err(e) => {
                tracing::error!("Failed to read {}: {}", params.uri, e);
                return JsonRpcResponse::error(Some(id), JsonRpcError::internal_error(e.to_string()));
            }
        };

        let resource = describe(params.uri);
        respond(
            id,
            &ReadResourceResult {
                contents: vec![ResourceContents {
                    uri: resource.uri,
                    mime_type: resource.mime_type,
                    text: Some(text),
                }],
            },
        )
    }

    /// Serve requests from `reader` until it reaches end of input.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                tracing::info!("MCP client closed connection");
                break;
            }

            let trimmed = line.trim();
            if !trimmed.starts_with('{') {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
                )),
            };

            if let Some(response) = response {
                let mut json = serde_json::to_string(&response)?;
                json.push('\n');
                writer.write_all(json.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Serve on this process's stdin and stdout.
    pub async fn serve_stdio(&self) -> Result<()> {
        tracing::info!("Starting board resource server on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

fn respond(id: i64, result: &impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            Some(id),
            JsonRpcError::internal_error(format!("Failed to serialize response: {}", e)),
        ),
    }
}

fn describe(uri: String) -> McpResource {
    let (name, mime_type) = match uri.as_str() {
        ASSIGNMENTS_URI => ("assignments", "application/json"),
        ACCESSIBILITY_SNAPSHOT_URI => ("ui_accessibility_snapshot", "application/json"),
        HTML_SNAPSHOT_URI => ("ui_html_snapshot", "text/html"),
        _ => {
            return McpResource {
                uri,
                name: None,
                mime_type: None,
            }
        }
    };
    McpResource {
        uri,
        name: Some(name.into()),
        mime_type: Some(mime_type.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::board;
    use crate::mcp::{LineTransport, McpClient};
    use crate::resources::tests::StaticResources;
    use crate::resources::{BoardResources, McpResourceProvider, ResourceSnapshot};

    fn server() -> McpResourceServer {
        McpResourceServer::new(Arc::new(
            StaticResources::default().with(ASSIGNMENTS_URI, r#"[{"id": 1}]"#),
        ))
    }

    #[tokio::test]
    async fn initialize_advertises_resources() {
        let response = server()
            .handle_request(JsonRpcRequest::new(1, methods::INITIALIZE))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert!(result["capabilities"]["resources"].is_object());
        assert_eq!(result["serverInfo"]["name"], "agile-qa-board");
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let response = server()
            .handle_request(JsonRpcRequest::notification(methods::INITIALIZED))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn unknown_methods_and_bad_params_are_json_rpc_errors() {
        let server = server();

        let response = server
            .handle_request(JsonRpcRequest::new(2, methods::TOOLS_LIST))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);

        let response = server
            .handle_request(JsonRpcRequest::new(3, methods::RESOURCES_READ).with_params(json!({"path": "x"})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn missing_resource_is_reported_in_band() {
        let response = server()
            .handle_request(
                JsonRpcRequest::new(4, methods::RESOURCES_READ)
                    .with_params(json!({"uri": HTML_SNAPSHOT_URI})),
            )
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["contents"][0]["mimeType"], "text/html");
        assert!(result["contents"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error: resource not found"));
    }

    #[tokio::test]
    async fn garbage_line_gets_a_parse_error() {
        let input = b"not json\n{broken\n".to_vec();
        let mut output = Vec::new();

        server().serve(&input[..], &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["error"]["code"], -32700);
        assert_eq!(replies[0]["jsonrpc"], "2.0");
    }

    #[tokio::test]
    async fn board_resources_round_trip_through_an_mcp_client() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("agile_board.db");
        board::init_db(&db).unwrap();
        let snapshots = dir.path().join("snapshots");
        std::fs::create_dir_all(&snapshots).unwrap();
        std::fs::write(
            snapshots.join("ui_snapshot.json"),
            r#"{"role": "WebArea", "children": [{"role": "heading", "name": "Done", "level": 3}]}"#,
        )
        .unwrap();

        let server = McpResourceServer::new(Arc::new(BoardResources::new(&db, &snapshots)));
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_end);
        let serving = tokio::spawn(async move {
            server.serve(BufReader::new(server_read), server_write).await
        });

        let (client_read, client_write) = tokio::io::split(client_end);
        let client = McpClient::new(LineTransport::new(client_write, client_read), "board");
        let info = client.initialize().await.unwrap();
        assert_eq!(info.server_info.unwrap().name, "agile-qa-board");
        let provider = McpResourceProvider::new(Arc::new(client));

        assert_eq!(
            provider.list_resources().await.unwrap(),
            vec![ASSIGNMENTS_URI, ACCESSIBILITY_SNAPSHOT_URI, HTML_SNAPSHOT_URI]
        );

        let snapshot = ResourceSnapshot::load(&provider).await.unwrap();
        assert_eq!(snapshot.records.len(), 9);
        assert_eq!(snapshot.records[1]["engineer"], "Bob Johnson");
        assert_eq!(snapshot.accessibility.unwrap()["children"][0]["name"], "Done");
        assert!(snapshot.html.is_none());
        assert!(matches!(
            provider.read_resource(HTML_SNAPSHOT_URI).await,
            Err(ResourceError::NotFound(_))
        ));

        provider.close().await.unwrap();
        serving.await.unwrap().unwrap();
    }
}
