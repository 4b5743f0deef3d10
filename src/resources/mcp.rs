//! Resources read through an external MCP server.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{ResourceError, ResourceProvider};
use crate::mcp::McpClient;

pub struct McpResourceProvider {
    client: Arc<McpClient>,
}

impl McpResourceProvider {
    pub async fn connect(command: &[String]) -> anyhow::Result<Self> {
        let client = McpClient::connect_local("board", command).await?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn new(client: Arc<McpClient>) -> Self {
        Self { client }
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        self.client.close().await
    }
}

#[async_trait]
impl ResourceProvider for McpResourceProvider {
    async fn list_resources(&self) -> Result<Vec<String>, ResourceError> {
        Ok(self.client.list_resources().await?)
    }

    async fn read_resource(&self, uri: &str) -> Result<String, ResourceError> {
        let contents = self.client.read_resource(uri).await?;
        let text = contents
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| ResourceError::NotFound(uri.to_string()))?;

        if is_not_found_sentinel(&text) {
            return Err(ResourceError::NotFound(uri.to_string()));
        }
        Ok(text)
    }
}

/// Board servers report a missing snapshot in-band rather than as an error:
/// either a `{"error": ...}` object or text starting with `Error:`.
fn is_not_found_sentinel(text: &str) -> bool {
    let trimmed = text.trim_start();
    if trimmed.starts_with("Error:") {
        return true;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map.len() == 1 && map.contains_key("error"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::JsonRpcResponse;
    use crate::mcp::MockTransport;
    use serde_json::json;

    #[test]
    fn detects_in_band_not_found_payloads() {
        assert!(is_not_found_sentinel(
            r#"{"error": "Snapshot not found. Run: npx playwright test scripts/snapshot_accessibility.spec.ts"}"#
        ));
        assert!(is_not_found_sentinel("Error: Snapshot not found."));
        assert!(!is_not_found_sentinel(r#"{"error": "x", "children": []}"#));
        assert!(!is_not_found_sentinel("<html><body>Error: nope</body></html>"));
        assert!(!is_not_found_sentinel("[]"));
    }

    #[tokio::test]
    async fn reads_first_text_content() {
        let transport = MockTransport::new(vec![JsonRpcResponse::success(
            1,
            json!({"contents": [{"uri": "assignments://all", "mimeType": "application/json", "text": "[]"}]}),
        )]);
        let provider = McpResourceProvider::new(Arc::new(McpClient::new(transport, "board")));
        assert_eq!(provider.read_resource("assignments://all").await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn sentinel_payload_maps_to_not_found() {
        let transport = MockTransport::new(vec![JsonRpcResponse::success(
            1,
            json!({"contents": [{"uri": "ui://snapshot/html", "text": "Error: Snapshot not found."}]}),
        )]);
        let provider = McpResourceProvider::new(Arc::new(McpClient::new(transport, "board")));
        let err = provider.read_resource("ui://snapshot/html").await.unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
    }
}
