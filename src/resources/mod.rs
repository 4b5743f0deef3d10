//! Read-only fact base the model reasons over.
//!
//! A [`ResourceProvider`] serves named resources. The agent needs exactly one
//! of them (the assignment records) and uses two UI snapshot documents when
//! they exist. [`ResourceSnapshot::load`] fetches all three once per session.

mod board;
mod mcp;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use board::BoardResources;
pub use mcp::McpResourceProvider;

pub const ASSIGNMENTS_URI: &str = "assignments://all";
pub const ACCESSIBILITY_SNAPSHOT_URI: &str = "ui://snapshot/accessibility";
pub const HTML_SNAPSHOT_URI: &str = "ui://snapshot/html";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource {uri} is malformed: {reason}")]
    Invalid { uri: String, reason: String },

    #[error("resource provider failed: {0:#}")]
    Provider(#[from] anyhow::Error),
}

#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<String>, ResourceError>;

    /// Text content of the resource (JSON documents are returned serialized).
    async fn read_resource(&self, uri: &str) -> Result<String, ResourceError>;
}

/// Resource data fetched at session start. Staleness within a session is accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSnapshot {
    /// Assignment records, as delivered by the provider
    pub records: Vec<Value>,
    pub accessibility: Option<Value>,
    pub html: Option<String>,
}

impl ResourceSnapshot {
    /// Fetch the required records and whichever optional snapshots are available.
    pub async fn load(provider: &dyn ResourceProvider) -> Result<Self, ResourceError> {
        match provider.list_resources().await {
            Ok(uris) => tracing::info!("Available resources: {}", uris.join(", ")),
            Err(e) => tracing::warn!("Could not list resources: {}", e),
        }

        let raw = provider.read_resource(ASSIGNMENTS_URI).await?;
        let records = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(records)) => records,
            Ok(other) => {
                return Err(ResourceError::Invalid {
                    uri: ASSIGNMENTS_URI.to_string(),
                    reason: format!("expected a JSON array, got {}", json_kind(&other)),
                })
            }
            Err(e) => {
                return Err(ResourceError::Invalid {
                    uri: ASSIGNMENTS_URI.to_string(),
                    reason: e.to_string(),
                })
            }
        };
        tracing::info!("Loaded {} assignments", records.len());

        let accessibility = match optional(provider, ACCESSIBILITY_SNAPSHOT_URI).await {
            Some(text) => match serde_json::from_str::<Value>(&text) {
                Ok(tree) => Some(tree),
                Err(e) => {
                    tracing::warn!("UI accessibility snapshot is not valid JSON: {}", e);
                    None
                }
            },
            None => None,
        };

        let html = optional(provider, HTML_SNAPSHOT_URI).await;
        if let Some(html) = &html {
            tracing::info!("Loaded UI HTML snapshot ({} chars)", html.chars().count());
        }

        Ok(Self {
            records,
            accessibility,
            html,
        })
    }
}

async fn optional(provider: &dyn ResourceProvider, uri: &str) -> Option<String> {
    match provider.read_resource(uri).await {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("Optional resource {} not available: {}", uri, e);
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
