use std::time::Duration;

use thiserror::Error;

use super::conversation::PairingError;
use crate::llm::LlmError;
use crate::resources::ResourceError;
use crate::tools::BrowserTool;

/// Failures that end a turn. Tool failures other than timeouts are not here:
/// they are reported back to the model as tool results.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("agent is not ready: board resources have not been loaded")]
    NotReady,

    #[error("question is empty")]
    EmptyInput,

    #[error("model endpoint error: {0}")]
    Endpoint(#[from] LlmError),

    #[error("browser tool {tool} did not respond within {}s", .timeout.as_secs())]
    ToolTimeout { tool: BrowserTool, timeout: Duration },

    #[error("tool call protocol violated: {0}")]
    ProtocolViolation(#[from] PairingError),

    #[error(transparent)]
    Resources(#[from] ResourceError),
}
