//! Agent module - the QA chat agent's core loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build a system prompt from the board resources and cached browser state
//! 2. Call the model with the browser tool catalog
//! 3. If the model requests tool calls, execute them in order and feed results back
//! 4. Repeat until the model answers or the round ceiling is reached

mod agent_loop;
pub mod conversation;
mod error;
mod events;
mod prompt;

pub use agent_loop::{Orchestrator, OrchestratorSettings, TurnOutcome};
pub use conversation::{CachedArtifacts, Conversation, Message, ToolResult};
pub use error::OrchestratorError;
pub use events::TurnEvent;
pub use prompt::{build_system_prompt, PromptLimits};
