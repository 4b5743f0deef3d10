//! Conversation log and cached browser artifacts.

use thiserror::Error;

use crate::llm::{ChatMessage, Role, ToolCall};
use crate::tools::{ToolEffect, ToolOutput};

/// Result of one tool call, paired with the request by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub truncated: bool,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: String, truncated: bool) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content,
            truncated,
            is_error: false,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, content: String, truncated: bool) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content,
            truncated,
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult(ToolResult),
}

impl Message {
    pub fn role(&self) -> Role {
        match self {
            Message::System(_) => Role::System,
            Message::User(_) => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::ToolResult(_) => Role::Tool,
        }
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        match self {
            Message::System(text) => ChatMessage::system(text.clone()),
            Message::User(text) => ChatMessage::user(text.clone()),
            Message::Assistant {
                content,
                tool_calls,
            } => ChatMessage {
                role: Role::Assistant,
                content: content.clone(),
                tool_calls: (!tool_calls.is_empty()).then(|| tool_calls.clone()),
                tool_call_id: None,
            },
            Message::ToolResult(result) => ChatMessage {
                role: Role::Tool,
                content: Some(result.content.clone()),
                tool_calls: None,
                tool_call_id: Some(result.tool_call_id.clone()),
            },
        }
    }
}

/// A tool batch whose results do not line up one-to-one with its requests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("tool call {0} has no result")]
    Unanswered(String),

    #[error("tool result {0} does not answer any call of this round")]
    Unmatched(String),

    #[error("tool call id {0} appears more than once")]
    Duplicate(String),
}

/// Ordered, append-only message log. Index 0 is the session's system message.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the log with a system message. No-op if one is already present.
    pub fn seed(&mut self, system_prompt: String) {
        if !self.has_system() {
            self.messages.insert(0, Message::System(system_prompt));
        }
    }

    pub fn has_system(&self) -> bool {
        matches!(self.messages.first(), Some(Message::System(_)))
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::User(text.into()));
    }

    pub fn push_answer(&mut self, text: impl Into<String>) {
        self.messages.push(Message::Assistant {
            content: Some(text.into()),
            tool_calls: Vec::new(),
        });
    }

    /// Append a tool-call batch together with its results.
    ///
    /// Every call must be answered by exactly one result; otherwise nothing is
    /// appended.
    pub fn commit_round(
        &mut self,
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
        results: Vec<ToolResult>,
    ) -> Result<(), PairingError> {
        check_pairing(&tool_calls, &results)?;

        self.messages.push(Message::Assistant {
            content,
            tool_calls,
        });
        self.messages
            .extend(results.into_iter().map(Message::ToolResult));
        Ok(())
    }

    /// The trailing `n` non-system messages.
    ///
    /// Tool results at the front of the window lost their tool-call message to
    /// the cut and are dropped, so the window never starts mid-batch.
    pub fn window(&self, n: usize) -> &[Message] {
        let body = if self.has_system() {
            &self.messages[1..]
        } else {
            &self.messages[..]
        };
        let mut start = body.len().saturating_sub(n);
        while start < body.len() && matches!(body[start], Message::ToolResult(_)) {
            start += 1;
        }
        &body[start..]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn check_pairing(calls: &[ToolCall], results: &[ToolResult]) -> Result<(), PairingError> {
    for (i, call) in calls.iter().enumerate() {
        if calls[..i].iter().any(|c| c.id == call.id) {
            return Err(PairingError::Duplicate(call.id.clone()));
        }
    }
    for (i, result) in results.iter().enumerate() {
        if !calls.iter().any(|c| c.id == result.tool_call_id) {
            return Err(PairingError::Unmatched(result.tool_call_id.clone()));
        }
        if results[..i].iter().any(|r| r.tool_call_id == result.tool_call_id) {
            return Err(PairingError::Duplicate(result.tool_call_id.clone()));
        }
    }
    if let Some(call) = calls
        .iter()
        .find(|c| !results.iter().any(|r| r.tool_call_id == c.id))
    {
        return Err(PairingError::Unanswered(call.id.clone()));
    }
    Ok(())
}

/// Browser state remembered between rounds and turns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedArtifacts {
    /// Text of the most recent successful page snapshot
    pub last_snapshot: Option<String>,
    /// URL of the most recent successful navigation
    pub last_target: Option<String>,
}

impl CachedArtifacts {
    /// Fold a successful tool output into the cache.
    pub fn record(&mut self, output: &ToolOutput) {
        match output.tool.effect() {
            ToolEffect::Navigates => {
                if let Some(url) = output.arguments["url"].as_str() {
                    self.last_target = Some(url.to_string());
                }
            }
            ToolEffect::Observes => self.last_snapshot = Some(output.content.clone()),
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_snapshot.is_none() && self.last_target.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
