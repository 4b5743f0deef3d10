//! Progress events emitted while a turn runs.

use std::fmt;

/// Events streamed to the UI layer as the agent works through a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A model call is about to be made
    RoundStarted { round: usize },
    /// The model requested a tool
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// A tool result was produced (possibly an error message)
    ToolResult {
        id: String,
        name: String,
        is_error: bool,
        truncated: bool,
        chars: usize,
    },
    /// The turn produced a final answer
    Answered { rounds: usize },
    /// The iteration bound was hit
    BoundReached { rounds: usize },
}

impl fmt::Display for TurnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnEvent::RoundStarted { round } => write!(f, "Round {}: asking the model", round),
            TurnEvent::ToolCall {
                name, arguments, ..
            } => write!(f, "🔧 {}({})", name, arguments),
            TurnEvent::ToolResult {
                name,
                is_error,
                truncated,
                chars,
                ..
            } => {
                let status = if *is_error { "failed" } else { "ok" };
                write!(f, "   {} {} ({} chars", name, status, chars)?;
                if *truncated {
                    write!(f, ", truncated")?;
                }
                write!(f, ")")
            }
            TurnEvent::Answered { rounds } => write!(f, "Answered after {} round(s)", rounds),
            TurnEvent::BoundReached { rounds } => {
                write!(f, "Stopped after {} rounds of tool calls", rounds)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_line_mentions_truncation() {
        let event = TurnEvent::ToolResult {
            id: "call_1".to_string(),
            name: "browser_snapshot".to_string(),
            is_error: false,
            truncated: true,
            chars: 5000,
        };
        assert_eq!(event.to_string(), "   browser_snapshot ok (5000 chars, truncated)");
    }
}
