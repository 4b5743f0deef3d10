//! Core agent loop implementation.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, ToolCall, ToolSchema};
use crate::resources::{ResourceProvider, ResourceSnapshot};
use crate::tools::{truncate_chars, BrowserTool, DispatchError, ToolDispatcher};

use super::conversation::{CachedArtifacts, Conversation, Message, ToolResult};
use super::error::OrchestratorError;
use super::events::TurnEvent;
use super::prompt::{build_system_prompt, PromptLimits};

/// Per-session knobs, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub max_iterations: usize,
    pub history_window: usize,
    pub prompt_limits: PromptLimits,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_iterations: config.max_iterations,
            history_window: config.history_window,
            prompt_limits: PromptLimits {
                page_snapshot_chars: config.tool_result_cap,
                ..PromptLimits::default()
            },
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered without requesting tools
    Answer(String),
    /// The round ceiling was reached before a final answer
    BoundedEffort { rounds: usize },
}

impl TurnOutcome {
    /// Text to show the user.
    pub fn message(&self) -> String {
        match self {
            TurnOutcome::Answer(text) => text.clone(),
            TurnOutcome::BoundedEffort { rounds } => format!(
                "Maximum tool calling iterations reached ({}). The task may be too complex.",
                rounds
            ),
        }
    }
}

/// One chat session: owns the conversation and cached browser state, talks to
/// the model and the browser through injected collaborators.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    settings: OrchestratorSettings,
    tools: Vec<BrowserTool>,
    schemas: Vec<ToolSchema>,
    resources: Option<ResourceSnapshot>,
    conversation: Conversation,
    artifacts: CachedArtifacts,
    events: Option<UnboundedSender<TurnEvent>>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, dispatcher: ToolDispatcher, settings: OrchestratorSettings) -> Self {
        let tools = BrowserTool::ALL.to_vec();
        let schemas = tools.iter().map(|t| t.schema()).collect();
        Self {
            llm,
            dispatcher,
            settings,
            tools,
            schemas,
            resources: None,
            conversation: Conversation::new(),
            artifacts: CachedArtifacts::default(),
            events: None,
        }
    }

    /// Stream progress events to `sender` while turns run.
    pub fn with_events(mut self, sender: UnboundedSender<TurnEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Fetch the resource snapshot this session reasons over.
    pub async fn load_resources(&mut self, provider: &dyn ResourceProvider) -> Result<(), OrchestratorError> {
        let snapshot = ResourceSnapshot::load(provider).await?;
        self.set_resources(snapshot);
        Ok(())
    }

    /// Install a resource snapshot. The session becomes ready; an existing
    /// conversation keeps its seed message.
    pub fn set_resources(&mut self, snapshot: ResourceSnapshot) {
        self.resources = Some(snapshot);
        if !self.conversation.has_system() {
            let prompt = self.system_prompt_for(&self.artifacts);
            if let Some(prompt) = prompt {
                self.conversation.seed(prompt);
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.resources.is_some()
    }

    /// Empty the conversation and cached artifacts. Resources stay loaded.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.artifacts.clear();
        if let Some(prompt) = self.system_prompt_for(&self.artifacts) {
            self.conversation.seed(prompt);
        }
        tracing::info!("Conversation reset");
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn artifacts(&self) -> &CachedArtifacts {
        &self.artifacts
    }

    pub fn resources(&self) -> Option<&ResourceSnapshot> {
        self.resources.as_ref()
    }

    /// Run one user turn to a final answer or the round ceiling.
    ///
    /// Each completed round is committed as a unit: the assistant's tool-call
    /// message, one result per call, and any artifact updates. A round that
    /// fails or is cancelled leaves no trace.
    pub async fn run_turn(&mut self, user_text: &str) -> Result<TurnOutcome, OrchestratorError> {
        let question = user_text.trim();
        if question.is_empty() {
            return Err(OrchestratorError::EmptyInput);
        }
        if self.resources.is_none() {
            return Err(OrchestratorError::NotReady);
        }
        if !self.conversation.has_system() {
            if let Some(prompt) = self.system_prompt_for(&self.artifacts) {
                self.conversation.seed(prompt);
            }
        }

        let history: Vec<ChatMessage> = self
            .conversation
            .window(self.settings.history_window)
            .iter()
            .map(Message::to_chat_message)
            .collect();
        self.conversation.push_user(question);

        let mut exchange: Vec<ChatMessage> = Vec::new();

        for round in 1..=self.settings.max_iterations {
            tracing::debug!("Agent round {}", round);
            self.emit(TurnEvent::RoundStarted { round });

            let system = self
                .system_prompt_for(&self.artifacts)
                .ok_or(OrchestratorError::NotReady)?;
            let mut messages = Vec::with_capacity(history.len() + exchange.len() + 2);
            messages.push(ChatMessage::system(system));
            messages.extend(history.iter().cloned());
            messages.push(ChatMessage::user(question));
            messages.extend(exchange.iter().cloned());

            let response = self
                .llm
                .chat_completion(&self.settings.model, &messages, Some(self.schemas.as_slice()))
                .await?;

            if !response.has_tool_calls() {
                let answer = response.content.unwrap_or_default();
                self.conversation.push_answer(answer.clone());
                self.emit(TurnEvent::Answered { rounds: round });
                return Ok(TurnOutcome::Answer(answer));
            }

            let (tool_calls, repeated) = unique_call_ids(response.tool_calls);
            let (results, staged) = self.execute_batch(&tool_calls, &repeated).await?;

            let round_messages: Vec<ChatMessage> = std::iter::once(
                Message::Assistant {
                    content: response.content.clone(),
                    tool_calls: tool_calls.clone(),
                }
                .to_chat_message(),
            )
            .chain(results.iter().map(|r| Message::ToolResult(r.clone()).to_chat_message()))
            .collect();

            self.conversation
                .commit_round(response.content, tool_calls, results)?;
            self.artifacts = staged;
            exchange.extend(round_messages);
        }

        tracing::warn!(
            "Maximum tool calling iterations reached ({})",
            self.settings.max_iterations
        );
        self.emit(TurnEvent::BoundReached {
            rounds: self.settings.max_iterations,
        });
        Ok(TurnOutcome::BoundedEffort {
            rounds: self.settings.max_iterations,
        })
    }

    /// Execute a batch strictly in request order. Artifact updates are staged on
    /// a copy and only become visible when the caller commits the round.
    ///
    /// Calls that reused an earlier id (`repeated[i]` is the reused id) are not
    /// dispatched; the model gets an error result for them instead.
    async fn execute_batch(
        &self,
        calls: &[ToolCall],
        repeated: &[Option<String>],
    ) -> Result<(Vec<ToolResult>, CachedArtifacts), OrchestratorError> {
        let mut staged = self.artifacts.clone();
        let mut results = Vec::with_capacity(calls.len());

        for (call, reused) in calls.iter().zip(repeated) {
            self.emit(TurnEvent::ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
            });

            let result = if let Some(original) = reused {
                tracing::warn!(tool = %call.function.name, "Skipping tool call with reused id {}", original);
                self.error_result(
                    call,
                    format!("tool call id {} was already used in this batch; the call was not run", original),
                )
            } else {
                match self.dispatcher.dispatch(call).await {
                    Ok(output) => {
                        staged.record(&output);
                        ToolResult::success(&call.id, output.content, output.truncated)
                    }
                    Err(DispatchError::Timeout { tool, timeout }) => {
                        tracing::error!(tool = %tool, "Tool call timed out; dropping round");
                        return Err(OrchestratorError::ToolTimeout { tool, timeout });
                    }
                    Err(e) => {
                        tracing::warn!(tool = %call.function.name, "Tool call failed: {}", e);
                        self.error_result(call, e)
                    }
                }
            };

            self.emit(TurnEvent::ToolResult {
                id: call.id.clone(),
                name: call.function.name.clone(),
                is_error: result.is_error,
                truncated: result.truncated,
                chars: result.content.chars().count(),
            });
            results.push(result);
        }

        Ok((results, staged))
    }

    fn error_result(&self, call: &ToolCall, detail: impl std::fmt::Display) -> ToolResult {
        let message = format!("Error executing {}: {}", call.function.name, detail);
        let (content, truncated) = truncate_chars(&message, self.dispatcher.result_cap());
        ToolResult::error(&call.id, content, truncated)
    }

    fn system_prompt_for(&self, artifacts: &CachedArtifacts) -> Option<String> {
        self.resources.as_ref().map(|resources| {
            build_system_prompt(resources, artifacts, &self.tools, self.settings.prompt_limits)
        })
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(sender) = &self.events {
            // Receiver gone just means nobody is watching.
            let _ = sender.send(event);
        }
    }
}

/// Rename calls that reuse an id already seen earlier in the batch, so every
/// call can be answered by exactly one result. The second vector holds, per
/// call, the id it reused.
fn unique_call_ids(mut calls: Vec<ToolCall>) -> (Vec<ToolCall>, Vec<Option<String>>) {
    let mut taken: HashSet<String> = calls.iter().map(|c| c.id.clone()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut repeated = Vec::with_capacity(calls.len());

    for call in &mut calls {
        if seen.insert(call.id.clone()) {
            repeated.push(None);
            continue;
        }
        let original = call.id.clone();
        let mut n = 2;
        let mut fresh = format!("{}-{}", original, n);
        while taken.contains(&fresh) {
            n += 1;
            fresh = format!("{}-{}", original, n);
        }
        taken.insert(fresh.clone());
        seen.insert(fresh.clone());
        call.id = fresh;
        repeated.push(Some(original));
    }

    (calls, repeated)
}
