//! Configuration management for the agile QA agent.
//!
//! Configuration can be set via environment variables (a `.env` file in the
//! working directory is loaded first when present):
//! - `GROQ_API_KEY` - Required for chat sessions. Bearer token for the model endpoint.
//! - `LLM_API_URL` - Optional. OpenAI-compatible chat completions URL. Defaults to Groq.
//! - `LLM_MODEL` - Optional. Model identifier. Defaults to `llama-3.3-70b-versatile`.
//! - `LLM_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.7`.
//! - `LLM_MAX_TOKENS` - Optional. Maximum output tokens. Defaults to `2000`.
//! - `LLM_TIMEOUT_SECS` - Optional. Model call timeout. Defaults to `60`.
//! - `MAX_ITERATIONS` - Optional. Maximum rounds per turn. Defaults to `10`.
//! - `HISTORY_WINDOW` - Optional. Prior messages sent per round. Defaults to `10`.
//! - `TOOL_RESULT_CAP` - Optional. Characters kept per tool result. Defaults to `5000`.
//! - `TOOL_TIMEOUT_SECS` - Optional. Per tool call timeout. Defaults to `60`.
//! - `BOARD_DB_PATH` - Optional. Local board database. Defaults to `db/agile_board.db`.
//! - `SNAPSHOT_DIR` - Optional. UI snapshot directory. Defaults to `snapshots`.
//! - `PLAYWRIGHT_MCP_COMMAND` - Optional. Browser MCP server command line.
//! - `RESOURCE_MCP_COMMAND` - Optional. When set, board resources are read from
//!   this MCP server instead of the local database.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_PLAYWRIGHT_COMMAND: &str = "npx @playwright/mcp@latest";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Model endpoint configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bearer token; only required once a chat session starts
    pub api_key: Option<String>,

    /// Chat completions URL (OpenAI-compatible)
    pub api_url: String,

    /// Model identifier sent with every request
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Whole-request timeout for a single model call
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,

    /// Hard ceiling on model rounds per user turn
    pub max_iterations: usize,

    /// Number of prior conversation messages resent each round
    pub history_window: usize,

    /// Characters kept from each tool result
    pub tool_result_cap: usize,

    /// Timeout applied to each tool backend call
    pub tool_timeout: Duration,

    /// SQLite database backing the local board resources
    pub board_db_path: PathBuf,

    /// Directory holding `ui_snapshot.json` / `ui_snapshot.html`
    pub snapshot_dir: PathBuf,

    /// Command line used to spawn the browser MCP server
    pub playwright_command: Vec<String>,

    /// Command line of an external resource MCP server, if any
    pub resource_command: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case in deployed environments.
        let _ = dotenvy::dotenv();

        let defaults = Self::new();

        let llm = LlmConfig {
            api_key: std::env::var("GROQ_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            api_url: std::env::var("LLM_API_URL").unwrap_or(defaults.llm.api_url),
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.llm.model),
            temperature: parse_var("LLM_TEMPERATURE", defaults.llm.temperature)?,
            max_tokens: parse_var("LLM_MAX_TOKENS", defaults.llm.max_tokens)?,
            timeout: Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", 60u64)?),
        };

        let max_iterations = parse_var("MAX_ITERATIONS", defaults.max_iterations)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let playwright_command = std::env::var("PLAYWRIGHT_MCP_COMMAND")
            .ok()
            .map(|v| split_command(&v))
            .unwrap_or(defaults.playwright_command);
        if playwright_command.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PLAYWRIGHT_MCP_COMMAND".to_string(),
                "command cannot be empty".to_string(),
            ));
        }

        let resource_command = std::env::var("RESOURCE_MCP_COMMAND")
            .ok()
            .map(|v| split_command(&v))
            .filter(|cmd| !cmd.is_empty());

        Ok(Self {
            llm,
            max_iterations,
            history_window: parse_var("HISTORY_WINDOW", defaults.history_window)?,
            tool_result_cap: parse_var("TOOL_RESULT_CAP", defaults.tool_result_cap)?,
            tool_timeout: Duration::from_secs(parse_var("TOOL_TIMEOUT_SECS", 60u64)?),
            board_db_path: std::env::var("BOARD_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.board_db_path),
            snapshot_dir: std::env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
            playwright_command,
            resource_command,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new() -> Self {
        Self {
            llm: LlmConfig::default(),
            max_iterations: 10,
            history_window: 10,
            tool_result_cap: 5000,
            tool_timeout: Duration::from_secs(60),
            board_db_path: PathBuf::from("db/agile_board.db"),
            snapshot_dir: PathBuf::from("snapshots"),
            playwright_command: split_command(DEFAULT_PLAYWRIGHT_COMMAND),
            resource_command: None,
        }
    }

    /// The model endpoint key, required before a chat session can start.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.llm
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GROQ_API_KEY".to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}
