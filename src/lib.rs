//! # Agile QA Agent
//!
//! A conversational QA assistant for an agile board web application.
//!
//! This library provides:
//! - A tool-calling agent loop that drives a real browser through the
//!   Playwright MCP server
//! - Read-only board resources (assignment records and UI snapshots) served
//!   from a local SQLite database or an external MCP server, and an MCP server
//!   that publishes the local board to other clients
//! - Integration with any OpenAI-compatible chat completions endpoint (Groq by default)
//! - A snapshot-vs-database diff report for the board's status columns
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a question from the interactive session
//! 2. Build context from board resources, cached browser state and the tool catalog
//! 3. Call the model, execute any requested browser tools in order
//! 4. Feed results back to the model, repeat until it answers or the round ceiling is hit
//!
//! ## Example
//!
//! ```rust,ignore
//! use agile_qa_agent::agent::{Orchestrator, OrchestratorSettings};
//!
//! let mut agent = Orchestrator::new(llm, dispatcher, OrchestratorSettings::from_config(&config));
//! agent.load_resources(&provider).await?;
//! let outcome = agent.run_turn("Which work items are in Testing?").await?;
//! println!("{}", outcome.message());
//! ```

pub mod agent;
pub mod board;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod resources;
pub mod session;
pub mod tools;

pub use config::Config;
