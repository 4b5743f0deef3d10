//! Agile QA Agent - command line entry point.
//!
//! `agile-qa` (or `agile-qa chat`) starts an interactive session; the other
//! subcommands manage the local board database, run one-shot checks, or serve
//! the board as an MCP resource server (`serve-resources`, usable as
//! `RESOURCE_MCP_COMMAND`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use agile_qa_agent::agent::{Orchestrator, OrchestratorSettings};
use agile_qa_agent::board::{self, DiffReport};
use agile_qa_agent::config::Config;
use agile_qa_agent::llm::OpenAiCompatibleClient;
use agile_qa_agent::mcp::McpResourceServer;
use agile_qa_agent::resources::{
    BoardResources, McpResourceProvider, ResourceProvider, ResourceSnapshot,
};
use agile_qa_agent::session;
use agile_qa_agent::tools::{PlaywrightBackend, ToolDispatcher};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "agile-qa",
    about = "Chat with a QA agent about the agile board",
    after_help = "Examples:\n  agile-qa init-db\n  agile-qa check\n  agile-qa diff\n  RESOURCE_MCP_COMMAND='agile-qa serve-resources' agile-qa"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive chat session (default)")]
    Chat,
    #[command(about = "Create and seed the local board database")]
    InitDb {
        #[arg(long, help = "Database file (defaults to BOARD_DB_PATH)")]
        path: Option<PathBuf>,
    },
    #[command(about = "Smoke-test the configured board resource provider")]
    Check,
    #[command(about = "Compare the UI accessibility snapshot with database statuses")]
    Diff {
        #[arg(long, help = "Accessibility snapshot JSON (defaults to SNAPSHOT_DIR/ui_snapshot.json)")]
        snapshot: Option<PathBuf>,
        #[arg(long, help = "Database file (defaults to BOARD_DB_PATH)")]
        db: Option<PathBuf>,
    },
    #[command(about = "Serve the local board database and snapshots as MCP resources on stdio")]
    ServeResources,
}

/// Either resource provider behind one handle, so it can be closed on exit.
enum Provider {
    Local(BoardResources),
    Mcp(McpResourceProvider),
}

impl Provider {
    async fn from_config(config: &Config) -> anyhow::Result<Self> {
        match &config.resource_command {
            Some(command) => {
                info!("Reading board resources from MCP server: {}", command.join(" "));
                Ok(Provider::Mcp(McpResourceProvider::connect(command).await?))
            }
            None => {
                info!("Reading board resources from {}", config.board_db_path.display());
                Ok(Provider::Local(BoardResources::new(
                    &config.board_db_path,
                    &config.snapshot_dir,
                )))
            }
        }
    }

    fn as_dyn(&self) -> &dyn ResourceProvider {
        match self {
            Provider::Local(p) => p,
            Provider::Mcp(p) => p,
        }
    }

    async fn close(&self) {
        if let Provider::Mcp(p) = self {
            if let Err(e) = p.close().await {
                tracing::warn!("Failed to close resource server: {:#}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agile_qa_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(config).await?,
        Command::InitDb { path } => {
            let path = path.unwrap_or(config.board_db_path);
            board::init_db(&path)?;
            println!("Database initialized at {}", path.display());
        }
        Command::Check => check(&config).await?,
        Command::Diff { snapshot, db } => {
            let snapshot = snapshot.unwrap_or_else(|| config.snapshot_dir.join("ui_snapshot.json"));
            let db = db.unwrap_or(config.board_db_path);
            let report = DiffReport::from_files(&snapshot, &db)?;
            print!("{}", report);
            if report.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::ServeResources => {
            // stdout carries the protocol; logs already go to stderr.
            let provider = BoardResources::new(&config.board_db_path, &config.snapshot_dir);
            McpResourceServer::new(Arc::new(provider)).serve_stdio().await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn chat(config: Config) -> anyhow::Result<()> {
    let api_key = config.api_key()?.to_string();
    info!(
        "Loaded configuration: model={}, max_iterations={}",
        config.llm.model, config.max_iterations
    );

    let provider = Provider::from_config(&config).await?;

    info!("Starting browser server: {}", config.playwright_command.join(" "));
    let backend = Arc::new(PlaywrightBackend::connect(&config.playwright_command).await?);
    let llm = Arc::new(OpenAiCompatibleClient::new(&config.llm, api_key)?);
    let dispatcher = ToolDispatcher::new(backend.clone(), config.tool_result_cap, config.tool_timeout);

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut orchestrator = Orchestrator::new(llm, dispatcher, OrchestratorSettings::from_config(&config))
        .with_events(events_tx);

    let result = match orchestrator.load_resources(provider.as_dyn()).await {
        Ok(()) => session::run(&mut orchestrator, provider.as_dyn(), events_rx).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = backend.close().await {
        tracing::warn!("Failed to close browser server: {:#}", e);
    }
    provider.close().await;
    result
}

async fn check(config: &Config) -> anyhow::Result<()> {
    let provider = Provider::from_config(config).await?;
    let outcome = async {
        let uris = provider.as_dyn().list_resources().await?;
        println!("Available resources:");
        for uri in &uris {
            println!("  - {}", uri);
        }

        let snapshot = ResourceSnapshot::load(provider.as_dyn()).await?;
        println!("\nAssignments: {}", snapshot.records.len());
        if let Some(first) = snapshot.records.first() {
            println!("Sample:\n{}", serde_json::to_string_pretty(first)?);
        }
        println!(
            "UI accessibility snapshot: {}",
            if snapshot.accessibility.is_some() { "available" } else { "missing" }
        );
        println!(
            "UI HTML snapshot: {}",
            if snapshot.html.is_some() { "available" } else { "missing" }
        );
        anyhow::Ok(())
    }
    .await;
    provider.close().await;
    outcome
}
