//! Interactive chat session on stdin/stdout.

use std::io::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::agent::{Orchestrator, OrchestratorError, TurnEvent, TurnOutcome};
use crate::resources::ResourceProvider;

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Quit,
    Clear,
    Reload,
    Empty,
    Ask(String),
}

impl SessionCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => SessionCommand::Empty,
            "quit" | "exit" | "q" => SessionCommand::Quit,
            "clear" | "reset" => SessionCommand::Clear,
            "reload" => SessionCommand::Reload,
            _ => SessionCommand::Ask(trimmed.to_string()),
        }
    }
}

/// Run the read-eval-print loop until the user quits or stdin closes.
///
/// Ctrl-C while a turn is running abandons that turn; the conversation keeps
/// only rounds that completed.
pub async fn run(
    orchestrator: &mut Orchestrator,
    provider: &dyn ResourceProvider,
    events: UnboundedReceiver<TurnEvent>,
) -> anyhow::Result<()> {
    run_with_input(BufReader::new(tokio::io::stdin()), orchestrator, provider, events).await
}

async fn run_with_input<R: AsyncBufRead + Unpin>(
    input: R,
    orchestrator: &mut Orchestrator,
    provider: &dyn ResourceProvider,
    mut events: UnboundedReceiver<TurnEvent>,
) -> anyhow::Result<()> {
    let mut lines = input.lines();

    println!("Agile board QA assistant");
    println!("Commands: 'quit' to exit, 'clear' to reset the conversation, 'reload' to refetch board data");

    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        // Once a signal listener exists, Ctrl-C no longer kills the process.
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match SessionCommand::parse(&line) {
            SessionCommand::Quit => break,
            SessionCommand::Empty => continue,
            SessionCommand::Clear => {
                orchestrator.reset();
                println!("Conversation cleared.");
            }
            SessionCommand::Reload => match orchestrator.load_resources(provider).await {
                Ok(()) => println!("Board data reloaded."),
                Err(e) => println!("Error: {}", e),
            },
            SessionCommand::Ask(question) => match ask(orchestrator, &question, &mut events).await {
                Some(Ok(TurnOutcome::Answer(answer))) => println!("\nAssistant: {}", answer),
                Some(Ok(outcome @ TurnOutcome::BoundedEffort { .. })) => {
                    println!("\nAssistant: {}", outcome.message())
                }
                Some(Err(e)) => print_error(&e),
                None => println!("\nInterrupted. The unfinished round was discarded."),
            },
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Drive one turn, echoing progress events. `None` means the user interrupted.
async fn ask(
    orchestrator: &mut Orchestrator,
    question: &str,
    events: &mut UnboundedReceiver<TurnEvent>,
) -> Option<Result<TurnOutcome, OrchestratorError>> {
    let turn = orchestrator.run_turn(question);
    tokio::pin!(turn);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let result = loop {
        tokio::select! {
            result = &mut turn => break Some(result),
            Some(event) = events.recv() => println!("{}", event),
            _ = &mut interrupt => break None,
        }
    };

    while let Ok(event) = events.try_recv() {
        println!("{}", event);
    }
    result
}

fn print_error(error: &OrchestratorError) {
    match error {
        OrchestratorError::Endpoint(e) if e.is_timeout() => {
            println!("\nError: the model endpoint timed out. Ask again to retry.")
        }
        OrchestratorError::ToolTimeout { .. } => {
            println!("\nError: {}. The round was discarded; ask again to retry.", error)
        }
        _ => println!("\nError: {}", error),
    }
}
