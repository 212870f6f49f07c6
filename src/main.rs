//! Boardroom CLI: run phased advisor discussions from the terminal.
//!
//! ```bash
//! # Run a full discussion (2 opening + 4 debate + 2 synthesis turns)
//! OPENROUTER_API_KEY=... boardroom run --topic "Should we hire more developers?"
//!
//! # Resume-friendly listing and inspection
//! boardroom list
//! boardroom show <discussion-id>
//! boardroom delete <discussion-id>
//!
//! # Model catalog
//! boardroom models
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use boardroom::{
    CompletionClient, DiscussionOrchestrator, JsonFileGateway, Persona, PersonaRegistry,
    PhaseLimits,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory for discussion snapshots
    #[arg(long, default_value = ".boardroom")]
    state_dir: PathBuf,

    /// Skip snapshot persistence entirely
    #[arg(long, default_value_t = false)]
    memory_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a discussion and advance it turn by turn
    Run {
        /// The question for the board
        #[arg(long)]
        topic: String,

        /// Turns to run (defaults to the full phase budget)
        #[arg(long)]
        turns: Option<u32>,

        /// Restrict the board to these roles (defaults to all)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Per-phase turn limits as opening,debate,synthesis
        #[arg(long, value_delimiter = ',')]
        phase_limits: Option<Vec<u32>>,
    },
    /// List saved discussions
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the message history of a discussion
    Show { id: String },
    /// Delete a discussion from memory and storage
    Delete { id: String },
    /// List models available from the completion service
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("boardroom=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Models => {
            let client = CompletionClient::from_env().context("completion client setup failed")?;
            let models = client.list_models().await?;
            for model in models {
                match model.name {
                    Some(name) => println!("{}  ({})", model.id, name),
                    None => println!("{}", model.id),
                }
            }
            Ok(())
        }
        Command::Run {
            topic,
            turns,
            roles,
            phase_limits,
        } => {
            let mut orchestrator = build_orchestrator(&args.state_dir, args.memory_only)?;
            if let Some(limits) = phase_limits {
                anyhow::ensure!(
                    limits.len() == 3,
                    "--phase-limits expects opening,debate,synthesis"
                );
                orchestrator = orchestrator
                    .with_phase_limits(PhaseLimits::new(limits[0], limits[1], limits[2]));
            }

            let personas = select_personas(&roles)?;
            let id = orchestrator.start(&topic, personas).await?;
            println!("discussion {id}");
            println!("topic: {topic}\n");

            let mut remaining = turns;
            loop {
                if let Some(0) = remaining {
                    break;
                }
                if orchestrator
                    .discussion(&id)
                    .is_some_and(|d| d.is_complete())
                {
                    println!("discussion complete");
                    break;
                }

                match orchestrator.advance(&id).await {
                    Ok(turn) => {
                        println!(
                            "── turn {} [{}] {} ({})",
                            turn.turn, turn.phase, turn.persona, turn.role
                        );
                        println!("{}\n", turn.content);
                    }
                    Err(e) => {
                        // State is untouched; rerunning resumes this turn.
                        eprintln!("turn failed: {e}");
                        break;
                    }
                }

                remaining = remaining.map(|n| n - 1);
            }
            Ok(())
        }
        Command::List { limit } => {
            let orchestrator = build_orchestrator(&args.state_dir, args.memory_only)?;
            for summary in orchestrator.list_discussions(limit).await {
                println!(
                    "{}  {}  ({} messages, updated {})",
                    summary.id, summary.topic, summary.message_count, summary.updated_at
                );
            }
            Ok(())
        }
        Command::Show { id } => {
            let mut orchestrator = build_orchestrator(&args.state_dir, args.memory_only)?;
            let messages = orchestrator.get_messages(&id).await?;
            for message in messages {
                println!(
                    "── turn {} [{}] {} ({})",
                    message.turn_number, message.phase, message.persona_name, message.role
                );
                println!("{}\n", message.content);
            }
            Ok(())
        }
        Command::Delete { id } => {
            let mut orchestrator = build_orchestrator(&args.state_dir, args.memory_only)?;
            if orchestrator.delete_discussion(&id).await {
                println!("deleted {id}");
            } else {
                println!("nothing to delete for {id}");
            }
            Ok(())
        }
    }
}

fn build_orchestrator(state_dir: &PathBuf, memory_only: bool) -> Result<DiscussionOrchestrator> {
    let client = CompletionClient::from_env().context("completion client setup failed")?;
    let mut orchestrator =
        DiscussionOrchestrator::new(Arc::new(client), PersonaRegistry::with_defaults());

    if !memory_only {
        let gateway = JsonFileGateway::new(state_dir)
            .with_context(|| format!("opening state dir {}", state_dir.display()))?;
        orchestrator = orchestrator.with_gateway(Arc::new(gateway));
    }

    Ok(orchestrator)
}

/// Resolve `--role` flags to a persona subset; `None` means the full board.
fn select_personas(roles: &[String]) -> Result<Option<Vec<Persona>>> {
    if roles.is_empty() {
        return Ok(None);
    }
    let registry = PersonaRegistry::with_defaults();
    let mut personas = Vec::with_capacity(roles.len());
    for role in roles {
        let persona = registry
            .by_role(role)
            .with_context(|| format!("unknown role: {role}"))?;
        personas.push(persona.clone());
    }
    Ok(Some(personas))
}
