use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use triage::{InMemoryStore, Services, TicketStatus, TriageConfig};
use triage_worker::runtime;
use triage_worker::WorkerConfig;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON fixture document with `users` and `tickets`
    #[arg(long, global = true, default_value = "fixtures.json")]
    fixtures: PathBuf,

    /// TOML engine config (retry policy, step timeout, bus capacity)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log mail instead of sending it through the relay
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,

    /// Write the store back to the fixtures file afterwards
    #[arg(long, global = true, default_value_t = false)]
    save: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dispatch every event in a JSON-lines file and print each outcome
    Replay {
        #[arg(long)]
        events: PathBuf,
    },
    /// Create a ticket and run the triage workflow
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        created_by: String,
    },
    /// Set a ticket's status and notes, then notify its creator
    Update {
        id: String,
        #[arg(long)]
        status: TicketStatus,
        #[arg(long)]
        notes: String,
    },
    /// Close a ticket and notify its creator
    Close {
        id: String,
        #[arg(long)]
        notes: String,
    },
    /// Assign a ticket to a user, or clear the assignee
    Reassign {
        id: String,
        /// Omit to unassign
        #[arg(long)]
        assignee: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let engine = match &args.config {
        Some(path) => TriageConfig::load(path)?,
        None => TriageConfig::from_env()?,
    };
    let worker = WorkerConfig::default();
    info!(
        fixtures = %args.fixtures.display(),
        llm = %worker.llm.url,
        max_retries = engine.retry.max_retries,
        dry_run = args.dry_run,
        "Triage worker starting"
    );

    let store = Arc::new(InMemoryStore::from_fixtures(runtime::load_fixtures(
        &args.fixtures,
    )?));
    let (classifier, notifier) = runtime::adapters(&worker, args.dry_run)?;
    let services = Services::new(store.clone(), classifier, notifier);
    let dispatcher = runtime::dispatcher(&services, &engine);

    let mut all_succeeded = true;
    match args.command {
        Command::Replay { events } => {
            let raw = std::fs::read_to_string(&events)
                .with_context(|| format!("Failed to read events {}", events.display()))?;
            let events = runtime::parse_events(&raw)?;
            info!(count = events.len(), "Replaying events");

            for outcome in runtime::replay(dispatcher.shared(), events).await? {
                all_succeeded &= outcome.is_success();
                println!("{}", serde_json::to_string(&outcome)?);
            }
        }
        Command::Create {
            title,
            description,
            created_by,
        } => {
            let (ticket, report) = runtime::run_action(
                store.clone(),
                dispatcher,
                engine.bus_capacity,
                |service| async move { service.create(&title, &description, &created_by).await },
            )
            .await?;
            all_succeeded = report.failed == 0 && report.aborted == 0;
            println!("{}", serde_json::to_string_pretty(&ticket)?);
        }
        Command::Update { id, status, notes } => {
            let (ticket, report) = runtime::run_action(
                store.clone(),
                dispatcher,
                engine.bus_capacity,
                |service| async move { service.update(&id, status, &notes).await },
            )
            .await?;
            all_succeeded = report.failed == 0 && report.aborted == 0;
            println!("{}", serde_json::to_string_pretty(&ticket)?);
        }
        Command::Close { id, notes } => {
            let (ticket, report) = runtime::run_action(
                store.clone(),
                dispatcher,
                engine.bus_capacity,
                |service| async move { service.close(&id, &notes).await },
            )
            .await?;
            all_succeeded = report.failed == 0 && report.aborted == 0;
            println!("{}", serde_json::to_string_pretty(&ticket)?);
        }
        Command::Reassign { id, assignee } => {
            let (ticket, report) = runtime::run_action(
                store.clone(),
                dispatcher,
                engine.bus_capacity,
                |service| async move { service.reassign(&id, assignee.as_deref()).await },
            )
            .await?;
            all_succeeded = report.failed == 0 && report.aborted == 0;
            println!("{}", serde_json::to_string_pretty(&ticket)?);
        }
    }

    if args.save {
        runtime::save_fixtures(&args.fixtures, &store.snapshot().await)?;
        info!(path = %args.fixtures.display(), "Store saved");
    }

    if !all_succeeded {
        anyhow::bail!("One or more workflow runs failed");
    }
    Ok(())
}
