//! Wiring shared by the CLI subcommands: fixtures, adapters, replay and
//! single-action runs over the event bus.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::task::JoinSet;
use tracing::info;

use triage::adapters::{Classifier, Notifier};
use triage::events::EventBusExt;
use triage::{
    default_workflows, DispatchOutcome, Dispatcher, DomainEvent, EventBus, Fixtures,
    InMemoryStore, ListenReport, Orchestrator, ServiceError, Services, Ticket, TicketService,
    TicketStore, TriageConfig,
};

use crate::classifier::LlmClassifier;
use crate::config::WorkerConfig;
use crate::notifier::{LogNotifier, RelayNotifier};

pub fn load_fixtures(path: &Path) -> Result<Fixtures> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixtures {}", path.display()))?;
    Fixtures::from_json_str(&raw).with_context(|| format!("Invalid fixtures {}", path.display()))
}

pub fn save_fixtures(path: &Path, fixtures: &Fixtures) -> Result<()> {
    let json = serde_json::to_string_pretty(fixtures)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Parse JSON lines of `{ "name": ..., "payload": {...} }`; blank lines are skipped.
pub fn parse_events(input: &str) -> Result<Vec<DomainEvent>> {
    let mut events = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: DomainEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid event on line {}", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}

/// Build the classifier and notifier for this process.
///
/// `dry_run` logs mail instead of relaying it.
pub fn adapters(
    config: &WorkerConfig,
    dry_run: bool,
) -> Result<(Arc<dyn Classifier>, Arc<dyn Notifier>)> {
    let classifier =
        LlmClassifier::new(config.llm.clone()).context("Failed to build classifier client")?;

    let notifier: Arc<dyn Notifier> = match (&config.mail.relay_url, dry_run) {
        (Some(url), false) => Arc::new(
            RelayNotifier::new(url.clone(), &config.mail)
                .context("Failed to build mail relay client")?,
        ),
        _ => Arc::new(LogNotifier),
    };

    Ok((Arc::new(classifier), notifier))
}

pub fn dispatcher(services: &Services, config: &TriageConfig) -> Dispatcher {
    Dispatcher::new(Orchestrator::from_config(config)).with_workflows(default_workflows(services))
}

/// Dispatch every event concurrently; outcomes come back in input order.
pub async fn replay(
    dispatcher: Arc<Dispatcher>,
    events: Vec<DomainEvent>,
) -> Result<Vec<DispatchOutcome>> {
    let mut runs = JoinSet::new();
    for (idx, event) in events.into_iter().enumerate() {
        let dispatcher = Arc::clone(&dispatcher);
        runs.spawn(async move { (idx, dispatcher.dispatch_event(event).await) });
    }

    let mut outcomes = Vec::with_capacity(runs.len());
    while let Some(joined) = runs.join_next().await {
        outcomes.push(joined.context("Replay task aborted")?);
    }
    outcomes.sort_by_key(|(idx, _)| *idx);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}

/// Run one lifecycle action and wait for the workflow it triggers.
///
/// The service is handed to `action` by value; once the action finishes and
/// drops it the bus closes and the dispatcher drains.
pub async fn run_action<F, Fut>(
    store: Arc<InMemoryStore>,
    dispatcher: Dispatcher,
    bus_capacity: usize,
    action: F,
) -> Result<(Ticket, ListenReport)>
where
    F: FnOnce(TicketService) -> Fut,
    Fut: Future<Output = Result<Ticket, ServiceError>>,
{
    let bus = EventBus::with_capacity(bus_capacity).shared();
    let receiver = bus.subscribe_filtered(dispatcher.event_filter());
    let listener = tokio::spawn(dispatcher.shared().listen(receiver));

    let service = TicketService::new(store.clone(), bus);
    let acted = action(service).await;
    let report = listener.await.context("Dispatcher task aborted")?;
    let ticket = acted?;

    info!(
        ticket_id = %ticket.id,
        succeeded = report.succeeded,
        failed = report.failed,
        "Action finished"
    );
    match store.load_ticket(&ticket.id).await? {
        Some(current) => Ok((current, report)),
        None => bail!("Ticket {} disappeared", ticket.id),
    }
}
