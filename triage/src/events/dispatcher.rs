//! Event Dispatcher: routes domain events to their registered workflow.
//!
//! Unknown or unregistered event names are dropped with a warning; the
//! sender never sees an error. Delivery from the bus is at-least-once and
//! unordered, so each event gets its own task.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::bus::{EventFilter, FilteredReceiver};
use super::types::{DomainEvent, EventName};
use crate::workflow::{Orchestrator, RunOutcome, Workflow};

/// What happened to a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// No workflow handles this event name.
    Dropped { event: String },
    Completed(RunOutcome),
}

impl DispatchOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }

    pub fn run(&self) -> Option<&RunOutcome> {
        match self {
            Self::Completed(outcome) => Some(outcome),
            Self::Dropped { .. } => None,
        }
    }

    /// Dropped events count as success: nothing was owed.
    pub fn is_success(&self) -> bool {
        self.run().map_or(true, RunOutcome::is_success)
    }
}

/// Tally of a [`Dispatcher::listen`] session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenReport {
    pub succeeded: usize,
    pub failed: usize,
    pub dropped: usize,
    /// Events skipped because the receiver fell behind the channel.
    pub lagged: u64,
    /// Spawned runs that panicked or were cancelled.
    pub aborted: usize,
}

impl ListenReport {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Dropped { .. } => self.dropped += 1,
            DispatchOutcome::Completed(run) if run.is_success() => self.succeeded += 1,
            DispatchOutcome::Completed(_) => self.failed += 1,
        }
    }
}

/// Maps event names to workflows and runs them.
pub struct Dispatcher {
    workflows: HashMap<EventName, Arc<Workflow>>,
    orchestrator: Orchestrator,
}

impl Dispatcher {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            workflows: HashMap::new(),
            orchestrator,
        }
    }

    /// Bind `workflow` to its event, replacing any earlier binding.
    pub fn register(&mut self, workflow: Workflow) -> &mut Self {
        let event = workflow.event();
        let name = workflow.name();
        if let Some(previous) = self.workflows.insert(event, Arc::new(workflow)) {
            warn!(
                event = %event,
                previous = previous.name(),
                replacement = name,
                "Workflow registration replaced"
            );
        } else {
            debug!(event = %event, workflow = name, "Workflow registered");
        }
        self
    }

    pub fn with_workflows(mut self, workflows: impl IntoIterator<Item = Workflow>) -> Self {
        for workflow in workflows {
            self.register(workflow);
        }
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn workflow_for(&self, event: EventName) -> Option<&Workflow> {
        self.workflows.get(&event).map(Arc::as_ref)
    }

    /// Filter admitting only the events some workflow is registered for.
    pub fn event_filter(&self) -> EventFilter {
        let mut names: Vec<&str> = self.workflows.keys().map(|name| name.as_str()).collect();
        names.sort_unstable();
        EventFilter::new().names(names)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Dispatch a raw `(name, payload)` pair.
    pub async fn dispatch(&self, name: &str, payload: serde_json::Value) -> DispatchOutcome {
        self.dispatch_event(DomainEvent::new(name, payload)).await
    }

    pub async fn dispatch_event(&self, event: DomainEvent) -> DispatchOutcome {
        let workflow = event
            .event_name()
            .and_then(|name| self.workflows.get(&name))
            .cloned();

        match workflow {
            Some(workflow) => DispatchOutcome::Completed(self.orchestrator.run(&workflow, event).await),
            None => {
                warn!(event = %event.name, event_id = %event.id, "No workflow registered, dropping event");
                DispatchOutcome::Dropped { event: event.name }
            }
        }
    }

    /// Consume `receiver` until every sender is gone, one task per event.
    ///
    /// Accepts a plain bus receiver or a [`FilteredReceiver`]; events the
    /// filter rejects are never seen and not counted. Runs still in flight
    /// when the channel closes are awaited before returning.
    pub async fn listen(self: Arc<Self>, receiver: impl Into<FilteredReceiver>) -> ListenReport {
        let mut receiver = receiver.into();
        let mut report = ListenReport::default();
        let mut runs = JoinSet::new();

        info!(workflows = self.workflows.len(), "Dispatcher listening");
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let dispatcher = Arc::clone(&self);
                    runs.spawn(async move { dispatcher.dispatch_event(event).await });
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dispatcher lagged behind the event bus");
                    report.lagged += skipped;
                }
                Err(RecvError::Closed) => break,
            }

            // Reap finished runs so the set does not grow unbounded.
            while let Some(joined) = runs.try_join_next() {
                record_joined(&mut report, joined);
            }
        }

        while let Some(joined) = runs.join_next().await {
            record_joined(&mut report, joined);
        }
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            dropped = report.dropped,
            lagged = report.lagged,
            aborted = report.aborted,
            "Dispatcher stopped"
        );
        report
    }
}

fn record_joined(report: &mut ListenReport, joined: Result<DispatchOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => report.record(&outcome),
        Err(e) => {
            error!(error = %e, "Workflow task aborted");
            report.aborted += 1;
        }
    }
}
