//! `ticket/created`: fetch, advance to TODO, classify, assign, notify.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{load_current_ticket, mail_for, NotifyOutcome, Services};
use crate::adapters::{Classifier, Notifier, TicketStore, TicketText};
use crate::classify::TriageSuggestion;
use crate::events::{EventName, TicketCreated};
use crate::model::{Ticket, TicketPatch, User};
use crate::resolver::ModeratorResolver;
use crate::state_machine::TicketStatus;
use crate::workflow::{to_checkpoint, Step, StepResult, Workflow, WorkflowRun};

pub const WORKFLOW: &str = "on-ticket-created";

pub const FETCH_TICKET: &str = "fetch-ticket";
pub const ADVANCE_TO_TODO: &str = "advance-to-todo";
pub const CLASSIFY: &str = "classify";
pub const ASSIGN_MODERATOR: &str = "assign-moderator";
pub const NOTIFY: &str = "notify";

pub fn creation_workflow(services: &Services) -> Workflow {
    Workflow::new(WORKFLOW, EventName::TicketCreated)
        .step(FetchTicket {
            store: services.store.clone(),
        })
        .step(AdvanceToTodo {
            store: services.store.clone(),
        })
        .step(Classify {
            store: services.store.clone(),
            classifier: services.classifier.clone(),
        })
        .step(AssignModerator {
            store: services.store.clone(),
            resolver: ModeratorResolver::new(services.store.clone()),
        })
        .step(NotifyModerator {
            notifier: services.notifier.clone(),
        })
}

/// Checkpoint of the classify step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub classified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<TriageSuggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

impl ClassificationOutcome {
    fn skipped(reason: &str) -> Self {
        Self {
            classified: false,
            suggestion: None,
            skipped_reason: Some(reason.to_string()),
        }
    }
}

/// Checkpoint of the assign-moderator step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub ticket_id: String,
    pub title: String,
    pub moderator: Option<User>,
}

struct FetchTicket {
    store: Arc<dyn TicketStore>,
}

#[async_trait]
impl Step for FetchTicket {
    fn name(&self) -> &'static str {
        FETCH_TICKET
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let payload: TicketCreated = run.payload()?;
        let ticket = load_current_ticket(self.store.as_ref(), &payload.ticket_id).await?;
        to_checkpoint(FETCH_TICKET, &ticket)
    }
}

struct AdvanceToTodo {
    store: Arc<dyn TicketStore>,
}

#[async_trait]
impl Step for AdvanceToTodo {
    fn name(&self) -> &'static str {
        ADVANCE_TO_TODO
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let fetched: Ticket = run.checkpoint(FETCH_TICKET)?;
        let current = load_current_ticket(self.store.as_ref(), &fetched.id).await?;

        let ticket = match current.status.advance_target(TicketStatus::Todo) {
            Some(status) => {
                self.store
                    .patch_ticket(&current.id, &TicketPatch::new().status(status))
                    .await?
            }
            None => {
                debug!(ticket_id = %current.id, status = %current.status, "Already past TODO");
                current
            }
        };
        to_checkpoint(ADVANCE_TO_TODO, &ticket)
    }
}

struct Classify {
    store: Arc<dyn TicketStore>,
    classifier: Arc<dyn Classifier>,
}

#[async_trait]
impl Step for Classify {
    fn name(&self) -> &'static str {
        CLASSIFY
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let ticket: Ticket = run.checkpoint(ADVANCE_TO_TODO)?;
        if ticket.status.is_terminal() {
            info!(ticket_id = %ticket.id, "Ticket already closed, skipping classification");
            return to_checkpoint(CLASSIFY, &ClassificationOutcome::skipped("closed"));
        }

        let suggestion = self
            .classifier
            .classify(&TicketText::from(&ticket))
            .await?;

        let Some(suggestion) = suggestion else {
            info!(ticket_id = %ticket.id, "No usable classification, leaving ticket unclassified");
            return to_checkpoint(
                CLASSIFY,
                &ClassificationOutcome {
                    classified: false,
                    suggestion: None,
                    skipped_reason: None,
                },
            );
        };

        // Status may have moved while the classifier was thinking.
        let current = load_current_ticket(self.store.as_ref(), &ticket.id).await?;
        if current.status.is_terminal() {
            info!(ticket_id = %current.id, "Ticket closed during classification, keeping its fields");
            return to_checkpoint(CLASSIFY, &ClassificationOutcome::skipped("closed"));
        }

        let mut patch = TicketPatch::new()
            .priority(suggestion.normalized_priority())
            .helpful_notes(suggestion.helpful_notes_or_default())
            .related_skills(suggestion.related_skills_or_default());
        if let Some(status) = current.status.advance_target(TicketStatus::InProgress) {
            patch = patch.status(status);
        }
        self.store.patch_ticket(&current.id, &patch).await?;

        to_checkpoint(
            CLASSIFY,
            &ClassificationOutcome {
                classified: true,
                suggestion: Some(suggestion),
                skipped_reason: None,
            },
        )
    }
}

struct AssignModerator {
    store: Arc<dyn TicketStore>,
    resolver: ModeratorResolver,
}

#[async_trait]
impl Step for AssignModerator {
    fn name(&self) -> &'static str {
        ASSIGN_MODERATOR
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let fetched: Ticket = run.checkpoint(FETCH_TICKET)?;
        let ticket = load_current_ticket(self.store.as_ref(), &fetched.id).await?;
        if ticket.status.is_terminal() {
            info!(ticket_id = %ticket.id, "Ticket already closed, keeping its assignee");
            return to_checkpoint(
                ASSIGN_MODERATOR,
                &Assignment {
                    ticket_id: ticket.id,
                    title: ticket.title,
                    moderator: None,
                },
            );
        }

        let moderator = self.resolver.resolve(&ticket.related_skills).await?;
        let assignee = moderator.as_ref().map(|user| user.id.clone());
        self.store
            .patch_ticket(&ticket.id, &TicketPatch::new().assigned_to(assignee))
            .await?;

        match &moderator {
            Some(user) => info!(ticket_id = %ticket.id, assignee = %user.id, "Ticket assigned"),
            None => info!(ticket_id = %ticket.id, "No moderator available, ticket left unassigned"),
        }

        to_checkpoint(
            ASSIGN_MODERATOR,
            &Assignment {
                ticket_id: ticket.id,
                title: ticket.title,
                moderator,
            },
        )
    }
}

struct NotifyModerator {
    notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl Step for NotifyModerator {
    fn name(&self) -> &'static str {
        NOTIFY
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let assignment: Assignment = run.checkpoint(ASSIGN_MODERATOR)?;
        let Some(moderator) = assignment.moderator else {
            return to_checkpoint(NOTIFY, &NotifyOutcome::skipped("no assignee"));
        };

        let mail = mail_for(
            run,
            &assignment.ticket_id,
            &moderator.email,
            "Ticket Assigned".to_string(),
            format!("A new ticket is assigned to you: {}", assignment.title),
        );
        self.notifier.deliver(&mail).await?;
        to_checkpoint(NOTIFY, &NotifyOutcome::sent(&moderator.email))
    }
}
