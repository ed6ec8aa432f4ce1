//! `ticket/updated`: notify an explicitly chosen assignee.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{load_current_ticket, mail_for, NotifyOutcome, Services};
use crate::adapters::{Entity, Notifier, TicketStore};
use crate::events::{EventName, TicketUpdated};
use crate::model::User;
use crate::workflow::{to_checkpoint, Step, StepError, StepResult, Workflow, WorkflowRun};

pub const WORKFLOW: &str = "on-ticket-updated";

pub const LOAD_ASSIGNEE: &str = "load-assignee";
pub const NOTIFY_ASSIGNEE: &str = "notify-assignee";

pub fn reassignment_workflow(services: &Services) -> Workflow {
    Workflow::new(WORKFLOW, EventName::TicketUpdated)
        .step(LoadAssignee {
            store: services.store.clone(),
        })
        .step(NotifyAssignee {
            store: services.store.clone(),
            notifier: services.notifier.clone(),
        })
}

struct LoadAssignee {
    store: Arc<dyn TicketStore>,
}

#[async_trait]
impl Step for LoadAssignee {
    fn name(&self) -> &'static str {
        LOAD_ASSIGNEE
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let payload: TicketUpdated = run.payload()?;
        let assignee = match payload.assigned_to.as_deref() {
            Some(id) => Some(
                self.store
                    .load_user(id)
                    .await?
                    .ok_or_else(|| StepError::not_found(Entity::User, id))?,
            ),
            None => None,
        };
        to_checkpoint(LOAD_ASSIGNEE, &assignee)
    }
}

struct NotifyAssignee {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl Step for NotifyAssignee {
    fn name(&self) -> &'static str {
        NOTIFY_ASSIGNEE
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let payload: TicketUpdated = run.payload()?;
        let Some(assignee) = run.checkpoint::<Option<User>>(LOAD_ASSIGNEE)? else {
            return to_checkpoint(NOTIFY_ASSIGNEE, &NotifyOutcome::skipped("unassigned"));
        };

        let ticket = load_current_ticket(self.store.as_ref(), &payload.ticket_id).await?;
        if ticket.assigned_to.as_deref() != Some(assignee.id.as_str()) {
            info!(
                ticket_id = %ticket.id,
                assignee = %assignee.id,
                current = ?ticket.assigned_to,
                "Assignment superseded, skipping notification"
            );
            return to_checkpoint(NOTIFY_ASSIGNEE, &NotifyOutcome::skipped("superseded"));
        }

        let mail = mail_for(
            run,
            &ticket.id,
            &assignee.email,
            "Ticket Assigned".to_string(),
            format!("A ticket is assigned to you: {}", ticket.title),
        );
        self.notifier.deliver(&mail).await?;
        to_checkpoint(NOTIFY_ASSIGNEE, &NotifyOutcome::sent(&assignee.email))
    }
}
