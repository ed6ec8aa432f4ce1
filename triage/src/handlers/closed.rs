//! `ticket/closed`: tell the creator how their ticket ended up.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{load_current_ticket, mail_for, NotifyOutcome, Services};
use crate::adapters::{Entity, Notifier, TicketStore};
use crate::events::{EventName, TicketClosed};
use crate::model::{Ticket, User};
use crate::workflow::{to_checkpoint, Step, StepError, StepResult, Workflow, WorkflowRun};

pub const WORKFLOW: &str = "on-ticket-closed";

pub const LOAD_CREATOR: &str = "load-creator";
pub const NOTIFY_CREATOR: &str = "notify-creator";

pub fn closed_workflow(services: &Services) -> Workflow {
    Workflow::new(WORKFLOW, EventName::TicketClosed)
        .step(LoadCreator {
            store: services.store.clone(),
        })
        .step(NotifyCreator {
            store: services.store.clone(),
            notifier: services.notifier.clone(),
        })
}

struct LoadCreator {
    store: Arc<dyn TicketStore>,
}

#[async_trait]
impl Step for LoadCreator {
    fn name(&self) -> &'static str {
        LOAD_CREATOR
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let payload: TicketClosed = run.payload()?;
        let creator = self
            .store
            .load_user(&payload.created_by)
            .await?
            .ok_or_else(|| StepError::not_found(Entity::User, &payload.created_by))?;
        to_checkpoint(LOAD_CREATOR, &creator)
    }
}

struct NotifyCreator {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl Step for NotifyCreator {
    fn name(&self) -> &'static str {
        NOTIFY_CREATOR
    }

    async fn execute(&self, run: &WorkflowRun) -> StepResult<Value> {
        let payload: TicketClosed = run.payload()?;
        let creator: User = run.checkpoint(LOAD_CREATOR)?;
        let ticket = load_current_ticket(self.store.as_ref(), &payload.ticket_id).await?;

        let mail = mail_for(
            run,
            &ticket.id,
            &creator.email,
            format!("Ticket {}: {}", ticket.status.label(), ticket.title),
            closure_body(&ticket),
        );
        self.notifier.deliver(&mail).await?;
        to_checkpoint(NOTIFY_CREATOR, &NotifyOutcome::sent(&creator.email))
    }
}

fn closure_body(ticket: &Ticket) -> String {
    let mut body = format!(
        "Your ticket \"{}\" is now {}.",
        ticket.title,
        ticket.status.label()
    );
    if let Some(notes) = ticket.helpful_notes.as_deref().map(str::trim) {
        if !notes.is_empty() {
            body.push_str("\n\nNotes from the moderator:\n");
            body.push_str(notes);
        }
    }
    body
}
