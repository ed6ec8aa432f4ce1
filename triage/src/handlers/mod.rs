//! Workflow definitions for the ticket lifecycle events.
//!
//! | Event            | Workflow            | Steps |
//! |------------------|---------------------|-------|
//! | `ticket/created` | `on-ticket-created` | fetch-ticket → advance-to-todo → classify → assign-moderator → notify |
//! | `ticket/closed`  | `on-ticket-closed`  | load-creator → notify-creator |
//! | `ticket/updated` | `on-ticket-updated` | load-assignee → notify-assignee |
//!
//! Steps re-read the ticket from the store rather than trusting event
//! payload snapshots, and every write is a "set to target" patch.

pub mod closed;
pub mod created;
pub mod updated;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapters::{Classifier, Entity, Mail, Notifier, TicketStore};
use crate::model::Ticket;
use crate::workflow::{StepError, StepResult, Workflow, WorkflowRun};

pub use closed::closed_workflow;
pub use created::creation_workflow;
pub use updated::reassignment_workflow;

/// Collaborators shared by all workflow steps.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn TicketStore>,
    pub classifier: Arc<dyn Classifier>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    pub fn new(
        store: Arc<dyn TicketStore>,
        classifier: Arc<dyn Classifier>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            classifier,
            notifier,
        }
    }
}

/// The three lifecycle workflows, ready to register with a dispatcher.
pub fn default_workflows(services: &Services) -> Vec<Workflow> {
    vec![
        creation_workflow(services),
        closed_workflow(services),
        reassignment_workflow(services),
    ]
}

/// Checkpoint written by notification steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyOutcome {
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

impl NotifyOutcome {
    fn sent(recipient: &str) -> Self {
        Self {
            sent: true,
            recipient: Some(recipient.to_string()),
            skipped_reason: None,
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            sent: false,
            recipient: None,
            skipped_reason: Some(reason.into()),
        }
    }
}

/// Load the current ticket; absence is terminal.
async fn load_current_ticket(store: &dyn TicketStore, id: &str) -> StepResult<Ticket> {
    store
        .load_ticket(id)
        .await?
        .ok_or_else(|| StepError::not_found(Entity::Ticket, id))
}

/// Build a mail keyed by workflow, ticket and recipient.
fn mail_for(
    run: &WorkflowRun,
    ticket_id: &str,
    to: &str,
    subject: String,
    body: String,
) -> Mail {
    Mail {
        to: to.to_string(),
        subject,
        body,
        idempotency_key: format!("{}:{}:{}", run.workflow(), ticket_id, to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterResult, InMemoryStore, MockNotifier, TicketText};
    use crate::classify::TriageSuggestion;
    use crate::events::{DomainEvent, TicketClosed};
    use crate::model::{Role, User};
    use crate::state_machine::TicketStatus;
    use crate::workflow::Orchestrator;
    use async_trait::async_trait;
    use chrono::Utc;

    struct NoSuggestion;

    #[async_trait]
    impl Classifier for NoSuggestion {
        async fn classify(&self, _text: &TicketText) -> AdapterResult<Option<TriageSuggestion>> {
            Ok(None)
        }
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_user(User {
                id: "u-1".into(),
                email: "reporter@example.com".into(),
                role: Role::User,
                skills: vec![],
            })
            .await;
        store
            .put_ticket(Ticket {
                id: "t-1".into(),
                title: "VPN drops".into(),
                description: "every 10 minutes".into(),
                status: TicketStatus::Closed,
                priority: None,
                helpful_notes: Some("Update the client to 5.2".into()),
                related_skills: vec![],
                assigned_to: None,
                created_by: "u-1".into(),
                created_at: Utc::now(),
            })
            .await;
        store
    }

    fn closed_event(created_by: &str) -> DomainEvent {
        DomainEvent::ticket_closed(&TicketClosed {
            ticket_id: "t-1".into(),
            title: "VPN drops".into(),
            description: "every 10 minutes".into(),
            status: TicketStatus::Closed,
            created_by: created_by.into(),
            assigned_to: None,
        })
    }

    #[tokio::test]
    async fn test_closed_workflow_mails_creator_once() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_deliver()
            .withf(|mail: &Mail| {
                mail.to == "reporter@example.com"
                    && mail.subject == "Ticket closed: VPN drops"
                    && mail.body.contains("Update the client to 5.2")
                    && mail.idempotency_key == "on-ticket-closed:t-1:reporter@example.com"
            })
            .times(1)
            .returning(|_| Ok(()));

        let services = Services::new(
            seeded_store().await,
            Arc::new(NoSuggestion),
            Arc::new(notifier),
        );
        let outcome = Orchestrator::default()
            .run(&closed_workflow(&services), closed_event("u-1"))
            .await;

        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_closed_workflow_unknown_creator_sends_nothing() {
        let mut notifier = MockNotifier::new();
        notifier.expect_deliver().times(0);

        let services = Services::new(
            seeded_store().await,
            Arc::new(NoSuggestion),
            Arc::new(notifier),
        );
        let outcome = Orchestrator::default()
            .run(&closed_workflow(&services), closed_event("u-gone"))
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.failed_step.as_deref(), Some(closed::LOAD_CREATOR));
        assert_eq!(outcome.retries(), 0);
    }

    #[test]
    fn test_default_workflows_cover_every_event() {
        let services = Services::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(NoSuggestion),
            Arc::new(MockNotifier::new()),
        );
        let names: Vec<&str> = default_workflows(&services)
            .iter()
            .map(|w| w.event().as_str())
            .collect();
        assert_eq!(names, vec!["ticket/created", "ticket/closed", "ticket/updated"]);
    }
}
