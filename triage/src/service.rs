//! Ticket lifecycle actions that emit domain events.
//!
//! Each action writes the store first, then publishes to the [`EventBus`]
//! and returns without waiting for the workflow.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::{AdapterError, Entity, TicketStore};
use crate::events::{DomainEvent, EventBusError, SharedEventBus, TicketClosed, TicketUpdated, UserRef};
use crate::model::{NewTicket, Ticket, TicketPatch};
use crate::state_machine::{IllegalTransition, TicketStatus};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("Store error: {0}")]
    Store(AdapterError),

    #[error("Failed to publish event: {0}")]
    Publish(#[from] EventBusError),
}

impl From<AdapterError> for ServiceError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound { entity, id } => Self::NotFound { entity, id },
            AdapterError::IllegalTransition(e) => Self::IllegalTransition(e),
            other => Self::Store(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct TicketService {
    store: Arc<dyn TicketStore>,
    bus: SharedEventBus,
}

impl TicketService {
    pub fn new(store: Arc<dyn TicketStore>, bus: SharedEventBus) -> Self {
        Self { store, bus }
    }

    /// Store a new ticket and emit `ticket/created`.
    pub async fn create(
        &self,
        title: &str,
        description: &str,
        created_by: &str,
    ) -> ServiceResult<Ticket> {
        let title = required("title", title)?;
        let description = required("description", description)?;
        let created_by = required("created_by", created_by)?;

        let ticket = self
            .store
            .insert_ticket(NewTicket {
                title,
                description,
                created_by,
            })
            .await?;
        info!(ticket_id = %ticket.id, "Ticket created");

        self.publish(DomainEvent::ticket_created(&ticket.id))?;
        Ok(ticket)
    }

    /// Set status and helpful notes, then emit `ticket/closed` with a snapshot.
    pub async fn update(
        &self,
        id: &str,
        status: TicketStatus,
        helpful_notes: &str,
    ) -> ServiceResult<Ticket> {
        let helpful_notes = required("helpful_notes", helpful_notes)?;
        let current = self.load(id).await?;
        current.status.transition(status)?;

        let ticket = self
            .store
            .patch_ticket(
                id,
                &TicketPatch::new().status(status).helpful_notes(helpful_notes),
            )
            .await?;
        info!(ticket_id = %ticket.id, status = %ticket.status, "Ticket updated");

        let assigned_to = match ticket.assigned_to.as_deref() {
            Some(user_id) => match self.store.load_user(user_id).await? {
                Some(user) => Some(UserRef {
                    id: user.id,
                    email: user.email,
                }),
                None => {
                    warn!(ticket_id = %ticket.id, assignee = user_id, "Assignee not in directory");
                    None
                }
            },
            None => None,
        };

        self.publish(DomainEvent::ticket_closed(&TicketClosed {
            ticket_id: ticket.id.clone(),
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            status: ticket.status,
            created_by: ticket.created_by.clone(),
            assigned_to,
        }))?;
        Ok(ticket)
    }

    pub async fn close(&self, id: &str, helpful_notes: &str) -> ServiceResult<Ticket> {
        self.update(id, TicketStatus::Closed, helpful_notes).await
    }

    /// Set (or clear) the assignee and emit `ticket/updated`.
    pub async fn reassign(&self, id: &str, assignee: Option<&str>) -> ServiceResult<Ticket> {
        self.load(id).await?;
        let assignee = assignee
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from);

        let ticket = self
            .store
            .patch_ticket(id, &TicketPatch::new().assigned_to(assignee))
            .await?;
        info!(ticket_id = %ticket.id, assignee = ?ticket.assigned_to, "Ticket reassigned");

        self.publish(DomainEvent::ticket_updated(&TicketUpdated {
            ticket_id: ticket.id.clone(),
            status: ticket.status,
            assigned_to: ticket.assigned_to.clone(),
        }))?;
        Ok(ticket)
    }

    async fn load(&self, id: &str) -> ServiceResult<Ticket> {
        self.store
            .load_ticket(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: Entity::Ticket,
                id: id.to_string(),
            })
    }

    fn publish(&self, event: DomainEvent) -> ServiceResult<()> {
        self.bus.publish(event).map_err(|e| {
            warn!(error = %e, "Event not delivered");
            ServiceError::from(e)
        })?;
        Ok(())
    }
}

fn required(field: &str, value: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} is required")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::events::{EventBus, EventName};
    use crate::model::{Role, User};
    use tokio::sync::broadcast;

    fn service() -> (TicketService, Arc<InMemoryStore>, broadcast::Receiver<DomainEvent>) {
        let store = Arc::new(InMemoryStore::new());
        let bus = EventBus::new().shared();
        let rx = bus.subscribe();
        (TicketService::new(store.clone(), bus), store, rx)
    }

    #[tokio::test]
    async fn test_create_emits_ticket_created() {
        let (service, _store, mut rx) = service();
        let ticket = service.create("VPN drops", "every hour", "u-1").await.unwrap();

        assert_eq!(ticket.status, TicketStatus::Created);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_name(), Some(EventName::TicketCreated));
        assert_eq!(event.ticket_id(), Some(ticket.id.as_str()));
    }

    #[tokio::test]
    async fn test_create_requires_title_and_description() {
        let (service, store, _rx) = service();
        let err = service.create("  ", "body", "u-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(store.snapshot().await.tickets.is_empty());
    }

    #[tokio::test]
    async fn test_close_emits_snapshot_with_assignee() {
        let (service, store, mut rx) = service();
        store
            .put_user(User {
                id: "m-1".into(),
                email: "mod@example.com".into(),
                role: Role::Moderator,
                skills: vec!["network".into()],
            })
            .await;
        let ticket = service.create("VPN drops", "every hour", "u-1").await.unwrap();
        service.reassign(&ticket.id, Some("m-1")).await.unwrap();
        let closed = service.close(&ticket.id, "Restarted the gateway").await.unwrap();

        assert_eq!(closed.status, TicketStatus::Closed);
        let _created = rx.recv().await.unwrap();
        let _updated = rx.recv().await.unwrap();
        let event = rx.recv().await.unwrap();
        let payload: TicketClosed = event.payload_as().unwrap();
        assert_eq!(payload.status, TicketStatus::Closed);
        assert_eq!(payload.created_by, "u-1");
        assert_eq!(
            payload.assigned_to,
            Some(UserRef {
                id: "m-1".into(),
                email: "mod@example.com".into()
            })
        );
    }

    #[tokio::test]
    async fn test_update_rejects_backward_status() {
        let (service, _store, _rx) = service();
        let ticket = service.create("VPN drops", "every hour", "u-1").await.unwrap();
        service.close(&ticket.id, "done").await.unwrap();

        let err = service
            .update(&ticket.id, TicketStatus::Todo, "reopen")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn test_update_requires_notes_and_existing_ticket() {
        let (service, _store, _rx) = service();
        assert!(matches!(
            service.close("nope", "").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.close("nope", "notes").await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_reassign_to_nobody_emits_null_assignee() {
        let (service, _store, mut rx) = service();
        let ticket = service.create("VPN drops", "every hour", "u-1").await.unwrap();
        let updated = service.reassign(&ticket.id, None).await.unwrap();
        assert_eq!(updated.assigned_to, None);

        let _created = rx.recv().await.unwrap();
        let event = rx.recv().await.unwrap();
        let payload: TicketUpdated = event.payload_as().unwrap();
        assert_eq!(payload.assigned_to, None);
    }

    #[tokio::test]
    async fn test_publish_without_listener_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let service = TicketService::new(store, EventBus::new().shared());
        let err = service.create("t", "d", "u").await.unwrap_err();
        assert!(matches!(err, ServiceError::Publish(_)));
    }
}
