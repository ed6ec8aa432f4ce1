//! In-memory ticket store backed by a fixture document.
//!
//! Used by tests and by the worker binary's fixture mode. Each call takes
//! the lock exactly once, so a patch is atomic per ticket.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AdapterError, AdapterResult, Entity, TicketStore};
use crate::model::{NewTicket, Role, Ticket, TicketPatch, User};
use crate::state_machine::TicketStatus;

/// Seed data for an [`InMemoryStore`].
///
/// ```json
/// { "users": [{ "id": "m-1", "email": "m@x", "role": "moderator", "skills": ["docker"] }],
///   "tickets": [] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

impl Fixtures {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Default)]
struct Documents {
    tickets: HashMap<String, Ticket>,
    users: HashMap<String, User>,
}

/// Ticket store keeping every document in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<Documents>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixtures(fixtures: Fixtures) -> Self {
        let docs = Documents {
            tickets: fixtures
                .tickets
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect(),
            users: fixtures
                .users
                .into_iter()
                .map(|u| (u.id.clone(), u))
                .collect(),
        };
        Self {
            docs: RwLock::new(docs),
        }
    }

    /// Add or replace a user.
    pub async fn put_user(&self, user: User) {
        self.docs.write().await.users.insert(user.id.clone(), user);
    }

    /// Add or replace a ticket verbatim, bypassing status validation.
    pub async fn put_ticket(&self, ticket: Ticket) {
        self.docs
            .write()
            .await
            .tickets
            .insert(ticket.id.clone(), ticket);
    }

    /// Current contents, tickets sorted by creation time then id.
    pub async fn snapshot(&self) -> Fixtures {
        let docs = self.docs.read().await;
        let mut users: Vec<User> = docs.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        let mut tickets: Vec<Ticket> = docs.tickets.values().cloned().collect();
        tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Fixtures { users, tickets }
    }
}

#[async_trait]
impl TicketStore for InMemoryStore {
    async fn load_ticket(&self, id: &str) -> AdapterResult<Option<Ticket>> {
        Ok(self.docs.read().await.tickets.get(id).cloned())
    }

    async fn patch_ticket(&self, id: &str, patch: &TicketPatch) -> AdapterResult<Ticket> {
        let mut docs = self.docs.write().await;
        let ticket = docs
            .tickets
            .get_mut(id)
            .ok_or_else(|| AdapterError::not_found(Entity::Ticket, id))?;
        ticket.apply(patch)?;
        debug!(ticket_id = id, status = %ticket.status, "Ticket patched");
        Ok(ticket.clone())
    }

    async fn insert_ticket(&self, ticket: NewTicket) -> AdapterResult<Ticket> {
        let ticket = Ticket {
            id: uuid::Uuid::new_v4().to_string(),
            title: ticket.title,
            description: ticket.description,
            status: TicketStatus::Created,
            priority: None,
            helpful_notes: None,
            related_skills: Vec::new(),
            assigned_to: None,
            created_by: ticket.created_by,
            created_at: Utc::now(),
        };
        self.docs
            .write()
            .await
            .tickets
            .insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    async fn load_user(&self, id: &str) -> AdapterResult<Option<User>> {
        Ok(self.docs.read().await.users.get(id).cloned())
    }

    async fn users_with_role(&self, role: Role) -> AdapterResult<Vec<User>> {
        Ok(self
            .docs
            .read()
            .await
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }
}
