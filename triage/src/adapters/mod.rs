//! Collaborator seams: ticket store, classification service, notifications.
//!
//! The engine only talks to the outside world through the three traits in
//! this module. Each returns [`AdapterError`], which carries enough structure
//! for the orchestrator to decide between retrying and giving up.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::TriageSuggestion;
use crate::model::{NewTicket, Role, Ticket, TicketPatch, User};
use crate::resolver::{rank_admins, rank_moderators, SkillPattern};
use crate::state_machine::IllegalTransition;

pub use memory::{Fixtures, InMemoryStore};

/// Kind of document an adapter looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Ticket,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket => write!(f, "Ticket"),
            Self::User => write!(f, "User"),
        }
    }
}

/// Errors raised by collaborator adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The referenced document does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// A status patch would move the ticket backwards.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// The dependency could not be reached or failed mid-request.
    #[error("{dependency} unavailable: {message}")]
    Unavailable { dependency: String, message: String },

    /// The dependency did not answer in time.
    #[error("{dependency} timed out")]
    Timeout { dependency: String },

    /// The dependency refused the request and will keep refusing it.
    #[error("{dependency} rejected request: {message}")]
    Rejected { dependency: String, message: String },
}

impl AdapterError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn unavailable(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    pub fn timeout(dependency: impl Into<String>) -> Self {
        Self::Timeout {
            dependency: dependency.into(),
        }
    }

    pub fn rejected(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Document store holding tickets and the user directory.
///
/// Every operation is atomic for a single document; no multi-document
/// transaction is assumed.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn load_ticket(&self, id: &str) -> AdapterResult<Option<Ticket>>;

    /// Apply a set-semantics patch and return the updated ticket.
    ///
    /// Fails with `NotFound` for an unknown id and `IllegalTransition` for a
    /// backwards status change.
    async fn patch_ticket(&self, id: &str, patch: &TicketPatch) -> AdapterResult<Ticket>;

    /// Store a new ticket in `CREATED` status.
    async fn insert_ticket(&self, ticket: NewTicket) -> AdapterResult<Ticket>;

    async fn load_user(&self, id: &str) -> AdapterResult<Option<User>>;

    /// All users holding `role`, in any order.
    async fn users_with_role(&self, role: Role) -> AdapterResult<Vec<User>>;

    /// Best moderator for `pattern`, ranked deterministically.
    async fn find_moderator(&self, pattern: &SkillPattern) -> AdapterResult<Option<User>> {
        let moderators = self.users_with_role(Role::Moderator).await?;
        Ok(rank_moderators(moderators, pattern))
    }

    /// Admin fallback, lowest id first.
    async fn find_admin(&self) -> AdapterResult<Option<User>> {
        let admins = self.users_with_role(Role::Admin).await?;
        Ok(rank_admins(admins))
    }
}

/// Text handed to the classification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketText {
    pub title: String,
    pub description: String,
}

impl From<&Ticket> for TicketText {
    fn from(ticket: &Ticket) -> Self {
        Self {
            title: ticket.title.clone(),
            description: ticket.description.clone(),
        }
    }
}

/// Classification service.
///
/// `Ok(None)` means the service answered but the answer was unusable; that is
/// a degrade case, not an error. Only reachability problems are `Err`.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &TicketText) -> AdapterResult<Option<TriageSuggestion>>;
}

/// An outgoing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Stable key for de-duplicating repeats of the same logical mail.
    pub idempotency_key: String,
}

/// Notification delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, mail: &Mail) -> AdapterResult<()>;
}
