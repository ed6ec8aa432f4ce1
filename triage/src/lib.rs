//! Ticket Triage Library
//!
//! This library provides:
//! - An event dispatcher routing ticket lifecycle events to workflows
//! - A step orchestrator with checkpointing and terminal/transient retry
//! - The ticket creation, closed and reassignment workflows
//! - Skill-based moderator resolution with admin fallback
//!
//! # Event Flow
//!
//! ```text
//! TicketService::create ──▶ ticket/created ──▶ on-ticket-created
//!     fetch-ticket → advance-to-todo → classify → assign-moderator → notify
//! TicketService::close  ──▶ ticket/closed  ──▶ on-ticket-closed
//!     load-creator → notify-creator
//! TicketService::reassign ─▶ ticket/updated ─▶ on-ticket-updated
//!     load-assignee → notify-assignee
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use triage::{default_workflows, Dispatcher, InMemoryStore, Orchestrator, Services};
//!
//! let services = Services::new(store, classifier, notifier);
//! let dispatcher = Dispatcher::new(Orchestrator::default())
//!     .with_workflows(default_workflows(&services));
//!
//! let outcome = dispatcher
//!     .dispatch("ticket/created", serde_json::json!({ "ticketId": "t-1" }))
//!     .await;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod adapters;
pub mod classify;
pub mod config;
pub mod events;
pub mod handlers;
pub mod model;
pub mod resolver;
pub mod service;
pub mod state_machine;
pub mod workflow;

pub use adapters::{
    AdapterError, AdapterResult, Classifier, Entity, Fixtures, InMemoryStore, Mail, Notifier,
    TicketStore, TicketText,
};
pub use classify::{parse_triage_response, TriageSuggestion};
pub use config::{ConfigError, TriageConfig};
pub use events::{DispatchOutcome, Dispatcher, DomainEvent, EventBus, EventName, ListenReport};
pub use handlers::{default_workflows, Services};
pub use model::{Priority, Role, Ticket, TicketPatch, User};
pub use resolver::{ModeratorResolver, SkillPattern};
pub use service::{ServiceError, TicketService};
pub use state_machine::{IllegalTransition, TicketStatus};
pub use workflow::{
    FailureClass, Orchestrator, RetryPolicy, RunOutcome, Step, StepError, StepStatus, Workflow,
};
