//! Domain events and their routing.
//!
//! ```text
//! ┌────────────────┐  publish  ┌────────────┐  recv   ┌────────────┐  run   ┌──────────────┐
//! │ TicketService  │──────────▶│  EventBus  │────────▶│ Dispatcher │───────▶│ Orchestrator │
//! └────────────────┘           └────────────┘         └────────────┘        └──────────────┘
//! ```
//!
//! The bus is optional: tests and replay tools call
//! [`Dispatcher::dispatch`] directly.

pub mod bus;
pub mod dispatcher;
pub mod types;

pub use bus::{
    EventBus, EventBusError, EventBusExt, EventBusResult, EventFilter, FilteredReceiver,
    SharedEventBus,
};
pub use dispatcher::{DispatchOutcome, Dispatcher, ListenReport};
pub use types::{
    DomainEvent, EventId, EventName, TicketClosed, TicketCreated, TicketUpdated, UserRef,
};
