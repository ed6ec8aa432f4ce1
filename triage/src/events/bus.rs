//! Event bus for ticket lifecycle events
//!
//! Pub/sub over a Tokio broadcast channel. Lifecycle actions publish and
//! return; the dispatcher consumes the bus and runs workflows.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::DomainEvent;

/// Default channel capacity for broadcast
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Error type for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("No subscribers for event {name} ({id})")]
    NoSubscribers { name: String, id: String },
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an event bus with a custom channel capacity (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers, returning how many received it.
    ///
    /// An event nobody is listening for would be lost, so that is an error.
    pub fn publish(&self, event: DomainEvent) -> EventBusResult<usize> {
        let name = event.name.clone();
        let id = event.id.clone();

        match self.sender.send(event) {
            Ok(count) => {
                debug!(event = %name, event_id = %id, receivers = count, "Event published");
                Ok(count)
            }
            Err(_) => Err(EventBusError::NoSubscribers { name, id }),
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by ticket ID
    pub ticket_id: Option<String>,
    /// Filter by event names
    pub names: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a new empty filter (matches all events)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(mut self, ticket_id: &str) -> Self {
        self.ticket_id = Some(ticket_id.to_string());
        self
    }

    pub fn names(mut self, names: Vec<&str>) -> Self {
        self.names = Some(names.into_iter().map(String::from).collect());
        self
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &DomainEvent) -> bool {
        if let Some(ref tid) = self.ticket_id {
            if event.ticket_id() != Some(tid.as_str()) {
                return false;
            }
        }

        if let Some(ref names) = self.names {
            if !names.iter().any(|n| n == &event.name) {
                return false;
            }
        }

        true
    }
}

/// Filtered event receiver that only yields matching events
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<DomainEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<DomainEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

impl From<broadcast::Receiver<DomainEvent>> for FilteredReceiver {
    fn from(receiver: broadcast::Receiver<DomainEvent>) -> Self {
        Self::new(receiver, EventFilter::new())
    }
}

/// Extension trait for subscribing with filters
pub trait EventBusExt {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver;
}

impl EventBusExt for EventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

impl EventBusExt for SharedEventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}
