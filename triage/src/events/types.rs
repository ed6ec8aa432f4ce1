//! Domain event types for the ticket lifecycle.
//!
//! Events are value objects: a name, a JSON payload, and bookkeeping. The
//! payload stays untyped on the event itself so that unknown or malformed
//! events can still travel through the bus and be dropped or rejected at
//! dispatch; workflows decode it with [`DomainEvent::payload_as`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::state_machine::TicketStatus;

/// Unique identifier for an event delivery.
pub type EventId = String;

/// Event names the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "ticket/created")]
    TicketCreated,
    #[serde(rename = "ticket/closed")]
    TicketClosed,
    #[serde(rename = "ticket/updated")]
    TicketUpdated,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TicketCreated => "ticket/created",
            Self::TicketClosed => "ticket/closed",
            Self::TicketUpdated => "ticket/updated",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticket/created" => Ok(Self::TicketCreated),
            "ticket/closed" => Ok(Self::TicketClosed),
            "ticket/updated" => Ok(Self::TicketUpdated),
            other => Err(format!("unknown event name: {other}")),
        }
    }
}

/// Payload of `ticket/created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketCreated {
    pub ticket_id: String,
}

/// Minimal user reference embedded in event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
}

/// Payload of `ticket/closed`: a snapshot taken when the event was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketClosed {
    pub ticket_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TicketStatus,
    pub created_by: String,
    #[serde(default)]
    pub assigned_to: Option<UserRef>,
}

/// Payload of `ticket/updated` (explicit reassignment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdated {
    pub ticket_id: String,
    pub status: TicketStatus,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

/// A domain event as delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Delivery id; redeliveries of the same logical event get new ids.
    #[serde(default = "DomainEvent::new_id")]
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    /// Generate a new unique event ID
    pub fn new_id() -> EventId {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Self::new_id(),
            name: name.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    fn typed<T: Serialize>(name: EventName, payload: &T) -> Self {
        // Plain structs of strings and enums always serialize.
        let payload = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
        Self::new(name.as_str(), payload)
    }

    pub fn ticket_created(ticket_id: impl Into<String>) -> Self {
        Self::typed(
            EventName::TicketCreated,
            &TicketCreated {
                ticket_id: ticket_id.into(),
            },
        )
    }

    pub fn ticket_closed(payload: &TicketClosed) -> Self {
        Self::typed(EventName::TicketClosed, payload)
    }

    pub fn ticket_updated(payload: &TicketUpdated) -> Self {
        Self::typed(EventName::TicketUpdated, payload)
    }

    /// Known event name, or `None` for names no workflow handles.
    pub fn event_name(&self) -> Option<EventName> {
        self.name.parse().ok()
    }

    /// `ticketId` from the payload, if present.
    pub fn ticket_id(&self) -> Option<&str> {
        self.payload.get("ticketId").and_then(|v| v.as_str())
    }

    /// Decode the payload into its typed form.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
