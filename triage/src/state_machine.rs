//! Ticket State Machine: explicit statuses and legal transition guards.
//!
//! Every status write in the crate goes through [`TicketStatus::transition`]
//! so that a ticket can never move backwards. Workflow steps use
//! [`TicketStatus::advance_target`] to express "advance or stay", which keeps
//! redelivered events from rewinding a ticket that already moved on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The set of ticket statuses, in lifecycle order.
///
/// Every ticket starts at `Created` and ends at `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Stored by the intake action, not yet picked up by triage.
    Created,
    /// Picked up by triage, awaiting classification.
    Todo,
    /// Classified and (possibly) assigned.
    InProgress,
    /// Closed by an explicit action; terminal state.
    Closed,
}

impl TicketStatus {
    /// Whether this is a terminal status (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Wire name, as stored in ticket documents and event payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Closed => "CLOSED",
        }
    }

    /// Lowercase label for human-facing text ("in progress").
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Todo => "todo",
            Self::InProgress => "in progress",
            Self::Closed => "closed",
        }
    }

    /// Validate a transition from `self` to `to`.
    ///
    /// Staying in place is always accepted so that re-applying a patch is a
    /// no-op rather than an error.
    pub fn transition(self, to: TicketStatus) -> Result<TicketStatus, IllegalTransition> {
        if self == to || is_legal_transition(self, to) {
            Ok(to)
        } else {
            Err(IllegalTransition { from: self, to })
        }
    }

    /// Status to write for an "advance or stay" move towards `target`.
    ///
    /// Returns `None` when the ticket is already at or past `target`.
    pub fn advance_target(self, target: TicketStatus) -> Option<TicketStatus> {
        if self < target {
            Some(target)
        } else {
            None
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "CLOSED" => Ok(Self::Closed),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

/// Legal transitions between ticket statuses.
///
/// ```text
/// Created → Todo | InProgress | Closed
/// Todo → InProgress | Closed
/// InProgress → Closed
/// ```
fn is_legal_transition(from: TicketStatus, to: TicketStatus) -> bool {
    // Closed is reachable from any open status through an explicit close.
    if to == TicketStatus::Closed && !from.is_terminal() {
        return true;
    }
    from < to
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Illegal status transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: TicketStatus,
    pub to: TicketStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert_eq!(
            TicketStatus::Created.transition(TicketStatus::Todo),
            Ok(TicketStatus::Todo)
        );
        assert_eq!(
            TicketStatus::Todo.transition(TicketStatus::InProgress),
            Ok(TicketStatus::InProgress)
        );
        assert_eq!(
            TicketStatus::InProgress.transition(TicketStatus::Closed),
            Ok(TicketStatus::Closed)
        );
    }

    #[test]
    fn test_close_from_any_open_status() {
        for status in [
            TicketStatus::Created,
            TicketStatus::Todo,
            TicketStatus::InProgress,
        ] {
            assert!(status.transition(TicketStatus::Closed).is_ok());
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        for status in [
            TicketStatus::Created,
            TicketStatus::Todo,
            TicketStatus::InProgress,
            TicketStatus::Closed,
        ] {
            assert_eq!(status.transition(status), Ok(status));
        }
    }

    #[test]
    fn test_illegal_backward_transition() {
        let err = TicketStatus::InProgress
            .transition(TicketStatus::Todo)
            .unwrap_err();
        assert_eq!(err.from, TicketStatus::InProgress);
        assert_eq!(err.to, TicketStatus::Todo);
        assert!(TicketStatus::Closed
            .transition(TicketStatus::InProgress)
            .is_err());
    }

    #[test]
    fn test_advance_target() {
        assert_eq!(
            TicketStatus::Created.advance_target(TicketStatus::Todo),
            Some(TicketStatus::Todo)
        );
        assert_eq!(TicketStatus::Todo.advance_target(TicketStatus::Todo), None);
        assert_eq!(
            TicketStatus::Closed.advance_target(TicketStatus::InProgress),
            None
        );
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let parsed: TicketStatus = serde_json::from_str("\"TODO\"").unwrap();
        assert_eq!(parsed, TicketStatus::Todo);
        assert_eq!("closed".parse::<TicketStatus>(), Ok(TicketStatus::Closed));
    }

    #[test]
    fn test_display() {
        assert_eq!(TicketStatus::InProgress.to_string(), "IN_PROGRESS");
        let err = IllegalTransition {
            from: TicketStatus::Closed,
            to: TicketStatus::Todo,
        };
        assert_eq!(err.to_string(), "Illegal status transition: CLOSED → TODO");
    }
}
