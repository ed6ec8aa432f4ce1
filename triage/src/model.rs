//! Ticket and user documents as the triage engine sees them.
//!
//! Field names serialize in camelCase to match the stored document shape
//! (`helpfulNotes`, `relatedSkills`, `assignedTo`, ...).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::{IllegalTransition, TicketStatus};

/// Ticket urgency assigned by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Normalize a raw priority from the classifier.
    ///
    /// Anything other than `low`, `medium` or `high` (ignoring ASCII case and
    /// surrounding whitespace), including a missing value, becomes `Medium`.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => Self::Low,
            Some("high") => Self::High,
            _ => Self::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Moderator => write!(f, "moderator"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A directory user. Only queried by the engine, never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// A support ticket document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helpful_notes: Option<String>,
    #[serde(default)]
    pub related_skills: Vec<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub created_by: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Apply a patch in place, validating any status change.
    ///
    /// The patch is applied all-or-nothing: if the status transition is
    /// illegal no field is touched.
    pub fn apply(&mut self, patch: &TicketPatch) -> Result<(), IllegalTransition> {
        if let Some(status) = patch.status {
            self.status = self.status.transition(status)?;
        }
        if let Some(priority) = patch.priority {
            self.priority = Some(priority);
        }
        if let Some(notes) = &patch.helpful_notes {
            self.helpful_notes = Some(notes.clone());
        }
        if let Some(skills) = &patch.related_skills {
            self.related_skills = skills.clone();
        }
        if let Some(assignee) = &patch.assigned_to {
            self.assigned_to = assignee.clone();
        }
        Ok(())
    }
}

/// Input for storing a brand-new ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub created_by: String,
}

/// Set-semantics patch: each present field is written as a target value.
///
/// `assigned_to` is doubly optional: `None` leaves the assignee alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helpful_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<String>>,
}

impl TicketPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn helpful_notes(mut self, notes: impl Into<String>) -> Self {
        self.helpful_notes = Some(notes.into());
        self
    }

    pub fn related_skills(mut self, skills: Vec<String>) -> Self {
        self.related_skills = Some(skills);
        self
    }

    pub fn assigned_to(mut self, assignee: Option<String>) -> Self {
        self.assigned_to = Some(assignee);
        self
    }

    /// Whether the patch writes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
