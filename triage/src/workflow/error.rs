//! Step error taxonomy with retry classification.
//!
//! Every failure a step can produce is represented here. The orchestrator
//! asks [`StepError::class`] whether to retry instead of inspecting messages.
//!
//! | Variant           | Class     |
//! |-------------------|-----------|
//! | NotFound          | terminal  |
//! | IllegalTransition | terminal  |
//! | InvalidPayload    | terminal  |
//! | Checkpoint        | terminal  |
//! | Dependency        | per [`AdapterError::is_transient`] |
//! | Timeout           | transient |

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::{AdapterError, Entity};
use crate::state_machine::IllegalTransition;

/// Whether a failed step is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Retrying cannot help; abort the run.
    Terminal,
    /// Expected to clear up; retry the same step.
    Transient,
}

impl FailureClass {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal => write!(f, "terminal"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// Unified error type for workflow steps.
#[derive(Debug, Error)]
pub enum StepError {
    /// A referenced ticket or user does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// A status write would move the ticket backwards.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// The event payload is missing fields or has the wrong shape.
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    /// An earlier step's checkpoint is missing or cannot be decoded.
    #[error("Checkpoint '{step}' unusable: {message}")]
    Checkpoint { step: String, message: String },

    /// A collaborator call failed.
    #[error("Dependency failure: {0}")]
    Dependency(AdapterError),

    /// The step exceeded its time budget.
    #[error("Step '{step}' timed out after {after_ms}ms")]
    Timeout { step: String, after_ms: u64 },
}

impl StepError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn checkpoint(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Checkpoint {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Classify this error for retry logic.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::NotFound { .. }
            | Self::IllegalTransition(_)
            | Self::InvalidPayload(_)
            | Self::Checkpoint { .. } => FailureClass::Terminal,
            Self::Dependency(e) if e.is_transient() => FailureClass::Transient,
            Self::Dependency(_) => FailureClass::Terminal,
            Self::Timeout { .. } => FailureClass::Transient,
        }
    }

    /// Returns `true` if the orchestrator may retry after this error.
    pub fn is_retriable(&self) -> bool {
        self.class().is_retriable()
    }
}

impl From<AdapterError> for StepError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound { entity, id } => Self::NotFound { entity, id },
            AdapterError::IllegalTransition(t) => Self::IllegalTransition(t),
            other => Self::Dependency(other),
        }
    }
}

pub type StepResult<T> = Result<T, StepError>;
