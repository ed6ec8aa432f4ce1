//! Workflow run context: the triggering event plus named step checkpoints.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{StepError, StepResult};
use crate::events::DomainEvent;

/// One execution of a workflow for one event delivery.
///
/// Checkpoints live only as long as the run. A step that already has a
/// checkpoint is not executed again if the run is resumed.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    workflow: String,
    event: DomainEvent,
    checkpoints: Vec<(String, serde_json::Value)>,
}

impl WorkflowRun {
    pub fn new(workflow: impl Into<String>, event: DomainEvent) -> Self {
        Self {
            workflow: workflow.into(),
            event,
            checkpoints: Vec::new(),
        }
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn event(&self) -> &DomainEvent {
        &self.event
    }

    pub fn ticket_id(&self) -> Option<&str> {
        self.event.ticket_id()
    }

    /// Decode the event payload; a shape mismatch is terminal.
    pub fn payload<T: DeserializeOwned>(&self) -> StepResult<T> {
        self.event
            .payload_as()
            .map_err(|e| StepError::InvalidPayload(format!("{}: {e}", self.event.name)))
    }

    pub fn has_checkpoint(&self, step: &str) -> bool {
        self.checkpoint_value(step).is_some()
    }

    pub fn checkpoint_value(&self, step: &str) -> Option<&serde_json::Value> {
        self.checkpoints
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, value)| value)
    }

    /// Decode the checkpoint recorded by an earlier step.
    pub fn checkpoint<T: DeserializeOwned>(&self, step: &str) -> StepResult<T> {
        let value = self
            .checkpoint_value(step)
            .ok_or_else(|| StepError::checkpoint(step, "no result recorded"))?;
        serde_json::from_value(value.clone())
            .map_err(|e| StepError::checkpoint(step, e.to_string()))
    }

    /// Step names with checkpoints, in completion order.
    pub fn completed_steps(&self) -> impl Iterator<Item = &str> {
        self.checkpoints.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn record(&mut self, step: &str, value: serde_json::Value) {
        match self.checkpoints.iter_mut().find(|(name, _)| name == step) {
            Some(slot) => slot.1 = value,
            None => self.checkpoints.push((step.to_string(), value)),
        }
    }
}

/// Encode a step result as a checkpoint value.
pub fn to_checkpoint<T: Serialize>(step: &str, value: &T) -> StepResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StepError::checkpoint(step, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TicketCreated;
    use serde_json::json;

    #[test]
    fn test_checkpoints_roundtrip_in_order() {
        let mut run = WorkflowRun::new("wf", DomainEvent::ticket_created("t-1"));
        run.record("first", json!(1));
        run.record("second", json!({ "ok": true }));
        run.record("first", json!(2));

        assert_eq!(run.checkpoint::<u32>("first").unwrap(), 2);
        assert!(run.has_checkpoint("second"));
        let names: Vec<&str> = run.completed_steps().collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_missing_checkpoint_is_terminal() {
        let run = WorkflowRun::new("wf", DomainEvent::ticket_created("t-1"));
        let err = run.checkpoint::<u32>("nope").unwrap_err();
        assert!(matches!(err, StepError::Checkpoint { .. }));
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_payload_decoding() {
        let run = WorkflowRun::new("wf", DomainEvent::ticket_created("t-1"));
        let payload: TicketCreated = run.payload().unwrap();
        assert_eq!(payload.ticket_id, "t-1");

        let bad = WorkflowRun::new("wf", DomainEvent::new("ticket/created", json!({})));
        assert!(matches!(
            bad.payload::<TicketCreated>(),
            Err(StepError::InvalidPayload(_))
        ));
    }
}
