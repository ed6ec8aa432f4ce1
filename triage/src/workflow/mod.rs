//! Durable-in-process workflow execution.
//!
//! A [`Workflow`] is an ordered list of named [`Step`]s. The [`Orchestrator`]
//! runs them one at a time against a [`WorkflowRun`], checkpointing each
//! result and classifying failures as terminal or transient.

pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod run;

pub use error::{FailureClass, StepError, StepResult};
pub use orchestrator::{Orchestrator, RunOutcome, Step, StepReport, StepStatus, Workflow};
pub use retry::RetryPolicy;
pub use run::{to_checkpoint, WorkflowRun};
