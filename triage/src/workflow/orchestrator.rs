//! Step Orchestrator: runs a workflow's ordered steps with retry classification.
//!
//! ## Lifecycle
//!
//! ```text
//! Orchestrator::run(workflow, event)
//!   → for each step, in order:
//!       checkpoint exists?          → skip, reuse it
//!       step.execute(run)
//!         Ok(value)                 → record checkpoint, next step
//!         Err(terminal)             → stop, outcome = failure
//!         Err(transient), retries   → back off, execute again
//!         Err(transient), exhausted → stop, outcome = failure
//!   → RunOutcome { success, steps, ... }
//! ```
//!
//! Side effects committed by completed steps are never rolled back; steps
//! are written as idempotent "set to target" operations instead. Nothing
//! escapes `run` except the outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::error::{FailureClass, StepError, StepResult};
use super::retry::RetryPolicy;
use super::run::WorkflowRun;
use crate::config::TriageConfig;
use crate::events::{DomainEvent, EventName};

/// A named, idempotent unit of work within a workflow.
#[async_trait]
pub trait Step: Send + Sync {
    /// Step name; doubles as the checkpoint key.
    fn name(&self) -> &'static str;

    /// Execute once. The returned value is recorded as this step's checkpoint.
    ///
    /// Must be safe to call again after a failure or on a redelivered event.
    async fn execute(&self, run: &WorkflowRun) -> StepResult<serde_json::Value>;
}

/// An ordered list of steps bound to one event name.
#[derive(Clone)]
pub struct Workflow {
    name: &'static str,
    event: EventName,
    steps: Vec<Arc<dyn Step>>,
}

impl Workflow {
    pub fn new(name: &'static str, event: EventName) -> Self {
        Self {
            name,
            event,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn event(&self) -> EventName {
        self.event
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("event", &self.event)
            .field("steps", &self.step_names())
            .finish()
    }
}

/// How a single step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    /// A checkpoint from an earlier pass was reused.
    Skipped,
    Failed,
}

/// Per-step record in a [`RunOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    /// Executions of the step in this pass (0 when skipped).
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_class: Option<FailureClass>,
}

impl StepReport {
    /// Attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Observable result of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    pub workflow: String,
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    pub steps: Vec<StepReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Total retries across all steps.
    pub fn retries(&self) -> u32 {
        self.steps.iter().map(StepReport::retries).sum()
    }
}

/// Drives workflows step by step.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    retry: RetryPolicy,
    step_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            step_timeout: None,
        }
    }

    pub fn from_config(config: &TriageConfig) -> Self {
        Self {
            retry: config.retry.clone(),
            step_timeout: config.step_timeout(),
        }
    }

    /// Bound each step execution; an elapsed bound counts as transient.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `workflow` for a fresh delivery of `event`.
    pub async fn run(&self, workflow: &Workflow, event: DomainEvent) -> RunOutcome {
        let mut run = WorkflowRun::new(workflow.name(), event);
        self.resume(workflow, &mut run).await
    }

    /// Run `workflow` against an existing run, skipping checkpointed steps.
    pub async fn resume(&self, workflow: &Workflow, run: &mut WorkflowRun) -> RunOutcome {
        let started = Instant::now();
        let event_id = run.event().id.clone();
        let ticket_id = run.ticket_id().map(String::from);

        info!(
            workflow = workflow.name(),
            event_id = %event_id,
            ticket_id = ticket_id.as_deref().unwrap_or("-"),
            "workflow run starting"
        );

        let mut reports = Vec::with_capacity(workflow.steps().len());
        let mut failure: Option<(String, StepError)> = None;

        for step in workflow.steps() {
            let name = step.name();

            if run.has_checkpoint(name) {
                debug!(workflow = workflow.name(), step = name, "step already checkpointed");
                reports.push(StepReport {
                    name: name.to_string(),
                    status: StepStatus::Skipped,
                    attempts: 0,
                    error: None,
                    failure_class: None,
                });
                continue;
            }

            let (result, attempts) = self.execute_with_retry(workflow, step.as_ref(), run).await;
            match result {
                Ok(value) => {
                    debug!(workflow = workflow.name(), step = name, attempts, "step completed");
                    run.record(name, value);
                    reports.push(StepReport {
                        name: name.to_string(),
                        status: StepStatus::Completed,
                        attempts,
                        error: None,
                        failure_class: None,
                    });
                }
                Err(e) => {
                    reports.push(StepReport {
                        name: name.to_string(),
                        status: StepStatus::Failed,
                        attempts,
                        error: Some(e.to_string()),
                        failure_class: Some(e.class()),
                    });
                    failure = Some((name.to_string(), e));
                    break;
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match failure {
            None => {
                info!(
                    workflow = workflow.name(),
                    event_id = %event_id,
                    elapsed_ms,
                    "workflow run succeeded"
                );
                RunOutcome {
                    success: true,
                    workflow: workflow.name().to_string(),
                    event_id,
                    ticket_id,
                    steps: reports,
                    failed_step: None,
                    error: None,
                    elapsed_ms,
                }
            }
            Some((step, e)) => {
                error!(
                    workflow = workflow.name(),
                    event_id = %event_id,
                    step = %step,
                    class = %e.class(),
                    error = %e,
                    "workflow run failed"
                );
                RunOutcome {
                    success: false,
                    workflow: workflow.name().to_string(),
                    event_id,
                    ticket_id,
                    steps: reports,
                    failed_step: Some(step),
                    error: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        }
    }

    /// Execute one step until it succeeds, fails terminally, or runs out of retries.
    async fn execute_with_retry(
        &self,
        workflow: &Workflow,
        step: &dyn Step,
        run: &WorkflowRun,
    ) -> (StepResult<serde_json::Value>, u32) {
        let max_attempts = self.retry.max_attempts();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let err = match self.execute_once(step, run).await {
                Ok(value) => return (Ok(value), attempts),
                Err(e) => e,
            };

            if !err.is_retriable() || attempts >= max_attempts {
                return (Err(err), attempts);
            }

            let delay = self.retry.backoff(attempts);
            warn!(
                workflow = workflow.name(),
                step = step.name(),
                attempt = attempts,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient step failure, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn execute_once(
        &self,
        step: &dyn Step,
        run: &WorkflowRun,
    ) -> StepResult<serde_json::Value> {
        match self.step_timeout {
            None => step.execute(run).await,
            Some(limit) => match tokio::time::timeout(limit, step.execute(run)).await {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout {
                    step: step.name().to_string(),
                    after_ms: limit.as_millis() as u64,
                }),
            },
        }
    }
}
