use crate::domain::workflow::{PriorityClass, StepDefinition, StepId, WorkflowId};
use crate::{CoreError, DataPacket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Value object: Request ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Workflow request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Request has been created and accepted for admission
    Received,

    /// Request is waiting in the FIFO queue for a free slot
    Queued,

    /// Request is currently executing
    Running,

    /// Request completed successfully
    Completed,

    /// Request failed
    Failed,

    /// Request was cancelled before its remaining steps started
    Cancelled,
}

impl RequestStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
        )
    }
}

/// A request to execute a registered workflow
///
/// Created when submitted, mutated only by the executor, and dropped
/// after its terminal state is reported; only aggregate statistics
/// outlive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    /// Unique identifier
    pub id: RequestId,

    /// The workflow definition to execute
    pub workflow_id: WorkflowId,

    /// Opaque payload handed to every step
    pub payload: DataPacket,

    /// Request priority
    pub priority: PriorityClass,

    /// When the request was submitted
    pub received_at: DateTime<Utc>,

    /// When execution began
    pub started_at: Option<DateTime<Utc>>,

    /// When the request reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Current status
    pub status: RequestStatus,
}

impl WorkflowRequest {
    /// Create a new request for the given workflow
    pub fn new(
        workflow_id: WorkflowId,
        payload: DataPacket,
        priority: PriorityClass,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId(Uuid::new_v4().to_string()),
            workflow_id,
            payload,
            priority,
            received_at: now,
            started_at: None,
            completed_at: None,
            status: RequestStatus::Received,
        }
    }

    /// Move the request into the queue
    pub fn mark_queued(&mut self) -> Result<(), CoreError> {
        if self.status != RequestStatus::Received {
            return Err(CoreError::Other(format!(
                "Cannot queue request in state: {:?}",
                self.status
            )));
        }
        self.status = RequestStatus::Queued;
        Ok(())
    }

    /// Begin executing the request
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != RequestStatus::Received && self.status != RequestStatus::Queued {
            return Err(CoreError::Other(format!(
                "Cannot start request in state: {:?}",
                self.status
            )));
        }
        self.status = RequestStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Complete the request successfully
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.finish(RequestStatus::Completed, now)
    }

    /// Mark the request failed
    pub fn mark_failed(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.finish(RequestStatus::Failed, now)
    }

    /// Mark the request cancelled
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.finish(RequestStatus::Cancelled, now)
    }

    fn finish(&mut self, terminal: RequestStatus, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::Other(format!(
                "Cannot move request from terminal state {:?} to {:?}",
                self.status, terminal
            )));
        }
        self.status = terminal;
        self.completed_at = Some(now);
        Ok(())
    }
}

/// Run-time instance of a workflow definition bound to a request
///
/// Exists only while the run is in flight. Invariant: a step result is
/// recorded if and only if all of that step's dependencies already have
/// recorded results.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    /// The request this run belongs to
    pub request_id: RequestId,

    /// The definition being executed
    pub workflow_id: WorkflowId,

    /// Results recorded so far, keyed by step id
    pub step_results: HashMap<StepId, DataPacket>,
}

impl WorkflowRun {
    /// Create a run with no recorded results
    pub fn new(request_id: RequestId, workflow_id: WorkflowId) -> Self {
        Self {
            request_id,
            workflow_id,
            step_results: HashMap::new(),
        }
    }

    /// Whether every dependency of the step has a recorded result
    pub fn dependencies_met(&self, step: &StepDefinition) -> bool {
        step.depends_on
            .iter()
            .all(|dep| self.step_results.contains_key(&StepId(dep.clone())))
    }

    /// Record a step result, enforcing the dependency invariant
    pub fn record_step_result(
        &mut self,
        step: &StepDefinition,
        result: DataPacket,
    ) -> Result<(), CoreError> {
        if !self.dependencies_met(step) {
            return Err(CoreError::StepExecutionError(format!(
                "Step {} completed before its dependencies were recorded",
                step.id
            )));
        }
        self.step_results.insert(StepId(step.id.clone()), result);
        Ok(())
    }
}
