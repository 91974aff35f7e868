//!
//! Sage Core - Core runtime for the Sage advisory platform
//!
//! This crate defines the workflow orchestration engine, the
//! recommendation lifecycle manager, and the domain models and boundary
//! traits that the rest of the platform builds on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use std::collections::HashMap;

/// Domain layer - core business models, entities, and rules
pub mod domain;

/// Application services - core application logic
pub mod application;

/// Core types and traits
pub mod types;

/// Error types
pub mod error;

/// Runtime configuration
pub mod config;

/// Deterministic in-memory collaborators for tests
#[cfg(feature = "testing")]
pub mod testing;

// Re-export key types
pub use config::AdvisorConfig;
pub use error::CoreError;
pub use types::{Clock, DataPacket, SystemClock};

// Re-export main API types for easy use
pub use application::capability_registry::CapabilityRegistry;
pub use application::definition_store::WorkflowDefinitionStore;
pub use application::recommendation_service::RecommendationService;
pub use application::workflow_execution_service::{
    ExecutorStats, StepTiming, WorkflowExecutionService, WorkflowOutcome,
};
pub use domain::events::{AdvisoryEvent, ChannelSink, NotificationSink, TracingSink};
pub use domain::recommendation::{
    CategoryFeedback, Priority, Recommendation, RecommendationId, RecommendationStatus,
};
pub use domain::request::{RequestId, RequestStatus, WorkflowRequest, WorkflowRun};
pub use domain::workflow::{
    PriorityClass, StepDefinition, StepId, WorkflowDefinition, WorkflowId,
};

/// Context handed to a capability action when a workflow step invokes it
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// The request this invocation belongs to
    pub request_id: RequestId,

    /// The workflow definition being executed
    pub workflow_id: WorkflowId,

    /// The step being executed
    pub step_id: StepId,

    /// The opaque payload the request was submitted with
    pub payload: DataPacket,

    /// Results of every step that completed earlier in this run
    pub step_results: HashMap<StepId, DataPacket>,
}

impl ActionContext {
    /// Look up the recorded result of an earlier step by id
    pub fn step_result(&self, step_id: &str) -> Option<&DataPacket> {
        self.step_results.get(&StepId(step_id.to_string()))
    }
}

/// Output of a capability action: the step result plus any candidate
/// recommendations the action wants to surface to the advisory store
#[derive(Debug, Clone)]
pub struct ActionOutput {
    /// The step result, recorded into the run's result map
    pub result: DataPacket,

    /// Candidate recommendations produced by this invocation
    pub recommendations: Vec<Recommendation>,
}

impl ActionOutput {
    /// Create an output with no candidate recommendations
    pub fn new(result: DataPacket) -> Self {
        Self {
            result,
            recommendations: Vec::new(),
        }
    }

    /// Attach candidate recommendations to this output
    pub fn with_recommendations(mut self, recommendations: Vec<Recommendation>) -> Self {
        self.recommendations = recommendations;
        self
    }
}

/// A callable action offered by a named service capability
///
/// The executor resolves `(capability, action)` pairs against the
/// [`CapabilityRegistry`] when a workflow definition is registered, and
/// invokes the handler with the accumulated step results at run time.
/// The core does not know how the handler computes its answer.
#[async_trait]
pub trait CapabilityAction: Send + Sync {
    /// Execute the action with the given context
    async fn execute(&self, context: ActionContext) -> Result<ActionOutput, CoreError>;
}

/// Example action that echoes the request payload back as its result
#[derive(Debug)]
pub struct EchoAction;

#[async_trait]
impl CapabilityAction for EchoAction {
    async fn execute(&self, context: ActionContext) -> Result<ActionOutput, CoreError> {
        tracing::debug!(
            request_id = %context.request_id.0,
            step_id = %context.step_id.0,
            "Echoing request payload"
        );
        Ok(ActionOutput::new(context.payload))
    }
}
