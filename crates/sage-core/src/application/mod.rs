/// Capability action registry
pub mod capability_registry;

/// Immutable catalog of validated workflow definitions
pub mod definition_store;

/// Workflow execution service
pub mod workflow_execution_service;

/// Recommendation lifecycle service
pub mod recommendation_service;
