/// Workflow definitions and their validation rules
pub mod workflow;

/// Workflow requests and run-time instances
pub mod request;

/// Recommendations, their lifecycle, and category feedback
pub mod recommendation;

/// Advisory events and notification sinks
pub mod events;
