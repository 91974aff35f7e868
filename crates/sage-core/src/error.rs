use thiserror::Error;

/// Core error type for the Sage runtime
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Workflow definition not found
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Capability action not found
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    /// Request queue is at capacity
    #[error("Request queue full: {queued} queued, limit {max_queued}")]
    QueueFull {
        /// Requests currently queued
        queued: usize,
        /// Configured queue limit
        max_queued: usize,
    },

    /// Step execution error
    #[error("Step execution error: {0}")]
    StepExecutionError(String),

    /// Workflow run exceeded its overall timeout
    #[error("Workflow timed out: {0}")]
    WorkflowTimeout(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                CoreError::WorkflowNotFound("daily_review".to_string()),
                "Workflow not found: daily_review",
            ),
            (
                CoreError::CapabilityNotFound("environment.scan".to_string()),
                "Capability not found: environment.scan",
            ),
            (
                CoreError::QueueFull {
                    queued: 100,
                    max_queued: 100,
                },
                "Request queue full: 100 queued, limit 100",
            ),
            (
                CoreError::StepExecutionError("boom".to_string()),
                "Step execution error: boom",
            ),
            (
                CoreError::WorkflowTimeout("daily_review".to_string()),
                "Workflow timed out: daily_review",
            ),
            (
                CoreError::ValidationError("invalid".to_string()),
                "Validation error: invalid",
            ),
            (
                CoreError::ConfigurationError("bad".to_string()),
                "Configuration error: bad",
            ),
            (CoreError::Other("other_err".to_string()), "other_err"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: CoreError = json_error.into();

        match error {
            CoreError::SerializationError(msg) => {
                assert!(msg.contains("expected value"));
            }
            _ => panic!("Expected SerializationError variant"),
        }
    }

    #[test]
    fn test_from_string_and_str() {
        let from_string: CoreError = "test error".to_string().into();
        let from_str: CoreError = "test error".into();
        assert_eq!(from_string, from_str);
    }
}
