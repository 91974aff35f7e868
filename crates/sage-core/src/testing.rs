//! Deterministic in-memory collaborators for tests
//!
//! These are compiled behind the `testing` feature and used by the
//! crate's own unit and integration tests; downstream crates can reuse
//! them the same way.

use crate::domain::events::{AdvisoryEvent, NotificationSink};
use crate::{ActionContext, ActionOutput, CapabilityAction, Clock, CoreError, DataPacket};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock whose current instant is advanced manually
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    /// Create a clock frozen at the given instant
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += by;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

/// Sink that records every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Box<dyn AdvisoryEvent>>>,
}

impl RecordingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Event types in delivery order
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .expect("sink lock poisoned")
            .iter()
            .map(|event| event.event_type())
            .collect()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().expect("sink lock poisoned").len()
    }

    /// Whether no events were recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: Box<dyn AdvisoryEvent>) {
        self.events.lock().expect("sink lock poisoned").push(event);
    }
}

/// Action that always succeeds with a fixed result
#[derive(Debug)]
pub struct FixedAction {
    result: DataPacket,
    recommendations: Vec<crate::Recommendation>,
}

impl FixedAction {
    /// Create an action returning the given result
    pub fn new(result: DataPacket) -> Self {
        Self {
            result,
            recommendations: Vec::new(),
        }
    }

    /// Attach candidate recommendations to every invocation
    pub fn with_recommendations(mut self, recommendations: Vec<crate::Recommendation>) -> Self {
        self.recommendations = recommendations;
        self
    }
}

#[async_trait]
impl CapabilityAction for FixedAction {
    async fn execute(&self, _context: ActionContext) -> Result<ActionOutput, CoreError> {
        Ok(ActionOutput::new(self.result.clone())
            .with_recommendations(self.recommendations.clone()))
    }
}

/// Action that always fails with a fixed message
#[derive(Debug)]
pub struct FailingAction {
    message: String,
}

impl FailingAction {
    /// Create an action failing with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl CapabilityAction for FailingAction {
    async fn execute(&self, _context: ActionContext) -> Result<ActionOutput, CoreError> {
        Err(CoreError::StepExecutionError(self.message.clone()))
    }
}

/// Action that sleeps before returning, for concurrency and timeout
/// tests
#[derive(Debug)]
pub struct SlowAction {
    delay: Duration,
    result: DataPacket,
}

impl SlowAction {
    /// Create an action that sleeps for `delay` before succeeding
    pub fn new(delay: Duration, result: DataPacket) -> Self {
        Self { delay, result }
    }
}

#[async_trait]
impl CapabilityAction for SlowAction {
    async fn execute(&self, _context: ActionContext) -> Result<ActionOutput, CoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(ActionOutput::new(self.result.clone()))
    }
}

/// Action that records the step id of every invocation
#[derive(Debug)]
pub struct RecordingAction {
    invocations: Arc<Mutex<Vec<String>>>,
    result: DataPacket,
}

impl RecordingAction {
    /// Create an action appending step ids to the shared log
    pub fn new(invocations: Arc<Mutex<Vec<String>>>, result: DataPacket) -> Self {
        Self {
            invocations,
            result,
        }
    }
}

#[async_trait]
impl CapabilityAction for RecordingAction {
    async fn execute(&self, context: ActionContext) -> Result<ActionOutput, CoreError> {
        self.invocations
            .lock()
            .expect("invocation log lock poisoned")
            .push(context.step_id.0.clone());
        Ok(ActionOutput::new(self.result.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances_only_when_told() {
        let start = Utc::now();
        let clock = MockClock::new(start);

        assert_eq!(clock.now(), start);
        clock.advance(ChronoDuration::minutes(5));
        assert_eq!(clock.now(), start + ChronoDuration::minutes(5));
    }

    #[tokio::test]
    async fn test_recording_action_logs_step_ids() {
        let invocations = Arc::new(Mutex::new(Vec::new()));
        let action = RecordingAction::new(invocations.clone(), DataPacket::null());

        let context = ActionContext {
            request_id: crate::RequestId("req".to_string()),
            workflow_id: crate::WorkflowId("wf".to_string()),
            step_id: crate::StepId("step-a".to_string()),
            payload: DataPacket::null(),
            step_results: Default::default(),
        };
        action.execute(context).await.unwrap();

        assert_eq!(*invocations.lock().unwrap(), vec!["step-a".to_string()]);
    }
}
