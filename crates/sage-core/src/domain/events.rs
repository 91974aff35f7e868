use crate::domain::recommendation::Recommendation;
use crate::domain::request::RequestId;
use crate::domain::workflow::WorkflowId;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use tokio::sync::mpsc;

/// Advisory event trait for all events emitted by the core
pub trait AdvisoryEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Sink for advisory events
///
/// Dispatch is fire-and-forget: implementations must not block the
/// caller, which still holds no core lock but sits on the hot path.
pub trait NotificationSink: Send + Sync {
    /// Deliver an event to the sink
    fn notify(&self, event: Box<dyn AdvisoryEvent>);
}

/// Event: a workflow request was received
#[derive(Debug)]
pub struct RequestReceived {
    /// The request that was received
    pub request_id: RequestId,

    /// The workflow it names
    pub workflow_id: WorkflowId,

    /// When the request was received
    pub timestamp: DateTime<Utc>,
}

impl AdvisoryEvent for RequestReceived {
    fn event_type(&self) -> &'static str {
        "request.received"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: a workflow request completed successfully
#[derive(Debug)]
pub struct RequestCompleted {
    /// The request that completed
    pub request_id: RequestId,

    /// The workflow it named
    pub workflow_id: WorkflowId,

    /// Wall-clock run duration in milliseconds
    pub duration_ms: u64,

    /// When the request completed
    pub timestamp: DateTime<Utc>,
}

impl AdvisoryEvent for RequestCompleted {
    fn event_type(&self) -> &'static str {
        "request.completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: a workflow request failed
#[derive(Debug)]
pub struct RequestFailed {
    /// The request that failed
    pub request_id: RequestId,

    /// The workflow it named
    pub workflow_id: WorkflowId,

    /// The error message
    pub error: String,

    /// When the request failed
    pub timestamp: DateTime<Utc>,
}

impl AdvisoryEvent for RequestFailed {
    fn event_type(&self) -> &'static str {
        "request.failed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: a candidate recommendation was admitted to the active set
#[derive(Debug)]
pub struct RecommendationAdmitted {
    /// Snapshot of the admitted recommendation
    pub recommendation: Recommendation,

    /// When the admission happened
    pub timestamp: DateTime<Utc>,
}

impl AdvisoryEvent for RecommendationAdmitted {
    fn event_type(&self) -> &'static str {
        "recommendation.admitted"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: an active recommendation expired
#[derive(Debug)]
pub struct RecommendationExpired {
    /// Snapshot of the expired recommendation
    pub recommendation: Recommendation,

    /// When the expiration was observed
    pub timestamp: DateTime<Utc>,
}

impl AdvisoryEvent for RecommendationExpired {
    fn event_type(&self) -> &'static str {
        "recommendation.expired"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: a recommendation was marked implemented
#[derive(Debug)]
pub struct RecommendationImplemented {
    /// Snapshot of the implemented recommendation
    pub recommendation: Recommendation,

    /// When the feedback was recorded
    pub timestamp: DateTime<Utc>,
}

impl AdvisoryEvent for RecommendationImplemented {
    fn event_type(&self) -> &'static str {
        "recommendation.implemented"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: a recommendation was dismissed
#[derive(Debug)]
pub struct RecommendationDismissed {
    /// Snapshot of the dismissed recommendation
    pub recommendation: Recommendation,

    /// Optional reason supplied by the caller
    pub reason: Option<String>,

    /// When the feedback was recorded
    pub timestamp: DateTime<Utc>,
}

impl AdvisoryEvent for RecommendationDismissed {
    fn event_type(&self) -> &'static str {
        "recommendation.dismissed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Sink that logs every event through `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: Box<dyn AdvisoryEvent>) {
        tracing::info!(
            event_type = event.event_type(),
            event = ?event,
            "Advisory event"
        );
    }
}

/// Sink that buffers events onto an unbounded channel
///
/// The send never blocks; if the receiver has gone away the event is
/// dropped, which keeps the core decoupled from slow consumers.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Box<dyn AdvisoryEvent>>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Box<dyn AdvisoryEvent>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: Box<dyn AdvisoryEvent>) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Priority;

    fn sample_recommendation() -> Recommendation {
        Recommendation::new(
            "Adjust climate setpoint",
            "Zone two is running warm",
            "Environmental",
            Priority::Medium,
            0.8,
            0.6,
            Utc::now(),
            chrono::Duration::hours(24),
        )
    }

    #[test]
    fn test_event_types() {
        let timestamp = Utc::now();
        let request_id = RequestId("req-1".to_string());
        let workflow_id = WorkflowId("wf-1".to_string());

        let received = RequestReceived {
            request_id: request_id.clone(),
            workflow_id: workflow_id.clone(),
            timestamp,
        };
        assert_eq!(received.event_type(), "request.received");
        assert_eq!(received.timestamp(), timestamp);

        let completed = RequestCompleted {
            request_id: request_id.clone(),
            workflow_id: workflow_id.clone(),
            duration_ms: 12,
            timestamp,
        };
        assert_eq!(completed.event_type(), "request.completed");

        let failed = RequestFailed {
            request_id,
            workflow_id,
            error: "boom".to_string(),
            timestamp,
        };
        assert_eq!(failed.event_type(), "request.failed");

        let admitted = RecommendationAdmitted {
            recommendation: sample_recommendation(),
            timestamp,
        };
        assert_eq!(admitted.event_type(), "recommendation.admitted");

        let expired = RecommendationExpired {
            recommendation: sample_recommendation(),
            timestamp,
        };
        assert_eq!(expired.event_type(), "recommendation.expired");

        let implemented = RecommendationImplemented {
            recommendation: sample_recommendation(),
            timestamp,
        };
        assert_eq!(implemented.event_type(), "recommendation.implemented");

        let dismissed = RecommendationDismissed {
            recommendation: sample_recommendation(),
            reason: Some("not relevant".to_string()),
            timestamp,
        };
        assert_eq!(dismissed.event_type(), "recommendation.dismissed");
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_events() {
        let (sink, mut rx) = ChannelSink::new();

        sink.notify(Box::new(RequestReceived {
            request_id: RequestId("req-1".to_string()),
            workflow_id: WorkflowId("wf-1".to_string()),
            timestamp: Utc::now(),
        }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "request.received");
    }

    #[test]
    fn test_channel_sink_tolerates_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);

        // Must not panic or block.
        sink.notify(Box::new(RequestReceived {
            request_id: RequestId("req-1".to_string()),
            workflow_id: WorkflowId("wf-1".to_string()),
            timestamp: Utc::now(),
        }));
    }
}
