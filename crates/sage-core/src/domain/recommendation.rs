use crate::CoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Rating signal recorded when a recommendation is implemented
pub const IMPLEMENTED_RATING: f64 = 4.0;

/// Rating signal recorded when a recommendation is dismissed
pub const DISMISSED_RATING: f64 = 1.0;

/// Value object: Recommendation ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationId(pub String);

/// Ordinal priority of a recommendation
///
/// Ordering follows declaration order: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    /// Nice-to-have suggestion
    Low,

    /// Worth acting on soon
    Medium,

    /// Important and time-sensitive
    High,

    /// Demands immediate attention
    Critical,
}

/// Recommendation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationStatus {
    /// Visible in the active set
    Active,

    /// The consumer acted on it
    Implemented,

    /// The consumer rejected it
    Dismissed,

    /// Its validity window elapsed
    Expired,

    /// Evicted to make room for higher-ranked items
    Superseded,
}

impl RecommendationStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecommendationStatus::Active)
    }
}

/// An actionable suggestion surfaced to the consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Unique identifier
    pub id: RecommendationId,

    /// Short title, also the deduplication key within a category
    pub title: String,

    /// Longer description of the suggested action
    pub description: String,

    /// Category the recommendation belongs to
    pub category: String,

    /// Ordinal priority
    pub priority: Priority,

    /// Producer confidence in [0, 1]
    pub confidence: f64,

    /// Estimated impact in [0, 1]
    pub impact: f64,

    /// When the producer created it
    pub created_at: DateTime<Utc>,

    /// When it leaves the active set; reassigned at admission
    pub expires_at: DateTime<Utc>,

    /// Current status
    pub status: RecommendationStatus,
}

impl Recommendation {
    /// Create a new active candidate recommendation
    ///
    /// `confidence` and `impact` are clamped into [0, 1]; the validity
    /// window is clamped to at least one second so `expires_at` always
    /// exceeds `created_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        priority: Priority,
        confidence: f64,
        impact: f64,
        created_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        let validity = validity.max(Duration::seconds(1));
        Self {
            id: RecommendationId(Uuid::new_v4().to_string()),
            title: title.into(),
            description: description.into(),
            category: category.into(),
            priority,
            confidence: confidence.clamp(0.0, 1.0),
            impact: impact.clamp(0.0, 1.0),
            created_at,
            expires_at: created_at + validity,
            status: RecommendationStatus::Active,
        }
    }

    /// Whether the validity window has elapsed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Move the recommendation into a terminal status
    ///
    /// Terminal statuses are mutually exclusive and final; there is no
    /// path back to `Active`.
    pub fn transition(&mut self, to: RecommendationStatus) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::Other(format!(
                "Recommendation {} is already terminal: {:?}",
                self.id.0, self.status
            )));
        }
        if !to.is_terminal() {
            return Err(CoreError::Other(format!(
                "Recommendation {} cannot transition to {:?}",
                self.id.0, to
            )));
        }
        self.status = to;
        Ok(())
    }
}

/// Title similarity as a token-overlap ratio:
/// `|intersection(words)| / |union(words)|`
///
/// Case-insensitive; identical titles score 1.0, disjoint titles 0.0.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let words_b: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    intersection as f64 / union as f64
}

/// Per-category acceptance statistics fed by terminal transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFeedback {
    /// The category these statistics describe
    pub category: String,

    /// How many recommendations in this category were implemented
    pub implemented_count: u32,

    /// How many recommendations in this category were dismissed
    pub dismissed_count: u32,

    /// Running average of the recorded rating signals
    pub rolling_average_rating: f64,
}

impl CategoryFeedback {
    /// Create an empty feedback record for a category
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            implemented_count: 0,
            dismissed_count: 0,
            rolling_average_rating: 0.0,
        }
    }

    /// Total recorded samples
    pub fn sample_count(&self) -> u32 {
        self.implemented_count + self.dismissed_count
    }

    /// Record an implemented recommendation
    pub fn record_implemented(&mut self) {
        self.record_rating(IMPLEMENTED_RATING);
        self.implemented_count += 1;
    }

    /// Record a dismissed recommendation
    pub fn record_dismissed(&mut self) {
        self.record_rating(DISMISSED_RATING);
        self.dismissed_count += 1;
    }

    fn record_rating(&mut self, rating: f64) {
        let n = self.sample_count() as f64;
        self.rolling_average_rating = (self.rolling_average_rating * n + rating) / (n + 1.0);
    }

    /// Whether the category has enough samples to be judged, and the
    /// judgment is poor
    pub fn is_poor(&self, floor: f64, min_samples: u32) -> bool {
        self.sample_count() >= min_samples && self.rolling_average_rating < floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, category: &str, priority: Priority) -> Recommendation {
        Recommendation::new(
            title,
            "description",
            category,
            priority,
            0.9,
            0.5,
            Utc::now(),
            Duration::hours(24),
        )
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn test_new_clamps_scores() {
        let rec = Recommendation::new(
            "title",
            "description",
            "Environmental",
            Priority::Low,
            1.7,
            -0.3,
            Utc::now(),
            Duration::hours(1),
        );

        assert_eq!(rec.confidence, 1.0);
        assert_eq!(rec.impact, 0.0);
        assert_eq!(rec.status, RecommendationStatus::Active);
    }

    #[test]
    fn test_expires_after_created() {
        let now = Utc::now();
        let rec = Recommendation::new(
            "title",
            "description",
            "Environmental",
            Priority::Low,
            0.9,
            0.5,
            now,
            Duration::seconds(0),
        );
        assert!(rec.expires_at > rec.created_at);
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let rec = Recommendation::new(
            "title",
            "description",
            "Environmental",
            Priority::Low,
            0.9,
            0.5,
            now,
            Duration::hours(1),
        );

        assert!(!rec.is_expired(now));
        assert!(!rec.is_expired(now + Duration::minutes(59)));
        assert!(rec.is_expired(now + Duration::minutes(61)));
    }

    #[test]
    fn test_transition_is_terminal_once() {
        let mut rec = candidate("title", "Environmental", Priority::Low);

        rec.transition(RecommendationStatus::Implemented).unwrap();
        assert_eq!(rec.status, RecommendationStatus::Implemented);

        let result = rec.transition(RecommendationStatus::Dismissed);
        assert!(result.is_err());
        assert_eq!(rec.status, RecommendationStatus::Implemented);
    }

    #[test]
    fn test_transition_rejects_active_target() {
        let mut rec = candidate("title", "Environmental", Priority::Low);
        assert!(rec.transition(RecommendationStatus::Active).is_err());
    }

    #[test]
    fn test_title_similarity_partial_overlap() {
        // 2 shared words out of a 4-word union.
        let similarity =
            title_similarity("HVAC Efficiency Alert", "HVAC Efficiency Warning");
        assert!((similarity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_title_similarity_identical_and_disjoint() {
        assert_eq!(
            title_similarity("HVAC Efficiency Alert", "hvac efficiency alert"),
            1.0
        );
        assert_eq!(title_similarity("prune canopy", "adjust irrigation"), 0.0);
    }

    #[test]
    fn test_category_feedback_running_average() {
        let mut feedback = CategoryFeedback::new("Environmental");

        feedback.record_implemented();
        assert_eq!(feedback.rolling_average_rating, IMPLEMENTED_RATING);

        feedback.record_dismissed();
        assert_eq!(
            feedback.rolling_average_rating,
            (IMPLEMENTED_RATING + DISMISSED_RATING) / 2.0
        );
        assert_eq!(feedback.implemented_count, 1);
        assert_eq!(feedback.dismissed_count, 1);
    }

    #[test]
    fn test_category_feedback_poor_requires_samples() {
        let mut feedback = CategoryFeedback::new("Market");

        feedback.record_dismissed();
        feedback.record_dismissed();
        // Rating is 1.0 but only two samples recorded.
        assert!(!feedback.is_poor(2.0, 5));

        for _ in 0..3 {
            feedback.record_dismissed();
        }
        assert!(feedback.is_poor(2.0, 5));
    }
}
