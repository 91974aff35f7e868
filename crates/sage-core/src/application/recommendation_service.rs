use crate::domain::events::{
    RecommendationAdmitted, RecommendationDismissed, RecommendationExpired,
    RecommendationImplemented,
};
use crate::domain::recommendation::{
    title_similarity, CategoryFeedback, Priority, Recommendation, RecommendationId,
    RecommendationStatus,
};
use crate::{AdvisorConfig, AdvisoryEvent, Clock, NotificationSink};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Rank weight used for categories with no configured weight
const DEFAULT_CATEGORY_WEIGHT: f64 = 0.5;

/// Mutable store state; one lock covers the active set, history ring,
/// and feedback table so insertion and eviction stay atomic
struct StoreState {
    active: Vec<Recommendation>,
    history: VecDeque<Recommendation>,
    feedback: HashMap<String, CategoryFeedback>,
    suppressed: HashSet<String>,
}

/// The bounded, deduplicated, prioritized collection of active
/// recommendations
///
/// Candidates flow through an ordered admission pipeline: confidence
/// filter, deduplication, history filtering, prioritization, per-category
/// cap, session cap. Admitted items live until they expire, are evicted
/// under capacity pressure, or receive terminal feedback. Queries return
/// point-in-time snapshots; mutation happens only through this API.
pub struct RecommendationService {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    admission_threshold: f64,
    duplicate_threshold: f64,
    max_active: usize,
    max_per_category: usize,
    max_per_session: usize,
    history_capacity: usize,
    poor_rating_floor: f64,
    min_feedback_samples: u32,
    category_weights: HashMap<String, f64>,
    validity_overrides_secs: HashMap<String, u64>,
    default_validity_secs: u64,
}

impl RecommendationService {
    /// Create a new recommendation service
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        config: &AdvisorConfig,
    ) -> Self {
        Self {
            state: Mutex::new(StoreState {
                active: Vec::new(),
                history: VecDeque::new(),
                feedback: HashMap::new(),
                suppressed: HashSet::new(),
            }),
            clock,
            sink,
            admission_threshold: config.admission_confidence_threshold,
            duplicate_threshold: config.duplicate_similarity_threshold,
            max_active: config.max_active_recommendations,
            max_per_category: config.max_per_category,
            max_per_session: config.max_per_session,
            history_capacity: config.history_capacity,
            poor_rating_floor: config.poor_rating_floor,
            min_feedback_samples: config.min_feedback_samples,
            category_weights: config.category_weights.clone(),
            validity_overrides_secs: config.validity_overrides_secs.clone(),
            default_validity_secs: config.default_validity_secs,
        }
    }

    /// Run candidates through the admission pipeline
    ///
    /// Returns snapshots of the admitted recommendations. A candidate
    /// that fails any stage is dropped, never an error.
    pub async fn ingest(&self, candidates: Vec<Recommendation>) -> Vec<Recommendation> {
        let now = self.clock.now();
        let mut events: Vec<Box<dyn AdvisoryEvent>> = Vec::new();
        let mut admitted = Vec::new();

        {
            let mut state = self.state.lock().await;
            Self::expire_locked(&mut state, now, self.history_capacity, &mut events);

            // Stages 1-3: confidence, dedup, history filtering.
            let mut survivors: Vec<Recommendation> = Vec::new();
            for candidate in candidates {
                if candidate.confidence < self.admission_threshold {
                    debug!(
                        title = %candidate.title,
                        confidence = candidate.confidence,
                        "Candidate dropped below confidence threshold"
                    );
                    continue;
                }

                let duplicate = state
                    .active
                    .iter()
                    .chain(survivors.iter())
                    .any(|existing| {
                        existing.category == candidate.category
                            && title_similarity(&existing.title, &candidate.title)
                                >= self.duplicate_threshold
                    });
                if duplicate {
                    debug!(title = %candidate.title, "Candidate dropped as duplicate");
                    continue;
                }

                if state.suppressed.contains(&candidate.category) {
                    debug!(
                        title = %candidate.title,
                        category = %candidate.category,
                        "Candidate dropped from suppressed category"
                    );
                    continue;
                }
                if let Some(feedback) = state.feedback.get(&candidate.category) {
                    if feedback.is_poor(self.poor_rating_floor, self.min_feedback_samples) {
                        debug!(
                            title = %candidate.title,
                            category = %candidate.category,
                            rating = feedback.rolling_average_rating,
                            "Candidate dropped from poorly rated category"
                        );
                        continue;
                    }
                }

                survivors.push(candidate);
            }

            // Stage 4: prioritization.
            let weights = &self.category_weights;
            survivors.sort_by(|a, b| Self::rank(a, b, weights));

            // Stage 5: per-category cap, counting current actives.
            let mut per_category: HashMap<String, usize> = HashMap::new();
            for item in &state.active {
                *per_category.entry(item.category.clone()).or_insert(0) += 1;
            }
            let mut capped = Vec::new();
            for candidate in survivors {
                let count = per_category.entry(candidate.category.clone()).or_insert(0);
                if *count < self.max_per_category {
                    *count += 1;
                    capped.push(candidate);
                } else {
                    debug!(
                        title = %candidate.title,
                        category = %candidate.category,
                        "Candidate dropped by per-category cap"
                    );
                }
            }

            // Stage 6: session cap.
            if capped.len() > self.max_per_session {
                debug!(
                    dropped = capped.len() - self.max_per_session,
                    "Session cap truncated admissions"
                );
                capped.truncate(self.max_per_session);
            }

            // Capacity policy, then insertion.
            for mut candidate in capped {
                if state.active.len() >= self.max_active
                    && !Self::evict_for_capacity_locked(
                        &mut state,
                        self.history_capacity,
                    )
                {
                    debug!(
                        "Active set full of protected items; refusing further admissions"
                    );
                    break;
                }

                candidate.expires_at = now + self.validity_for(&candidate.category);
                events.push(Box::new(RecommendationAdmitted {
                    recommendation: candidate.clone(),
                    timestamp: now,
                }));
                state.active.push(candidate.clone());
                admitted.push(candidate);
            }
        }

        for event in events {
            self.sink.notify(event);
        }
        admitted
    }

    /// Current top-ranked active recommendations, at most `limit`
    ///
    /// Never errors; expired items are filtered even if a sweep has not
    /// run yet.
    pub async fn active(&self, limit: usize) -> Vec<Recommendation> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        let mut items: Vec<Recommendation> = state
            .active
            .iter()
            .filter(|item| !item.is_expired(now))
            .cloned()
            .collect();
        items.sort_by(|a, b| Self::rank(a, b, &self.category_weights));
        items.truncate(limit);
        items
    }

    /// Mark an active recommendation implemented
    ///
    /// Returns false (with a logged warning) if the id is not active.
    pub async fn mark_implemented(&self, id: &RecommendationId) -> bool {
        let now = self.clock.now();
        let event = {
            let mut state = self.state.lock().await;
            let Some(mut item) = Self::take_active_locked(&mut state, id) else {
                warn!(recommendation_id = %id.0, "Feedback for unknown or terminal recommendation");
                return false;
            };
            if let Err(error) = item.transition(RecommendationStatus::Implemented) {
                warn!(recommendation_id = %id.0, error = %error, "Transition rejected");
                return false;
            }
            state
                .feedback
                .entry(item.category.clone())
                .or_insert_with(|| CategoryFeedback::new(item.category.clone()))
                .record_implemented();
            Self::push_history(&mut state, item.clone(), self.history_capacity);
            RecommendationImplemented {
                recommendation: item,
                timestamp: now,
            }
        };
        self.sink.notify(Box::new(event));
        true
    }

    /// Mark an active recommendation dismissed
    ///
    /// Returns false (with a logged warning) if the id is not active.
    pub async fn mark_dismissed(&self, id: &RecommendationId, reason: Option<&str>) -> bool {
        let now = self.clock.now();
        let event = {
            let mut state = self.state.lock().await;
            let Some(mut item) = Self::take_active_locked(&mut state, id) else {
                warn!(recommendation_id = %id.0, "Feedback for unknown or terminal recommendation");
                return false;
            };
            if let Err(error) = item.transition(RecommendationStatus::Dismissed) {
                warn!(recommendation_id = %id.0, error = %error, "Transition rejected");
                return false;
            }
            state
                .feedback
                .entry(item.category.clone())
                .or_insert_with(|| CategoryFeedback::new(item.category.clone()))
                .record_dismissed();
            Self::push_history(&mut state, item.clone(), self.history_capacity);
            RecommendationDismissed {
                recommendation: item,
                reason: reason.map(str::to_string),
                timestamp: now,
            }
        };
        self.sink.notify(Box::new(event));
        true
    }

    /// Expire items whose validity window has elapsed
    ///
    /// Returns the number of items moved to history.
    pub async fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut events: Vec<Box<dyn AdvisoryEvent>> = Vec::new();
        {
            let mut state = self.state.lock().await;
            Self::expire_locked(&mut state, now, self.history_capacity, &mut events);
        }
        let expired = events.len();
        for event in events {
            self.sink.notify(event);
        }
        expired
    }

    /// Spawn a background task running expiration sweeps on a fixed
    /// interval
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let expired = service.evict_expired().await;
                if expired > 0 {
                    debug!(expired, "Expiration sweep evicted recommendations");
                }
            }
        })
    }

    /// Manually suppress a category; its candidates are dropped by the
    /// history filter until restored
    pub async fn suppress_category(&self, category: &str) {
        let mut state = self.state.lock().await;
        state.suppressed.insert(category.to_string());
    }

    /// Lift a manual suppression
    pub async fn restore_category(&self, category: &str) {
        let mut state = self.state.lock().await;
        state.suppressed.remove(category);
    }

    /// Feedback record for a category, if any terminal feedback was
    /// recorded
    pub async fn feedback(&self, category: &str) -> Option<CategoryFeedback> {
        let state = self.state.lock().await;
        state.feedback.get(category).cloned()
    }

    /// Snapshot of the whole feedback table
    pub async fn feedback_snapshot(&self) -> HashMap<String, CategoryFeedback> {
        let state = self.state.lock().await;
        state.feedback.clone()
    }

    /// Snapshot of the terminal-recommendation history ring, oldest
    /// first
    pub async fn history(&self) -> Vec<Recommendation> {
        let state = self.state.lock().await;
        state.history.iter().cloned().collect()
    }

    /// Ranking: priority desc, impact desc, confidence desc, category
    /// weight desc. The weight never overrides priority or impact.
    fn rank(
        a: &Recommendation,
        b: &Recommendation,
        weights: &HashMap<String, f64>,
    ) -> Ordering {
        let weight = |item: &Recommendation| {
            weights
                .get(&item.category)
                .copied()
                .unwrap_or(DEFAULT_CATEGORY_WEIGHT)
        };
        b.priority
            .cmp(&a.priority)
            .then(b.impact.total_cmp(&a.impact))
            .then(b.confidence.total_cmp(&a.confidence))
            .then(weight(b).total_cmp(&weight(a)))
    }

    fn validity_for(&self, category: &str) -> chrono::Duration {
        let secs = self
            .validity_overrides_secs
            .get(category)
            .copied()
            .unwrap_or(self.default_validity_secs);
        chrono::Duration::seconds(secs as i64)
    }

    fn take_active_locked(
        state: &mut StoreState,
        id: &RecommendationId,
    ) -> Option<Recommendation> {
        let index = state.active.iter().position(|item| item.id == *id)?;
        Some(state.active.swap_remove(index))
    }

    fn expire_locked(
        state: &mut StoreState,
        now: DateTime<Utc>,
        history_capacity: usize,
        events: &mut Vec<Box<dyn AdvisoryEvent>>,
    ) {
        let mut index = 0;
        while index < state.active.len() {
            if state.active[index].is_expired(now) {
                let mut item = state.active.swap_remove(index);
                if item.transition(RecommendationStatus::Expired).is_ok() {
                    events.push(Box::new(RecommendationExpired {
                        recommendation: item.clone(),
                        timestamp: now,
                    }));
                }
                Self::push_history(state, item, history_capacity);
            } else {
                index += 1;
            }
        }
    }

    /// Evict one item to make room: oldest `Low` first, then oldest
    /// `Medium`. `High` and `Critical` are never auto-evicted; returns
    /// false when nothing is evictable.
    fn evict_for_capacity_locked(state: &mut StoreState, history_capacity: usize) -> bool {
        for tier in [Priority::Low, Priority::Medium] {
            let victim = state
                .active
                .iter()
                .enumerate()
                .filter(|(_, item)| item.priority == tier)
                .min_by_key(|(_, item)| item.created_at)
                .map(|(index, _)| index);

            if let Some(index) = victim {
                let mut item = state.active.swap_remove(index);
                debug!(
                    recommendation_id = %item.id.0,
                    title = %item.title,
                    "Superseding recommendation under capacity pressure"
                );
                let _ = item.transition(RecommendationStatus::Superseded);
                Self::push_history(state, item, history_capacity);
                return true;
            }
        }
        false
    }

    fn push_history(state: &mut StoreState, item: Recommendation, capacity: usize) {
        state.history.push_back(item);
        while state.history.len() > capacity {
            state.history.pop_front();
        }
    }
}
