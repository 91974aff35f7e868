//! Configuration for the Sage advisory runtime
//!
//! This module contains the configuration types and loading functionality.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::error::CoreError;

/// Advisory runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Maximum number of workflow requests running concurrently
    #[serde(default = "default_max_concurrent_workflows")]
    pub max_concurrent_workflows: usize,

    /// Maximum number of requests held in the FIFO queue
    #[serde(default = "default_max_queued_requests")]
    pub max_queued_requests: usize,

    /// Overall timeout for a single workflow run, in milliseconds
    #[serde(default = "default_workflow_timeout_ms")]
    pub workflow_timeout_ms: u64,

    /// Maximum size of the active recommendation set
    #[serde(default = "default_max_active_recommendations")]
    pub max_active_recommendations: usize,

    /// Maximum simultaneously active recommendations per category
    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,

    /// Maximum admissions per ingestion call
    #[serde(default = "default_max_per_session")]
    pub max_per_session: usize,

    /// Minimum confidence for a candidate to pass the admission filter
    #[serde(default = "default_admission_confidence_threshold")]
    pub admission_confidence_threshold: f64,

    /// Title token-overlap ratio at or above which two same-category
    /// recommendations are duplicates
    #[serde(default = "default_duplicate_similarity_threshold")]
    pub duplicate_similarity_threshold: f64,

    /// Validity window assigned to admitted recommendations, in seconds
    #[serde(default = "default_validity_secs")]
    pub default_validity_secs: u64,

    /// Per-category validity overrides, in seconds
    #[serde(default)]
    pub validity_overrides_secs: HashMap<String, u64>,

    /// Static per-category rank weights; unknown categories rank at 0.5
    #[serde(default)]
    pub category_weights: HashMap<String, f64>,

    /// Interval between background expiration sweeps, in seconds
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,

    /// Capacity of the terminal-recommendation history ring
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Rolling average rating below which a category is suppressed
    #[serde(default = "default_poor_rating_floor")]
    pub poor_rating_floor: f64,

    /// Minimum feedback samples before the poor-rating floor applies
    #[serde(default = "default_min_feedback_samples")]
    pub min_feedback_samples: u32,
}

fn default_max_concurrent_workflows() -> usize {
    5
}

fn default_max_queued_requests() -> usize {
    100
}

fn default_workflow_timeout_ms() -> u64 {
    30_000
}

fn default_max_active_recommendations() -> usize {
    20
}

fn default_max_per_category() -> usize {
    3
}

fn default_max_per_session() -> usize {
    5
}

fn default_admission_confidence_threshold() -> f64 {
    0.6
}

fn default_duplicate_similarity_threshold() -> f64 {
    0.8
}

fn default_validity_secs() -> u64 {
    86_400 // 24 hours
}

fn default_eviction_interval_secs() -> u64 {
    60
}

fn default_history_capacity() -> usize {
    100
}

fn default_poor_rating_floor() -> f64 {
    2.0
}

fn default_min_feedback_samples() -> u32 {
    5
}

impl AdvisorConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable
    pub fn load() -> Result<Self, CoreError> {
        let mut config = Self::default();

        read_usize("SAGE_MAX_CONCURRENT_WORKFLOWS", &mut config.max_concurrent_workflows);
        read_usize("SAGE_MAX_QUEUED_REQUESTS", &mut config.max_queued_requests);
        read_u64("SAGE_WORKFLOW_TIMEOUT_MS", &mut config.workflow_timeout_ms);
        read_usize(
            "SAGE_MAX_ACTIVE_RECOMMENDATIONS",
            &mut config.max_active_recommendations,
        );
        read_usize("SAGE_MAX_PER_CATEGORY", &mut config.max_per_category);
        read_usize("SAGE_MAX_PER_SESSION", &mut config.max_per_session);
        read_f64(
            "SAGE_ADMISSION_CONFIDENCE_THRESHOLD",
            &mut config.admission_confidence_threshold,
        );
        read_f64(
            "SAGE_DUPLICATE_SIMILARITY_THRESHOLD",
            &mut config.duplicate_similarity_threshold,
        );
        read_u64("SAGE_DEFAULT_VALIDITY_SECS", &mut config.default_validity_secs);
        read_u64("SAGE_EVICTION_INTERVAL_SECS", &mut config.eviction_interval_secs);
        read_usize("SAGE_HISTORY_CAPACITY", &mut config.history_capacity);
        read_f64("SAGE_POOR_RATING_FLOOR", &mut config.poor_rating_floor);
        read_u32("SAGE_MIN_FEEDBACK_SAMPLES", &mut config.min_feedback_samples);

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the runtime cannot honor
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_concurrent_workflows == 0 {
            return Err(CoreError::ConfigurationError(
                "max_concurrent_workflows must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.admission_confidence_threshold) {
            return Err(CoreError::ConfigurationError(format!(
                "admission_confidence_threshold must be in [0, 1], got {}",
                self.admission_confidence_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.duplicate_similarity_threshold) {
            return Err(CoreError::ConfigurationError(format!(
                "duplicate_similarity_threshold must be in [0, 1], got {}",
                self.duplicate_similarity_threshold
            )));
        }

        if self.default_validity_secs == 0 {
            return Err(CoreError::ConfigurationError(
                "default_validity_secs must be positive".to_string(),
            ));
        }

        if self.workflow_timeout_ms == 0 {
            return Err(CoreError::ConfigurationError(
                "workflow_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Overall workflow run timeout
    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_millis(self.workflow_timeout_ms)
    }

    /// Interval between background expiration sweeps
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    /// Validity window for an admitted recommendation in the given
    /// category, honoring per-category overrides
    pub fn validity_for(&self, category: &str) -> chrono::Duration {
        let secs = self
            .validity_overrides_secs
            .get(category)
            .copied()
            .unwrap_or(self.default_validity_secs);
        chrono::Duration::seconds(secs as i64)
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: default_max_concurrent_workflows(),
            max_queued_requests: default_max_queued_requests(),
            workflow_timeout_ms: default_workflow_timeout_ms(),
            max_active_recommendations: default_max_active_recommendations(),
            max_per_category: default_max_per_category(),
            max_per_session: default_max_per_session(),
            admission_confidence_threshold: default_admission_confidence_threshold(),
            duplicate_similarity_threshold: default_duplicate_similarity_threshold(),
            default_validity_secs: default_validity_secs(),
            validity_overrides_secs: HashMap::new(),
            category_weights: HashMap::new(),
            eviction_interval_secs: default_eviction_interval_secs(),
            history_capacity: default_history_capacity(),
            poor_rating_floor: default_poor_rating_floor(),
            min_feedback_samples: default_min_feedback_samples(),
        }
    }
}

fn read_usize(var: &str, target: &mut usize) {
    if let Ok(raw) = env::var(var) {
        match raw.parse::<usize>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Invalid {} value: {}", var, raw),
        }
    }
}

fn read_u64(var: &str, target: &mut u64) {
    if let Ok(raw) = env::var(var) {
        match raw.parse::<u64>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Invalid {} value: {}", var, raw),
        }
    }
}

fn read_u32(var: &str, target: &mut u32) {
    if let Ok(raw) = env::var(var) {
        match raw.parse::<u32>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Invalid {} value: {}", var, raw),
        }
    }
}

fn read_f64(var: &str, target: &mut f64) {
    if let Ok(raw) = env::var(var) {
        match raw.parse::<f64>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Invalid {} value: {}", var, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_recognized_options() {
        let config = AdvisorConfig::default();

        assert_eq!(config.max_concurrent_workflows, 5);
        assert_eq!(config.max_queued_requests, 100);
        assert_eq!(config.workflow_timeout_ms, 30_000);
        assert_eq!(config.max_active_recommendations, 20);
        assert_eq!(config.max_per_category, 3);
        assert_eq!(config.max_per_session, 5);
        assert_eq!(config.admission_confidence_threshold, 0.6);
        assert_eq!(config.duplicate_similarity_threshold, 0.8);
        assert_eq!(config.default_validity_secs, 86_400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = AdvisorConfig {
            max_concurrent_workflows: 0,
            ..AdvisorConfig::default()
        };

        match config.validate() {
            Err(CoreError::ConfigurationError(msg)) => {
                assert!(msg.contains("max_concurrent_workflows"));
            }
            other => panic!("Expected ConfigurationError, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range_thresholds() {
        let config = AdvisorConfig {
            admission_confidence_threshold: 1.5,
            ..AdvisorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AdvisorConfig {
            duplicate_similarity_threshold: -0.1,
            ..AdvisorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validity_override() {
        let mut config = AdvisorConfig::default();
        config
            .validity_overrides_secs
            .insert("Market".to_string(), 3_600);

        assert_eq!(
            config.validity_for("Market"),
            chrono::Duration::seconds(3_600)
        );
        assert_eq!(
            config.validity_for("Environmental"),
            chrono::Duration::seconds(86_400)
        );
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: AdvisorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_active_recommendations, 20);

        let config: AdvisorConfig =
            serde_json::from_str(r#"{"max_per_category": 1}"#).unwrap();
        assert_eq!(config.max_per_category, 1);
        assert_eq!(config.max_per_session, 5);
    }
}
