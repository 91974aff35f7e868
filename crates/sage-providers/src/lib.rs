//!
//! Standard capability providers for the Sage advisory platform
//!
//! Each provider implements [`CapabilityAction`] over a pluggable data
//! source: it reads a typed snapshot, records it as the step result,
//! and surfaces threshold-derived candidate recommendations for the
//! advisory store. No provider performs statistical inference; the
//! snapshots are whatever the wired source reports.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use sage_core::{
    ActionContext, ActionOutput, CapabilityAction, Clock, CoreError, DataPacket, Priority,
    Recommendation,
};
use std::sync::Arc;

pub mod sources;

use sources::{CultivationSource, EnvironmentSource, MarketSource};

/// Validity hint attached to provider candidates; the store reassigns
/// the window at admission
const CANDIDATE_VALIDITY_HOURS: i64 = 24;

/// Acceptable environment bands for the monitor
#[derive(Debug, Clone)]
pub struct EnvironmentThresholds {
    /// Acceptable air temperature band in degrees Celsius
    pub temperature_range_c: (f64, f64),

    /// Acceptable relative humidity band in percent
    pub humidity_range_pct: (f64, f64),

    /// Minimum carbon dioxide concentration in parts per million
    pub min_co2_ppm: f64,
}

impl Default for EnvironmentThresholds {
    fn default() -> Self {
        Self {
            temperature_range_c: (18.0, 28.0),
            humidity_range_pct: (40.0, 65.0),
            min_co2_ppm: 350.0,
        }
    }
}

/// Capability action that reviews the growing environment
pub struct EnvironmentMonitor {
    source: Arc<dyn EnvironmentSource>,
    clock: Arc<dyn Clock>,
    thresholds: EnvironmentThresholds,
}

impl EnvironmentMonitor {
    /// Create a monitor over the given source
    pub fn new(source: Arc<dyn EnvironmentSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            thresholds: EnvironmentThresholds::default(),
        }
    }

    /// Override the default thresholds
    pub fn with_thresholds(mut self, thresholds: EnvironmentThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

#[async_trait]
impl CapabilityAction for EnvironmentMonitor {
    async fn execute(&self, context: ActionContext) -> Result<ActionOutput, CoreError> {
        let reading = self.source.snapshot();
        let now = self.clock.now();
        let validity = chrono::Duration::hours(CANDIDATE_VALIDITY_HOURS);
        let mut candidates = Vec::new();

        let (temp_low, temp_high) = self.thresholds.temperature_range_c;
        if reading.temperature_c < temp_low || reading.temperature_c > temp_high {
            let deviation = if reading.temperature_c > temp_high {
                reading.temperature_c - temp_high
            } else {
                temp_low - reading.temperature_c
            };
            let priority = if deviation > 3.0 {
                Priority::High
            } else {
                Priority::Medium
            };
            candidates.push(Recommendation::new(
                "Adjust climate setpoint",
                format!(
                    "Air temperature is {:.1}C, outside the {:.0}-{:.0}C band",
                    reading.temperature_c, temp_low, temp_high
                ),
                "Environmental",
                priority,
                0.85,
                (deviation / 10.0).clamp(0.3, 1.0),
                now,
                validity,
            ));
        }

        let (hum_low, hum_high) = self.thresholds.humidity_range_pct;
        if reading.humidity_pct < hum_low || reading.humidity_pct > hum_high {
            candidates.push(Recommendation::new(
                "Rebalance humidity controls",
                format!(
                    "Relative humidity is {:.0}%, outside the {:.0}-{:.0}% band",
                    reading.humidity_pct, hum_low, hum_high
                ),
                "Environmental",
                Priority::Medium,
                0.75,
                0.5,
                now,
                validity,
            ));
        }

        if reading.co2_ppm < self.thresholds.min_co2_ppm {
            candidates.push(Recommendation::new(
                "Increase co2 enrichment",
                format!(
                    "Co2 concentration is {:.0}ppm, below the {:.0}ppm floor",
                    reading.co2_ppm, self.thresholds.min_co2_ppm
                ),
                "Environmental",
                Priority::Medium,
                0.7,
                0.4,
                now,
                validity,
            ));
        }

        tracing::debug!(
            step_id = %context.step_id.0,
            candidates = candidates.len(),
            "Environment review finished"
        );
        Ok(ActionOutput::new(DataPacket::from(&reading)?).with_recommendations(candidates))
    }
}

/// Signal levels for the market scan
#[derive(Debug, Clone)]
pub struct MarketThresholds {
    /// Demand index at or above which output should scale up
    pub min_demand_index: f64,

    /// Price trend percentage at or above which listings should move
    pub min_trend_pct: f64,
}

impl Default for MarketThresholds {
    fn default() -> Self {
        Self {
            min_demand_index: 0.7,
            min_trend_pct: 5.0,
        }
    }
}

/// Capability action that scans market conditions
pub struct MarketScan {
    source: Arc<dyn MarketSource>,
    clock: Arc<dyn Clock>,
    thresholds: MarketThresholds,
}

impl MarketScan {
    /// Create a scan over the given source
    pub fn new(source: Arc<dyn MarketSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            thresholds: MarketThresholds::default(),
        }
    }

    /// Override the default thresholds
    pub fn with_thresholds(mut self, thresholds: MarketThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

#[async_trait]
impl CapabilityAction for MarketScan {
    async fn execute(&self, context: ActionContext) -> Result<ActionOutput, CoreError> {
        let reading = self.source.snapshot();
        let now = self.clock.now();
        let validity = chrono::Duration::hours(CANDIDATE_VALIDITY_HOURS);
        let mut candidates = Vec::new();

        if reading.trend_pct >= self.thresholds.min_trend_pct {
            candidates.push(Recommendation::new(
                "Time listings to the price uptrend",
                format!(
                    "Unit price {:.2} is trending up {:.1}% this period",
                    reading.unit_price, reading.trend_pct
                ),
                "Market",
                Priority::Medium,
                0.7,
                (reading.trend_pct / 20.0).clamp(0.3, 1.0),
                now,
                validity,
            ));
        }

        if reading.demand_index >= self.thresholds.min_demand_index {
            candidates.push(Recommendation::new(
                "Scale output toward current demand",
                format!("Demand index is {:.2}", reading.demand_index),
                "Market",
                Priority::High,
                0.8,
                reading.demand_index.clamp(0.0, 1.0),
                now,
                validity,
            ));
        }

        tracing::debug!(
            step_id = %context.step_id.0,
            candidates = candidates.len(),
            "Market scan finished"
        );
        Ok(ActionOutput::new(DataPacket::from(&reading)?).with_recommendations(candidates))
    }
}

/// Signal levels for the cultivation review
#[derive(Debug, Clone)]
pub struct CultivationThresholds {
    /// Average health below which an inspection is urgent
    pub poor_health_floor: f64,

    /// Days-to-harvest at or below which scheduling should start
    pub harvest_window_days: u32,
}

impl Default for CultivationThresholds {
    fn default() -> Self {
        Self {
            poor_health_floor: 0.6,
            harvest_window_days: 3,
        }
    }
}

/// Capability action that reviews cultivation status
pub struct CultivationReview {
    source: Arc<dyn CultivationSource>,
    clock: Arc<dyn Clock>,
    thresholds: CultivationThresholds,
}

impl CultivationReview {
    /// Create a review over the given source
    pub fn new(source: Arc<dyn CultivationSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            thresholds: CultivationThresholds::default(),
        }
    }

    /// Override the default thresholds
    pub fn with_thresholds(mut self, thresholds: CultivationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

#[async_trait]
impl CapabilityAction for CultivationReview {
    async fn execute(&self, context: ActionContext) -> Result<ActionOutput, CoreError> {
        let reading = self.source.snapshot();
        let now = self.clock.now();
        let validity = chrono::Duration::hours(CANDIDATE_VALIDITY_HOURS);
        let mut candidates = Vec::new();

        if reading.plant_count > 0 && reading.average_health < self.thresholds.poor_health_floor {
            candidates.push(Recommendation::new(
                "Inspect declining plant health",
                format!(
                    "Average health across {} plants is {:.2}",
                    reading.plant_count, reading.average_health
                ),
                "Cultivation",
                Priority::Critical,
                0.9,
                0.9,
                now,
                validity,
            ));
        }

        if reading.plant_count > 0
            && reading.days_to_harvest <= self.thresholds.harvest_window_days
        {
            candidates.push(Recommendation::new(
                "Schedule the harvest window",
                format!("Nearest harvest is {} days out", reading.days_to_harvest),
                "Cultivation",
                Priority::High,
                0.85,
                0.7,
                now,
                validity,
            ));
        }

        tracing::debug!(
            step_id = %context.step_id.0,
            candidates = candidates.len(),
            "Cultivation review finished"
        );
        Ok(ActionOutput::new(DataPacket::from(&reading)?).with_recommendations(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::{RequestId, StepId, SystemClock, WorkflowId};
    use sources::{
        CultivationSnapshot, EnvironmentSnapshot, MarketSnapshot, StaticCultivationSource,
        StaticEnvironmentSource, StaticMarketSource,
    };

    fn context() -> ActionContext {
        ActionContext {
            request_id: RequestId("req".to_string()),
            workflow_id: WorkflowId("wf".to_string()),
            step_id: StepId("step".to_string()),
            payload: DataPacket::null(),
            step_results: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_environment_monitor_quiet_when_in_band() {
        let monitor = EnvironmentMonitor::new(
            Arc::new(StaticEnvironmentSource(EnvironmentSnapshot {
                temperature_c: 22.0,
                humidity_pct: 55.0,
                co2_ppm: 800.0,
            })),
            Arc::new(SystemClock),
        );

        let output = monitor.execute(context()).await.unwrap();
        assert!(output.recommendations.is_empty());
        assert_eq!(output.result.as_value()["temperature_c"], 22.0);
    }

    #[tokio::test]
    async fn test_environment_monitor_flags_hot_zone() {
        let monitor = EnvironmentMonitor::new(
            Arc::new(StaticEnvironmentSource(EnvironmentSnapshot {
                temperature_c: 33.0,
                humidity_pct: 55.0,
                co2_ppm: 800.0,
            })),
            Arc::new(SystemClock),
        );

        let output = monitor.execute(context()).await.unwrap();
        assert_eq!(output.recommendations.len(), 1);
        let rec = &output.recommendations[0];
        assert_eq!(rec.title, "Adjust climate setpoint");
        assert_eq!(rec.category, "Environmental");
        // Five degrees over the band is an urgent deviation.
        assert_eq!(rec.priority, Priority::High);
    }

    #[tokio::test]
    async fn test_environment_monitor_flags_dry_low_co2_zone() {
        let monitor = EnvironmentMonitor::new(
            Arc::new(StaticEnvironmentSource(EnvironmentSnapshot {
                temperature_c: 22.0,
                humidity_pct: 30.0,
                co2_ppm: 300.0,
            })),
            Arc::new(SystemClock),
        );

        let output = monitor.execute(context()).await.unwrap();
        let titles: Vec<&str> = output
            .recommendations
            .iter()
            .map(|rec| rec.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec!["Rebalance humidity controls", "Increase co2 enrichment"]
        );
    }

    #[tokio::test]
    async fn test_market_scan_flags_demand_and_trend() {
        let scan = MarketScan::new(
            Arc::new(StaticMarketSource(MarketSnapshot {
                unit_price: 12.5,
                demand_index: 0.85,
                trend_pct: 8.0,
            })),
            Arc::new(SystemClock),
        );

        let output = scan.execute(context()).await.unwrap();
        assert_eq!(output.recommendations.len(), 2);
        assert!(output
            .recommendations
            .iter()
            .all(|rec| rec.category == "Market"));
    }

    #[tokio::test]
    async fn test_market_scan_quiet_in_flat_market() {
        let scan = MarketScan::new(
            Arc::new(StaticMarketSource(MarketSnapshot {
                unit_price: 12.5,
                demand_index: 0.4,
                trend_pct: 1.0,
            })),
            Arc::new(SystemClock),
        );

        let output = scan.execute(context()).await.unwrap();
        assert!(output.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_cultivation_review_flags_poor_health_as_critical() {
        let review = CultivationReview::new(
            Arc::new(StaticCultivationSource(CultivationSnapshot {
                plant_count: 40,
                average_health: 0.45,
                days_to_harvest: 12,
            })),
            Arc::new(SystemClock),
        );

        let output = review.execute(context()).await.unwrap();
        assert_eq!(output.recommendations.len(), 1);
        assert_eq!(output.recommendations[0].priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_cultivation_review_schedules_harvest() {
        let review = CultivationReview::new(
            Arc::new(StaticCultivationSource(CultivationSnapshot {
                plant_count: 40,
                average_health: 0.9,
                days_to_harvest: 2,
            })),
            Arc::new(SystemClock),
        );

        let output = review.execute(context()).await.unwrap();
        assert_eq!(output.recommendations.len(), 1);
        assert_eq!(output.recommendations[0].title, "Schedule the harvest window");
    }

    #[tokio::test]
    async fn test_cultivation_review_quiet_with_no_plants() {
        let review = CultivationReview::new(
            Arc::new(StaticCultivationSource(CultivationSnapshot {
                plant_count: 0,
                average_health: 0.0,
                days_to_harvest: 0,
            })),
            Arc::new(SystemClock),
        );

        let output = review.execute(context()).await.unwrap();
        assert!(output.recommendations.is_empty());
    }
}
