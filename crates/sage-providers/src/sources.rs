//! Pluggable data sources the standard providers read from
//!
//! The providers never compute domain state themselves; they consume
//! typed snapshots from these traits. Production wiring points them at
//! the simulation; tests use the static implementations.

use serde::{Deserialize, Serialize};

/// Point-in-time reading of the growing environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Air temperature in degrees Celsius
    pub temperature_c: f64,

    /// Relative humidity percentage
    pub humidity_pct: f64,

    /// Carbon dioxide concentration in parts per million
    pub co2_ppm: f64,
}

/// Source of environment snapshots
pub trait EnvironmentSource: Send + Sync {
    /// The current environment reading
    fn snapshot(&self) -> EnvironmentSnapshot;
}

/// Point-in-time market conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Current unit price
    pub unit_price: f64,

    /// Demand index in [0, 1]
    pub demand_index: f64,

    /// Price trend over the last period, as a percentage
    pub trend_pct: f64,
}

/// Source of market snapshots
pub trait MarketSource: Send + Sync {
    /// The current market reading
    fn snapshot(&self) -> MarketSnapshot;
}

/// Point-in-time cultivation status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CultivationSnapshot {
    /// Number of plants under cultivation
    pub plant_count: u32,

    /// Average plant health in [0, 1]
    pub average_health: f64,

    /// Days until the nearest harvest window
    pub days_to_harvest: u32,
}

/// Source of cultivation snapshots
pub trait CultivationSource: Send + Sync {
    /// The current cultivation reading
    fn snapshot(&self) -> CultivationSnapshot;
}

/// Environment source returning a fixed snapshot
#[derive(Debug, Clone)]
pub struct StaticEnvironmentSource(pub EnvironmentSnapshot);

impl EnvironmentSource for StaticEnvironmentSource {
    fn snapshot(&self) -> EnvironmentSnapshot {
        self.0.clone()
    }
}

/// Market source returning a fixed snapshot
#[derive(Debug, Clone)]
pub struct StaticMarketSource(pub MarketSnapshot);

impl MarketSource for StaticMarketSource {
    fn snapshot(&self) -> MarketSnapshot {
        self.0.clone()
    }
}

/// Cultivation source returning a fixed snapshot
#[derive(Debug, Clone)]
pub struct StaticCultivationSource(pub CultivationSnapshot);

impl CultivationSource for StaticCultivationSource {
    fn snapshot(&self) -> CultivationSnapshot {
        self.0.clone()
    }
}
