//! Tunables for one simulation run.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::routing::{RouteOracleKind, DEFAULT_ROUTE_CACHE_CAPACITY};

/// Distance the vehicle advances per tick (metres).
pub const DEFAULT_STEP_METERS: f64 = 50.0;
/// A stop counts as reached within this distance (metres).
pub const DEFAULT_ARRIVAL_RADIUS_METERS: f64 = 60.0;
/// Wall-clock time between ticks.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub step_meters: f64,
    pub arrival_radius_meters: f64,
    pub tick_interval_ms: u64,
    pub route_oracle: RouteOracleKind,
    /// LRU capacity for network-backed oracles.
    pub route_cache_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_meters: DEFAULT_STEP_METERS,
            arrival_radius_meters: DEFAULT_ARRIVAL_RADIUS_METERS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            route_oracle: RouteOracleKind::default(),
            route_cache_capacity: DEFAULT_ROUTE_CACHE_CAPACITY,
        }
    }
}

impl SimulationConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("stepMeters", self.step_meters)?;
        positive("arrivalRadiusMeters", self.arrival_radius_meters)?;
        positive("tickIntervalMs", self.tick_interval_ms as f64)?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn with_step_meters(mut self, meters: f64) -> Self {
        self.step_meters = meters;
        self
    }

    pub fn with_arrival_radius_meters(mut self, meters: f64) -> Self {
        self.arrival_radius_meters = meters;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_route_oracle(mut self, kind: RouteOracleKind) -> Self {
        self.route_oracle = kind;
        self
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}
