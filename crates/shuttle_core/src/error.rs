//! Error types shared across the engine.
//!
//! Route oracle failures live in [`crate::routing::OracleError`]; they are
//! never surfaced past the resolver.

use std::path::PathBuf;

use thiserror::Error;

use crate::stops::StopKey;

/// Invalid geographic input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("coordinate is not a finite number")]
    NotFinite,
}

/// Violations of the stop list invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StopListError {
    #[error("stop {0} appears more than once")]
    DuplicateStop(StopKey),
}

/// Failures while loading or validating a [`crate::config::SimulationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
}
