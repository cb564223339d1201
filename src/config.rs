//! Optimizer configuration.
//!
//! Every field has a default; a JSON document only needs the keys it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Weights of the priority-weighted nearest-neighbor score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighborWeights {
    pub distance: f64,
    pub priority: f64,
}

impl NearestNeighborWeights {
    pub const fn new(distance: f64, priority: f64) -> Self {
        Self { distance, priority }
    }
}

impl Default for NearestNeighborWeights {
    fn default() -> Self {
        Self::new(0.7, 0.3)
    }
}

/// Traffic model requested from providers that support one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficModel {
    #[default]
    BestGuess,
    Pessimistic,
    Optimistic,
}

impl TrafficModel {
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficModel::BestGuess => "best_guess",
            TrafficModel::Pessimistic => "pessimistic",
            TrafficModel::Optimistic => "optimistic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Minimum delay between the starts of two provider calls.
    pub request_delay_ms: u64,
    /// Threads resolving cache misses; 1 keeps resolution sequential.
    pub workers: usize,
    /// Extra provider attempts before a failure is cached.
    pub provider_retries: u32,
    pub retry_backoff_ms: u64,
    /// Appended to every geocode query, e.g. a country name.
    pub region_suffix: Option<String>,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 200,
            workers: 1,
            provider_retries: 0,
            retry_backoff_ms: 500,
            region_suffix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub weights: NearestNeighborWeights,
    /// Weight pairs tried by the multi-start heuristic, in order.
    pub multi_start_weights: Vec<NearestNeighborWeights>,
    pub traffic_model: TrafficModel,
    pub max_matrix_points: usize,
    /// Time spent at each stop after arriving.
    pub dwell_minutes: u32,
    /// Per-leg estimate used when real travel data is missing.
    pub fallback_leg_minutes: u32,
    pub fallback_leg_km: f64,
    pub geocode: GeocodeConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            weights: NearestNeighborWeights::default(),
            multi_start_weights: vec![
                NearestNeighborWeights::new(0.7, 0.3),
                NearestNeighborWeights::new(0.5, 0.5),
                NearestNeighborWeights::new(0.9, 0.1),
                NearestNeighborWeights::new(0.3, 0.7),
            ],
            traffic_model: TrafficModel::BestGuess,
            max_matrix_points: 100,
            dwell_minutes: 10,
            fallback_leg_minutes: 15,
            fallback_leg_km: 5.0,
            geocode: GeocodeConfig::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        Self::from_json_str(&contents)
    }

    pub fn dwell_secs(&self) -> f64 {
        f64::from(self.dwell_minutes) * 60.0
    }

    pub fn fallback_leg_secs(&self) -> f64 {
        f64::from(self.fallback_leg_minutes) * 60.0
    }

    pub fn fallback_leg_meters(&self) -> f64 {
        self.fallback_leg_km * 1000.0
    }
}
