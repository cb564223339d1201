//! Heuristic selection by problem size.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// A single stop; nothing to order.
    Trivial,
    PriorityOnly,
    PriorityWithDistance,
    WeightedNearestNeighbor,
    MultiStartNearestNeighbor,
}

impl Algorithm {
    /// Whether the heuristic consults coordinates and travel distances.
    pub fn needs_distances(self) -> bool {
        matches!(
            self,
            Algorithm::PriorityWithDistance
                | Algorithm::WeightedNearestNeighbor
                | Algorithm::MultiStartNearestNeighbor
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Trivial => "trivial",
            Algorithm::PriorityOnly => "priority_only",
            Algorithm::PriorityWithDistance => "priority_with_distance",
            Algorithm::WeightedNearestNeighbor => "weighted_nearest_neighbor",
            Algorithm::MultiStartNearestNeighbor => "multi_start_nearest_neighbor",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    /// Accepts canonical names plus the legacy names `genetic` and `ortools`,
    /// both of which always meant the multi-start nearest-neighbor routine.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "trivial" | "single" => Ok(Algorithm::Trivial),
            "priority" | "priority_only" | "simple" => Ok(Algorithm::PriorityOnly),
            "priority_distance" | "priority_with_distance" => Ok(Algorithm::PriorityWithDistance),
            "nearest_neighbor" | "nn" | "weighted_nearest_neighbor" => {
                Ok(Algorithm::WeightedNearestNeighbor)
            }
            "multi_start" | "multi_start_nearest_neighbor" | "genetic" | "ortools" | "or_tools"
            | "vrp" => Ok(Algorithm::MultiStartNearestNeighbor),
            _ => Err(UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Picks a heuristic for `order_count` deliveries.
///
/// A requested algorithm wins for two or more orders; a single order is
/// always trivial, and `Trivial` is never honored for more than one.
pub fn select_algorithm(
    order_count: usize,
    requested: Option<Algorithm>,
    include_traffic: bool,
) -> Algorithm {
    if order_count <= 1 {
        return Algorithm::Trivial;
    }
    if let Some(algorithm) = requested.filter(|algorithm| *algorithm != Algorithm::Trivial) {
        return algorithm;
    }

    match order_count {
        2..=3 if include_traffic => Algorithm::PriorityWithDistance,
        2..=3 => Algorithm::PriorityOnly,
        4..=10 => Algorithm::WeightedNearestNeighbor,
        // No dedicated large-instance solver; big batches reuse multi-start.
        _ => Algorithm::MultiStartNearestNeighbor,
    }
}
