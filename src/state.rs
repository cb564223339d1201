//! Per-driver optimization state and in-memory repositories.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::geocode::GeocodeCacheEntry;
use crate::planner::{OptimizedSequence, SequencedOrder};
use crate::selector::Algorithm;
use crate::traits::{GeocodeRepository, OptimizationStateRepository};

/// The persisted record; one per driver, overwritten on each optimize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationState {
    pub driver_id: String,
    pub route_optimized: bool,
    pub optimized_at: Option<DateTime<Utc>>,
    pub estimated_duration: String,
    pub estimated_distance: String,
    /// Opaque to storage; written from [`OptimizationData`].
    pub optimization_data: serde_json::Value,
}

impl OptimizationState {
    pub fn data(&self) -> Result<OptimizationData, StorageError> {
        Ok(serde_json::from_value(self.optimization_data.clone())?)
    }
}

/// What the optimizer records about a run inside `optimization_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationData {
    pub method: Algorithm,
    pub requested_method: Algorithm,
    pub used_real_distances: bool,
    pub include_traffic: bool,
    pub estimated_improvement_pct: f64,
    pub total_travel_secs: f64,
    pub total_distance_meters: f64,
    pub total_duration_secs: f64,
    pub sequence: Vec<SequencedOrder>,
}

impl OptimizationData {
    pub fn from_sequence(
        sequence: &OptimizedSequence,
        include_traffic: bool,
        total_duration_secs: f64,
    ) -> Self {
        Self {
            method: sequence.algorithm,
            requested_method: sequence.requested,
            used_real_distances: sequence.used_real_distances,
            include_traffic,
            estimated_improvement_pct: sequence.estimated_improvement_pct,
            total_travel_secs: sequence.total_travel_secs,
            total_distance_meters: sequence.total_distance_meters,
            total_duration_secs,
            sequence: sequence.stops.clone(),
        }
    }
}

/// Renders seconds as `"45 min"` or `"1 h 5 min"`.
pub fn format_duration(secs: f64) -> String {
    let minutes = (secs.max(0.0) / 60.0).round() as u64;
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h} h"),
        (h, m) => format!("{h} h {m} min"),
    }
}

/// Renders meters as kilometers with one decimal, e.g. `"12.4 km"`.
pub fn format_distance(meters: f64) -> String {
    format!("{:.1} km", meters.max(0.0) / 1000.0)
}

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, OptimizationState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptimizationStateRepository for InMemoryStateStore {
    fn get(&self, driver_id: &str) -> Result<Option<OptimizationState>, StorageError> {
        let states = self.states.read().map_err(|_| StorageError::Poisoned)?;
        Ok(states.get(driver_id).cloned())
    }

    fn upsert(&self, state: OptimizationState) -> Result<(), StorageError> {
        let mut states = self.states.write().map_err(|_| StorageError::Poisoned)?;
        states.insert(state.driver_id.clone(), state);
        Ok(())
    }

    fn clear(&self, driver_id: &str) -> Result<bool, StorageError> {
        let mut states = self.states.write().map_err(|_| StorageError::Poisoned)?;
        Ok(states.remove(driver_id).is_some())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGeocodeStore {
    entries: RwLock<HashMap<String, GeocodeCacheEntry>>,
}

impl InMemoryGeocodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeocodeRepository for InMemoryGeocodeStore {
    fn get(&self, key: &str) -> Result<Option<GeocodeCacheEntry>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, entry: GeocodeCacheEntry) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<GeocodeCacheEntry>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.values().cloned().collect())
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}
