//! Seams between the optimizer and the outside world.
//!
//! Providers wrap third-party mapping services; repositories wrap whatever
//! persistence the host application uses. All of them are shared across
//! threads, so implementations must be `Send + Sync`.

use chrono::{DateTime, Utc};

use crate::config::TrafficModel;
use crate::error::{ProviderError, StorageError};
use crate::geocode::GeocodeCacheEntry;
use crate::model::{Coordinate, DeliveryOrder, Directions, Matrix};
use crate::state::OptimizationState;

/// Resolves free-text addresses to coordinates.
pub trait Geocoder: Send + Sync {
    /// Returns `Ok(None)` when the provider has no match for the address.
    fn geocode(&self, address: &str) -> Result<Option<Coordinate>, ProviderError>;
}

/// Departure time and model for traffic-aware durations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficOptions {
    pub departure: DateTime<Utc>,
    pub model: TrafficModel,
}

/// Provides a distance/time matrix for a set of locations.
///
/// The matrix is indexed by the provided origin and destination order.
pub trait DistanceMatrixProvider: Send + Sync {
    fn matrix_for(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
        traffic: Option<TrafficOptions>,
    ) -> Result<Matrix, ProviderError>;
}

/// Turn-by-turn directions through ordered waypoints.
pub trait DirectionsProvider: Send + Sync {
    fn directions(&self, waypoints: &[(f64, f64)]) -> Result<Directions, ProviderError>;

    /// Link to a map showing the route, if the provider offers one.
    fn map_url(&self, _waypoints: &[(f64, f64)]) -> Option<String> {
        None
    }
}

/// Read access to the order-management system.
pub trait OrderSource: Send + Sync {
    /// Picked-up orders for a driver; `None` when the driver is unknown.
    fn picked_up_orders(&self, driver_id: &str) -> Result<Option<Vec<DeliveryOrder>>, StorageError>;
}

/// Storage for geocode cache entries, keyed by normalized-address hash.
pub trait GeocodeRepository: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<GeocodeCacheEntry>, StorageError>;

    /// Inserts or replaces the entry stored under `entry.key`.
    fn put(&self, entry: GeocodeCacheEntry) -> Result<(), StorageError>;

    fn entries(&self) -> Result<Vec<GeocodeCacheEntry>, StorageError>;

    /// Removes every entry and returns how many were removed.
    fn clear(&self) -> Result<usize, StorageError>;
}

/// Per-driver optimization state; one record per driver id.
pub trait OptimizationStateRepository: Send + Sync {
    fn get(&self, driver_id: &str) -> Result<Option<OptimizationState>, StorageError>;

    /// Creates or overwrites the driver's record in one step.
    fn upsert(&self, state: OptimizationState) -> Result<(), StorageError>;

    /// Returns whether a record existed.
    fn clear(&self, driver_id: &str) -> Result<bool, StorageError>;
}
