//! The consumer-facing optimizer service.
//!
//! `optimize` is idempotent: once a driver's route is stored as optimized,
//! later calls return the stored state (`from_cache = true`) without loading
//! orders or contacting any provider, unless `force_recalculate` is set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OptimizerConfig;
use crate::distance::DistanceMatrixClient;
use crate::error::{OptimizeError, StorageError};
use crate::geocode::{GeocacheStats, GeocodeCache};
use crate::heuristics;
use crate::model::DeliveryOrder;
use crate::planner::{Planner, SequencedOrder};
use crate::route::{BuildRouteOptions, Route, RouteBuilder};
use crate::selector::{Algorithm, select_algorithm};
use crate::state::{OptimizationData, OptimizationState, format_distance, format_duration};
use crate::traits::{
    DirectionsProvider, DistanceMatrixProvider, GeocodeRepository, Geocoder,
    OptimizationStateRepository, OrderSource,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizeOptions {
    pub force_recalculate: bool,
    pub include_traffic: bool,
    pub algorithm: Option<Algorithm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeOutcome {
    pub driver_id: String,
    pub from_cache: bool,
    pub state: OptimizationState,
    pub data: OptimizationData,
}

/// A driver's orders in their current visiting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentRoute {
    pub driver_id: String,
    pub optimized: bool,
    pub state: Option<OptimizationState>,
    pub stops: Vec<CurrentStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStop {
    pub sequence: usize,
    /// Picked up after the stored optimization ran.
    pub added_since_optimization: bool,
    pub order: DeliveryOrder,
}

/// External collaborators of a [`RouteOptimizer`].
#[derive(Clone)]
pub struct Providers {
    pub orders: Arc<dyn OrderSource>,
    pub states: Arc<dyn OptimizationStateRepository>,
    pub geocodes: Arc<dyn GeocodeRepository>,
    pub geocoder: Arc<dyn Geocoder>,
    pub matrix: Arc<dyn DistanceMatrixProvider>,
    pub directions: Arc<dyn DirectionsProvider>,
}

#[derive(Clone)]
pub struct RouteOptimizer {
    orders: Arc<dyn OrderSource>,
    states: Arc<dyn OptimizationStateRepository>,
    planner: Planner,
    routes: RouteBuilder,
}

impl RouteOptimizer {
    pub fn new(providers: Providers, config: OptimizerConfig) -> Self {
        let geocache = GeocodeCache::new(
            providers.geocoder,
            providers.geocodes,
            config.geocode.clone(),
        );
        let distances = DistanceMatrixClient::new(
            providers.matrix,
            config.traffic_model,
            config.max_matrix_points,
        );
        let planner = Planner::new(geocache, distances, config);
        let routes = RouteBuilder::new(planner.clone(), providers.directions);

        Self {
            orders: providers.orders,
            states: providers.states,
            planner,
            routes,
        }
    }

    pub fn optimize(
        &self,
        driver_id: &str,
        options: &OptimizeOptions,
    ) -> Result<OptimizeOutcome, OptimizeError> {
        if !options.force_recalculate {
            if let Some(state) = self.states.get(driver_id)?.filter(|state| state.route_optimized) {
                debug!(driver_id, "route already optimized, returning stored state");
                let data = state.data()?;
                return Ok(OptimizeOutcome {
                    driver_id: driver_id.to_string(),
                    from_cache: true,
                    state,
                    data,
                });
            }
        }

        let orders = self.load_orders(driver_id)?;
        let algorithm = select_algorithm(orders.len(), options.algorithm, options.include_traffic);
        let plan = self.planner.plan(&orders, algorithm, options.include_traffic);
        let sequence = &plan.sequence;

        let config = self.planner.config();
        let (travel_secs, distance_meters) = if sequence.used_real_distances || orders.len() < 2 {
            (sequence.total_travel_secs, sequence.total_distance_meters)
        } else {
            let legs = (orders.len() - 1) as f64;
            (legs * config.fallback_leg_secs(), legs * config.fallback_leg_meters())
        };
        let total_duration_secs = travel_secs + config.dwell_secs() * orders.len() as f64;

        let data =
            OptimizationData::from_sequence(sequence, options.include_traffic, total_duration_secs);
        let state = OptimizationState {
            driver_id: driver_id.to_string(),
            route_optimized: true,
            optimized_at: Some(Utc::now()),
            estimated_duration: format_duration(total_duration_secs),
            estimated_distance: format_distance(distance_meters),
            optimization_data: serde_json::to_value(&data).map_err(StorageError::from)?,
        };
        self.states.upsert(state.clone())?;

        info!(
            driver_id,
            orders = orders.len(),
            algorithm = %data.method,
            requested = %data.requested_method,
            degraded = sequence.degraded(),
            used_real_distances = data.used_real_distances,
            "optimized route"
        );

        Ok(OptimizeOutcome {
            driver_id: driver_id.to_string(),
            from_cache: false,
            state,
            data,
        })
    }

    pub fn build_route(
        &self,
        driver_id: &str,
        options: &BuildRouteOptions,
    ) -> Result<Route, OptimizeError> {
        let orders = self.load_orders(driver_id)?;
        Ok(self.routes.build(driver_id, &orders, options))
    }

    /// Orders in the stored sequence, followed by orders picked up since, in
    /// priority order. Without a stored optimization everything is in
    /// priority order.
    pub fn current_route(&self, driver_id: &str) -> Result<CurrentRoute, OptimizeError> {
        let orders = self
            .orders
            .picked_up_orders(driver_id)?
            .ok_or_else(|| OptimizeError::DriverNotFound {
                driver_id: driver_id.to_string(),
            })?;
        let state = self.states.get(driver_id)?.filter(|state| state.route_optimized);
        let stored = match &state {
            Some(state) => state.data()?.sequence,
            None => Vec::new(),
        };

        let stops = current_order(&orders, &stored, state.is_some())
            .into_iter()
            .enumerate()
            .map(|(pos, (index, added))| CurrentStop {
                sequence: pos + 1,
                added_since_optimization: added,
                order: orders[index].clone(),
            })
            .collect();

        Ok(CurrentRoute {
            driver_id: driver_id.to_string(),
            optimized: state.is_some(),
            state,
            stops,
        })
    }

    /// Forgets the driver's stored optimization; the next `optimize` recomputes.
    pub fn reset(&self, driver_id: &str) -> Result<bool, OptimizeError> {
        Ok(self.states.clear(driver_id)?)
    }

    pub fn clear_geocache(&self) -> Result<usize, OptimizeError> {
        let removed = self.planner.geocache().clear()?;
        info!(removed, "cleared geocode cache");
        Ok(removed)
    }

    pub fn geocache_stats(&self) -> Result<GeocacheStats, OptimizeError> {
        Ok(self.planner.geocache().stats()?)
    }

    fn load_orders(&self, driver_id: &str) -> Result<Vec<DeliveryOrder>, OptimizeError> {
        let orders = self
            .orders
            .picked_up_orders(driver_id)?
            .ok_or_else(|| OptimizeError::DriverNotFound {
                driver_id: driver_id.to_string(),
            })?;
        if orders.is_empty() {
            return Err(OptimizeError::NoOrders {
                driver_id: driver_id.to_string(),
            });
        }
        Ok(orders)
    }
}

/// Indices into `orders` with a flag for orders missing from `stored`.
fn current_order(
    orders: &[DeliveryOrder],
    stored: &[SequencedOrder],
    optimized: bool,
) -> Vec<(usize, bool)> {
    let position = orders
        .iter()
        .enumerate()
        .map(|(index, order)| (order.id.as_str(), index))
        .collect::<HashMap<_, _>>();

    let mut sequence = Vec::with_capacity(orders.len());
    let mut placed = vec![false; orders.len()];
    for stop in stored {
        if let Some(&index) = position.get(stop.order_id.as_str()) {
            if !placed[index] {
                placed[index] = true;
                sequence.push((index, false));
            }
        }
    }

    sequence.extend(
        heuristics::priority_only(orders)
            .into_iter()
            .filter(|&index| !placed[index])
            .map(|index| (index, optimized)),
    );
    sequence
}
