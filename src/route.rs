//! Navigable route assembly: ordered stops with ETAs, optional directions
//! and a map link.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{Coordinate, DeliveryOrder, Directions, Priority};
use crate::planner::{Plan, Planner};
use crate::selector::{Algorithm, select_algorithm};
use crate::traits::DirectionsProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildRouteOptions {
    pub algorithm: Option<Algorithm>,
    pub include_traffic: bool,
    pub include_directions: bool,
    pub include_map_url: bool,
    /// Start of the first leg; defaults to the build time.
    pub departure_time: Option<DateTime<Utc>>,
}

impl Default for BuildRouteOptions {
    fn default() -> Self {
        Self {
            algorithm: None,
            include_traffic: true,
            include_directions: true,
            include_map_url: true,
            departure_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub stop_number: usize,
    pub order_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub priority: Priority,
    pub coordinates: Option<Coordinate>,
    /// Travel from the previous stop; zero for the first stop.
    pub leg_distance_meters: f64,
    pub leg_duration_secs: f64,
    /// Whether the leg is a fixed estimate instead of provider data.
    pub leg_estimated: bool,
    pub cumulative_distance_meters: f64,
    /// Seconds from departure until arrival at this stop.
    pub cumulative_duration_secs: f64,
    pub arrival: DateTime<Utc>,
    /// Arrival plus the dwell time.
    pub departure: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub driver_id: String,
    pub algorithm: Algorithm,
    pub requested_algorithm: Algorithm,
    pub used_real_distances: bool,
    /// Metrics come from fixed per-leg constants rather than real travel data.
    pub estimated: bool,
    pub stops: Vec<RouteStop>,
    pub total_distance_meters: f64,
    pub total_travel_secs: f64,
    /// Travel plus dwell time at every stop.
    pub total_duration_secs: f64,
    pub estimated_improvement_pct: f64,
    pub unresolved_order_ids: Vec<String>,
    pub directions: Option<Directions>,
    pub map_url: Option<String>,
    pub departure_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RouteBuilder {
    planner: Planner,
    directions: Arc<dyn DirectionsProvider>,
}

impl RouteBuilder {
    pub fn new(planner: Planner, directions: Arc<dyn DirectionsProvider>) -> Self {
        Self { planner, directions }
    }

    pub fn build(
        &self,
        driver_id: &str,
        orders: &[DeliveryOrder],
        options: &BuildRouteOptions,
    ) -> Route {
        let algorithm = select_algorithm(orders.len(), options.algorithm, options.include_traffic);
        let plan = self
            .planner
            .plan_with_geometry(orders, algorithm, options.include_traffic);
        let departure_time = options.departure_time.unwrap_or_else(Utc::now);

        let mut route = self.assemble(driver_id, orders, &plan, departure_time);

        let waypoints = route
            .stops
            .iter()
            .filter_map(|stop| stop.coordinates.as_ref().map(Coordinate::lat_lng))
            .collect::<Vec<_>>();

        if waypoints.len() >= 2 {
            if options.include_directions {
                route.directions = match self.directions.directions(&waypoints) {
                    Ok(directions) => Some(directions),
                    Err(err) => {
                        warn!(
                            driver_id,
                            error = %err,
                            "directions unavailable, returning route without them"
                        );
                        None
                    }
                };
            }
            if options.include_map_url {
                route.map_url = self.directions.map_url(&waypoints);
            }
        }

        info!(
            driver_id,
            stops = route.stops.len(),
            algorithm = %route.algorithm,
            estimated = route.estimated,
            total_duration_secs = route.total_duration_secs,
            "built route"
        );

        route
    }

    /// Walks the planned sequence leg by leg.
    fn assemble(
        &self,
        driver_id: &str,
        orders: &[DeliveryOrder],
        plan: &Plan,
        departure_time: DateTime<Utc>,
    ) -> Route {
        let config = self.planner.config();
        let dwell = config.dwell_secs();
        let estimated = plan.order.len() > 1 && plan.coordinates.len() < 2;

        let mut stops = Vec::with_capacity(plan.order.len());
        let mut total_distance = 0.0;
        let mut total_travel = 0.0;
        let mut previous: Option<&DeliveryOrder> = None;

        for (position, &index) in plan.order.iter().enumerate() {
            let order = &orders[index];

            let (leg_distance, leg_duration, leg_estimated) = match previous {
                None => (0.0, 0.0, false),
                Some(from) => match plan.table.get(&from.id, &order.id) {
                    Some(leg) if !estimated => (leg.distance_meters, leg.traffic_duration(), false),
                    _ => (config.fallback_leg_meters(), config.fallback_leg_secs(), true),
                },
            };

            total_distance += leg_distance;
            total_travel += leg_duration;
            // Every earlier stop contributes its dwell time before this arrival.
            let cumulative_duration = total_travel + dwell * position as f64;
            let arrival = departure_time + seconds(cumulative_duration);

            stops.push(RouteStop {
                stop_number: position + 1,
                order_id: order.id.clone(),
                customer_name: order.customer_name.clone(),
                customer_phone: order.customer_phone.clone(),
                address: order.address.clone(),
                priority: order.priority,
                coordinates: plan.coordinates.get(&order.id).cloned(),
                leg_distance_meters: leg_distance,
                leg_duration_secs: leg_duration,
                leg_estimated,
                cumulative_distance_meters: total_distance,
                cumulative_duration_secs: cumulative_duration,
                arrival,
                departure: arrival + seconds(dwell),
            });
            previous = Some(order);
        }

        let unresolved_order_ids = orders
            .iter()
            .filter(|order| !plan.coordinates.contains_key(&order.id))
            .map(|order| order.id.clone())
            .collect();

        Route {
            driver_id: driver_id.to_string(),
            algorithm: plan.sequence.algorithm,
            requested_algorithm: plan.sequence.requested,
            used_real_distances: plan.sequence.used_real_distances,
            estimated,
            total_distance_meters: total_distance,
            total_travel_secs: total_travel,
            total_duration_secs: total_travel + dwell * stops.len() as f64,
            stops,
            estimated_improvement_pct: plan.sequence.estimated_improvement_pct,
            unresolved_order_ids,
            directions: None,
            map_url: None,
            departure_time,
        }
    }
}

fn seconds(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}
