//! Turns a set of orders into an [`OptimizedSequence`].
//!
//! The planner owns the degradation rules: when coordinates or distances are
//! unavailable, distance-aware heuristics fall back to priority order and the
//! result says so.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OptimizerConfig;
use crate::distance::DistanceMatrixClient;
use crate::geocode::GeocodeCache;
use crate::heuristics::{self, RouteCost};
use crate::model::{Coordinate, DeliveryOrder, DistanceTable};
use crate::selector::Algorithm;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedOrder {
    /// 1-based position in the route.
    pub sequence: usize,
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedSequence {
    /// The heuristic that actually produced `stops`.
    pub algorithm: Algorithm,
    pub requested: Algorithm,
    pub stops: Vec<SequencedOrder>,
    pub used_real_distances: bool,
    pub estimated_improvement_pct: f64,
    pub total_travel_secs: f64,
    pub total_distance_meters: f64,
    pub missing_edges: usize,
}

impl OptimizedSequence {
    /// Whether a provider failure forced a cheaper heuristic than requested.
    pub fn degraded(&self) -> bool {
        self.algorithm != self.requested
    }
}

/// A sequence together with the geometry it was computed from.
#[derive(Debug, Clone)]
pub struct Plan {
    pub sequence: OptimizedSequence,
    /// Indices into the planned order slice, in visiting order.
    pub order: Vec<usize>,
    /// Valid coordinates by order id.
    pub coordinates: HashMap<String, Coordinate>,
    pub table: DistanceTable,
}

#[derive(Clone)]
pub struct Planner {
    geocache: GeocodeCache,
    distances: DistanceMatrixClient,
    config: OptimizerConfig,
}

impl Planner {
    pub fn new(
        geocache: GeocodeCache,
        distances: DistanceMatrixClient,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            geocache,
            distances,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn geocache(&self) -> &GeocodeCache {
        &self.geocache
    }

    /// Plans with only the lookups `algorithm` needs.
    pub fn plan(
        &self,
        orders: &[DeliveryOrder],
        algorithm: Algorithm,
        include_traffic: bool,
    ) -> Plan {
        self.plan_inner(orders, algorithm, include_traffic, algorithm.needs_distances())
    }

    /// Plans after geocoding every stop and computing all legs, whatever
    /// the heuristic; route building needs the geometry regardless.
    pub fn plan_with_geometry(
        &self,
        orders: &[DeliveryOrder],
        algorithm: Algorithm,
        include_traffic: bool,
    ) -> Plan {
        self.plan_inner(orders, algorithm, include_traffic, true)
    }

    fn plan_inner(
        &self,
        orders: &[DeliveryOrder],
        requested: Algorithm,
        include_traffic: bool,
        with_geometry: bool,
    ) -> Plan {
        let (coordinates, table) = if with_geometry && orders.len() > 1 {
            let coordinates = self.resolve_coordinates(orders);
            let table = self.distance_table(orders, &coordinates, include_traffic);
            (coordinates, table)
        } else if with_geometry {
            (self.resolve_coordinates(orders), DistanceTable::new())
        } else {
            (HashMap::new(), DistanceTable::new())
        };

        let mut algorithm = requested;
        if algorithm.needs_distances() && table.is_empty() {
            warn!(
                %requested,
                orders = orders.len(),
                "no travel data available, falling back to priority order"
            );
            algorithm = Algorithm::PriorityOnly;
        }

        let order = match algorithm {
            Algorithm::Trivial => (0..orders.len()).collect(),
            Algorithm::PriorityOnly => heuristics::priority_only(orders),
            Algorithm::PriorityWithDistance => heuristics::priority_with_distance(orders, &table),
            Algorithm::WeightedNearestNeighbor => {
                heuristics::weighted_nearest_neighbor(orders, &table, self.config.weights)
            }
            Algorithm::MultiStartNearestNeighbor => heuristics::multi_start_nearest_neighbor(
                orders,
                &table,
                &self.config.multi_start_weights,
            ),
        };

        let cost = heuristics::route_cost(orders, &order, &table);
        let incoming = (0..orders.len()).collect::<Vec<_>>();
        let baseline = heuristics::route_cost(orders, &incoming, &table);
        let used_real_distances = algorithm.needs_distances() && !table.is_empty();

        let sequence = OptimizedSequence {
            algorithm,
            requested,
            stops: order
                .iter()
                .enumerate()
                .map(|(pos, &index)| SequencedOrder {
                    sequence: pos + 1,
                    order_id: orders[index].id.clone(),
                })
                .collect(),
            used_real_distances,
            estimated_improvement_pct: if used_real_distances {
                improvement_pct(&baseline, &cost)
            } else {
                0.0
            },
            total_travel_secs: cost.travel_secs,
            total_distance_meters: cost.distance_meters,
            missing_edges: cost.missing_edges,
        };

        debug!(
            algorithm = %sequence.algorithm,
            stops = sequence.stops.len(),
            travel_secs = sequence.total_travel_secs,
            missing_edges = sequence.missing_edges,
            "planned sequence"
        );

        Plan {
            sequence,
            order,
            coordinates,
            table,
        }
    }

    /// Valid coordinates by order id; stored coordinates win over geocoding.
    fn resolve_coordinates(&self, orders: &[DeliveryOrder]) -> HashMap<String, Coordinate> {
        let region = self.config.geocode.region_suffix.as_deref();
        let mut coordinates = HashMap::with_capacity(orders.len());
        let mut pending = Vec::new();

        for order in orders {
            match order.valid_coordinates() {
                Some(coordinate) => {
                    coordinates.insert(order.id.clone(), coordinate.clone());
                }
                None => {
                    let query = order.geocode_query(region);
                    if !query.is_empty() {
                        pending.push((order.id.clone(), query));
                    }
                }
            }
        }

        if !pending.is_empty() {
            let queries = pending.iter().map(|(_, query)| query.clone()).collect::<Vec<_>>();
            let resolved = self.geocache.resolve_batch(&queries);
            for (order_id, query) in pending {
                let coordinate = resolved.get(&query).filter(|coordinate| coordinate.valid);
                if let Some(coordinate) = coordinate {
                    coordinates.insert(order_id, coordinate.clone());
                }
            }
        }

        coordinates
    }

    fn distance_table(
        &self,
        orders: &[DeliveryOrder],
        coordinates: &HashMap<String, Coordinate>,
        include_traffic: bool,
    ) -> DistanceTable {
        let points = orders
            .iter()
            .filter_map(|order| {
                coordinates
                    .get(&order.id)
                    .map(|coordinate| (order.id.clone(), coordinate.clone()))
            })
            .collect::<Vec<_>>();

        if points.len() < 2 {
            debug!(resolved = points.len(), "too few coordinates for a distance matrix");
            return DistanceTable::new();
        }

        match self.distances.compute_delivery_distances(&points, include_traffic) {
            Ok(table) => table,
            Err(err) => {
                warn!(error = %err, "distance matrix unavailable");
                DistanceTable::new()
            }
        }
    }
}

/// Travel time saved against the incoming order, in percent (one decimal).
fn improvement_pct(baseline: &RouteCost, optimized: &RouteCost) -> f64 {
    if baseline.missing_edges > 0 || optimized.missing_edges > 0 || baseline.travel_secs <= 0.0 {
        return 0.0;
    }
    let saved = (baseline.travel_secs - optimized.travel_secs) / baseline.travel_secs * 100.0;
    (saved.max(0.0) * 10.0).round() / 10.0
}
