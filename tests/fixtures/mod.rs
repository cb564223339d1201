//! Test fixtures for route-optimizer.
//!
//! Provides:
//! - A builder for delivery orders with sensible defaults
//! - Counting test doubles for the geocoder, matrix and directions providers
//! - An in-memory order source and a helper wiring everything into a
//!   `RouteOptimizer`

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use route_optimizer::config::OptimizerConfig;
use route_optimizer::error::{ProviderError, StorageError};
use route_optimizer::model::{
    Coordinate, DeliveryOrder, Directions, DirectionsLeg, Matrix, MatrixCell, Priority, TravelLeg,
};
use route_optimizer::optimizer::{Providers, RouteOptimizer};
use route_optimizer::polyline::Polyline;
use route_optimizer::state::{InMemoryGeocodeStore, InMemoryStateStore};
use route_optimizer::traits::{
    DirectionsProvider, DistanceMatrixProvider, Geocoder, OrderSource, TrafficOptions,
};

// ============================================================================
// Orders
// ============================================================================

/// Builder for test orders.
#[derive(Clone, Debug)]
pub struct TestOrder {
    order: DeliveryOrder,
}

impl TestOrder {
    pub fn new(id: &str) -> Self {
        Self {
            order: DeliveryOrder {
                id: id.to_string(),
                customer_name: format!("Customer {id}"),
                customer_phone: "+20 100 000 0000".to_string(),
                address: format!("{id} street"),
                area: None,
                governorate: None,
                priority: Priority::Normal,
                created_at: DateTime::<Utc>::UNIX_EPOCH,
                coordinates: None,
            },
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.order.priority = priority;
        self
    }

    /// Creation time, in minutes after the epoch.
    pub fn created(mut self, minute: i64) -> Self {
        self.order.created_at = DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minute);
        self
    }

    pub fn address(mut self, address: &str) -> Self {
        self.order.address = address.to_string();
        self
    }

    /// Pre-resolved coordinates; the geocoder is skipped for this order.
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.order.coordinates = Some(Coordinate::new(lat, lng));
        self
    }

    pub fn build(self) -> DeliveryOrder {
        self.order
    }
}

/// An order without coordinates.
pub fn order(id: &str, priority: Priority, minute: i64) -> DeliveryOrder {
    TestOrder::new(id).priority(priority).created(minute).build()
}

/// An order with pre-resolved coordinates.
pub fn located(id: &str, priority: Priority, minute: i64, lat: f64, lng: f64) -> DeliveryOrder {
    TestOrder::new(id)
        .priority(priority)
        .created(minute)
        .at(lat, lng)
        .build()
}

pub fn ids(orders: &[DeliveryOrder], sequence: &[usize]) -> Vec<String> {
    sequence.iter().map(|&i| orders[i].id.clone()).collect()
}

// ============================================================================
// Providers
// ============================================================================

/// Geocoder answering from a fixed address book, counting every call.
#[derive(Default)]
pub struct CountingGeocoder {
    known: HashMap<String, (f64, f64)>,
    failing: bool,
    calls: AtomicUsize,
}

impl CountingGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn knows(mut self, address: &str, lat: f64, lng: f64) -> Self {
        self.known.insert(address.trim().to_lowercase(), (lat, lng));
        self
    }

    /// Every call fails as if the provider were down.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for CountingGeocoder {
    fn geocode(&self, address: &str) -> Result<Option<Coordinate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ProviderError::status("UNKNOWN_ERROR", "provider down"));
        }
        Ok(self
            .known
            .get(&address.trim().to_lowercase())
            .map(|&(lat, lng)| Coordinate::new(lat, lng).with_formatted_address(address.trim())))
    }
}

/// Manhattan distance matrix (simple, predictable).
///
/// One coordinate unit is one kilometer and one minute of free-flow travel;
/// with traffic requested, travel takes half again as long.
#[derive(Default)]
pub struct ManhattanMatrix {
    missing: HashSet<(String, String)>,
    failing: bool,
    calls: AtomicUsize,
}

impl ManhattanMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider reports no route from `from` to `to`.
    pub fn without_leg(mut self, from: (f64, f64), to: (f64, f64)) -> Self {
        self.missing.insert((key(from), key(to)));
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn leg(from: (f64, f64), to: (f64, f64), traffic: bool) -> TravelLeg {
        let units = (from.0 - to.0).abs() + (from.1 - to.1).abs();
        let leg = TravelLeg::new(units * 1000.0, units * 60.0);
        if traffic {
            leg.with_traffic(units * 90.0)
        } else {
            leg
        }
    }
}

fn key(location: (f64, f64)) -> String {
    format!("{:.6},{:.6}", location.0, location.1)
}

impl DistanceMatrixProvider for ManhattanMatrix {
    fn matrix_for(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
        traffic: Option<TrafficOptions>,
    ) -> Result<Matrix, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ProviderError::status("OVER_QUERY_LIMIT", "quota exhausted"));
        }

        let rows = origins
            .iter()
            .map(|&from| {
                destinations
                    .iter()
                    .map(|&to| {
                        if self.missing.contains(&(key(from), key(to))) {
                            MatrixCell::Failed("ZERO_RESULTS".to_string())
                        } else {
                            MatrixCell::Resolved(Self::leg(from, to, traffic.is_some()))
                        }
                    })
                    .collect()
            })
            .collect();
        Ok(Matrix::new(rows))
    }
}

/// Directions double returning one straight leg per waypoint pair.
#[derive(Default)]
pub struct StubDirections {
    failing: bool,
    calls: AtomicUsize,
    last_waypoints: Mutex<Vec<(f64, f64)>>,
}

impl StubDirections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_waypoints(&self) -> Vec<(f64, f64)> {
        self.last_waypoints.lock().unwrap().clone()
    }
}

impl DirectionsProvider for StubDirections {
    fn directions(&self, waypoints: &[(f64, f64)]) -> Result<Directions, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_waypoints.lock().unwrap() = waypoints.to_vec();
        if self.failing {
            return Err(ProviderError::status("UNKNOWN_ERROR", "directions down"));
        }

        let legs = waypoints
            .windows(2)
            .map(|pair| {
                let leg = ManhattanMatrix::leg(pair[0], pair[1], false);
                DirectionsLeg {
                    distance_meters: leg.distance_meters,
                    duration_secs: leg.duration_secs,
                    start_address: None,
                    end_address: None,
                    steps: Vec::new(),
                }
            })
            .collect::<Vec<_>>();

        Ok(Directions {
            polyline: Polyline::new(waypoints.to_vec()),
            total_distance_meters: legs.iter().map(|leg| leg.distance_meters).sum(),
            total_duration_secs: legs.iter().map(|leg| leg.duration_secs).sum(),
            legs,
        })
    }

    fn map_url(&self, waypoints: &[(f64, f64)]) -> Option<String> {
        Some(format!("https://maps.test/route?stops={}", waypoints.len()))
    }
}

/// Orders per driver, counting loads.
#[derive(Default)]
pub struct InMemoryOrders {
    drivers: Mutex<HashMap<String, Vec<DeliveryOrder>>>,
    loads: AtomicUsize,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_driver(self, driver_id: &str, orders: Vec<DeliveryOrder>) -> Self {
        self.set(driver_id, orders);
        self
    }

    pub fn set(&self, driver_id: &str, orders: Vec<DeliveryOrder>) {
        self.drivers.lock().unwrap().insert(driver_id.to_string(), orders);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl OrderSource for InMemoryOrders {
    fn picked_up_orders(
        &self,
        driver_id: &str,
    ) -> Result<Option<Vec<DeliveryOrder>>, StorageError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.drivers.lock().unwrap().get(driver_id).cloned())
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Handles on the doubles behind a test optimizer.
pub struct Harness {
    pub optimizer: RouteOptimizer,
    pub orders: Arc<InMemoryOrders>,
    pub geocoder: Arc<CountingGeocoder>,
    pub matrix: Arc<ManhattanMatrix>,
    pub directions: Arc<StubDirections>,
    pub states: Arc<InMemoryStateStore>,
}

impl Harness {
    pub fn provider_calls(&self) -> usize {
        self.geocoder.calls() + self.matrix.calls() + self.directions.calls()
    }
}

/// Config without geocoding delays so tests run fast.
pub fn test_config() -> OptimizerConfig {
    let mut config = OptimizerConfig::default();
    config.geocode.request_delay_ms = 0;
    config
}

pub fn harness(
    orders: InMemoryOrders,
    geocoder: CountingGeocoder,
    matrix: ManhattanMatrix,
    directions: StubDirections,
) -> Harness {
    let orders = Arc::new(orders);
    let geocoder = Arc::new(geocoder);
    let matrix = Arc::new(matrix);
    let directions = Arc::new(directions);
    let states = Arc::new(InMemoryStateStore::new());

    let optimizer = RouteOptimizer::new(
        Providers {
            orders: orders.clone(),
            states: states.clone(),
            geocodes: Arc::new(InMemoryGeocodeStore::new()),
            geocoder: geocoder.clone(),
            matrix: matrix.clone(),
            directions: directions.clone(),
        },
        test_config(),
    );

    Harness {
        optimizer,
        orders,
        geocoder,
        matrix,
        directions,
        states,
    }
}
