//! Value types shared by the optimizer, its providers and its stores.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::polyline::Polyline;

/// Delivery priority as assigned by the order-management system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Numeric rank, URGENT = 4 down to LOW = 1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        };
        f.write_str(name)
    }
}

/// A resolved (or unresolvable) geographic position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: Option<String>,
    pub valid: bool,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            formatted_address: None,
            valid: true,
        }
    }

    pub fn with_formatted_address(mut self, address: impl Into<String>) -> Self {
        self.formatted_address = Some(address.into());
        self
    }

    /// Marker for an address the geocoder could not place.
    pub fn unresolved() -> Self {
        Self {
            lat: 0.0,
            lng: 0.0,
            formatted_address: None,
            valid: false,
        }
    }

    pub fn lat_lng(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// A picked-up delivery, owned by the order-management system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub area: Option<String>,
    pub governorate: Option<String>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub coordinates: Option<Coordinate>,
}

impl DeliveryOrder {
    /// Coordinates usable for distance computation, if any.
    pub fn valid_coordinates(&self) -> Option<&Coordinate> {
        self.coordinates.as_ref().filter(|coord| coord.valid)
    }

    /// Free-text query sent to the geocoder: address, area and governorate.
    pub fn geocode_query(&self, region_suffix: Option<&str>) -> String {
        [
            Some(self.address.as_str()),
            self.area.as_deref(),
            self.governorate.as_deref(),
            region_suffix,
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Travel between two points as reported by a distance provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelLeg {
    pub distance_meters: f64,
    pub duration_secs: f64,
    pub duration_in_traffic_secs: Option<f64>,
}

impl TravelLeg {
    pub fn new(distance_meters: f64, duration_secs: f64) -> Self {
        Self {
            distance_meters,
            duration_secs,
            duration_in_traffic_secs: None,
        }
    }

    pub fn with_traffic(mut self, duration_in_traffic_secs: f64) -> Self {
        self.duration_in_traffic_secs = Some(duration_in_traffic_secs);
        self
    }

    /// Traffic-aware duration, falling back to the plain duration.
    pub fn traffic_duration(&self) -> f64 {
        self.duration_in_traffic_secs.unwrap_or(self.duration_secs)
    }
}

/// One origin/destination pair of a distance matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixCell {
    Resolved(TravelLeg),
    /// Provider status for a pair it could not route, e.g. `ZERO_RESULTS`.
    Failed(String),
}

impl MatrixCell {
    pub fn leg(&self) -> Option<&TravelLeg> {
        match self {
            MatrixCell::Resolved(leg) => Some(leg),
            MatrixCell::Failed(_) => None,
        }
    }
}

/// Row-major origins × destinations matrix, indexed by request position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: Vec<Vec<MatrixCell>>,
}

impl Matrix {
    pub fn new(rows: Vec<Vec<MatrixCell>>) -> Self {
        Self { rows }
    }

    pub fn origins(&self) -> usize {
        self.rows.len()
    }

    pub fn destinations(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn cell(&self, from: usize, to: usize) -> Option<&MatrixCell> {
        self.rows.get(from).and_then(|row| row.get(to))
    }

    pub fn rows(&self) -> &[Vec<MatrixCell>] {
        &self.rows
    }
}

/// Directed legs keyed by (from order id, to order id).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistanceTable {
    edges: HashMap<String, HashMap<String, TravelLeg>>,
}

impl DistanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>, leg: TravelLeg) {
        self.edges.entry(from.into()).or_default().insert(to.into(), leg);
    }

    pub fn get(&self, from: &str, to: &str) -> Option<&TravelLeg> {
        self.edges.get(from).and_then(|row| row.get(to))
    }

    pub fn has_edges_from(&self, from: &str) -> bool {
        self.edges.get(from).is_some_and(|row| !row.is_empty())
    }

    pub fn len(&self) -> usize {
        self.edges.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turn-by-turn directions for an ordered list of waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directions {
    pub polyline: Polyline,
    pub legs: Vec<DirectionsLeg>,
    pub total_distance_meters: f64,
    pub total_duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsLeg {
    pub distance_meters: f64,
    pub duration_secs: f64,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    pub steps: Vec<DirectionsStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsStep {
    pub instruction: String,
    pub distance_meters: f64,
    pub duration_secs: f64,
    pub maneuver: Option<String>,
}
