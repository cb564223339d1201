//! Driver route optimizer.
//!
//! Sequences a driver's picked-up deliveries by priority and travel cost,
//! remembers the outcome per driver, and builds navigable routes on top of
//! pluggable geocoding, distance-matrix and directions providers.

pub mod config;
pub mod distance;
pub mod error;
pub mod geocode;
pub mod google;
pub mod haversine;
pub mod heuristics;
pub mod model;
pub mod optimizer;
pub mod osrm;
pub mod planner;
pub mod polyline;
pub mod route;
pub mod selector;
pub mod state;
pub mod traits;
