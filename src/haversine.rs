//! Haversine distance matrix provider (fallback when no routing service is
//! reachable).
//!
//! Uses great-circle distance, stretched by a detour factor, to estimate
//! travel. Less accurate than a road network but never fails.

use crate::error::ProviderError;
use crate::model::{Matrix, MatrixCell, TravelLeg};
use crate::traits::{DistanceMatrixProvider, TrafficOptions};

/// Average urban driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 30.0;

/// Ratio of road distance to straight-line distance.
const DEFAULT_DETOUR_FACTOR: f64 = 1.3;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
    pub detour_factor: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            detour_factor: DEFAULT_DETOUR_FACTOR,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64, detour_factor: f64) -> Self {
        Self {
            speed_kmh,
            detour_factor,
        }
    }

    /// Great-circle distance between two (lat, lng) points in kilometers.
    pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    fn leg(&self, from: (f64, f64), to: (f64, f64)) -> TravelLeg {
        let km = Self::haversine_km(from, to) * self.detour_factor;
        let seconds = (km / self.speed_kmh * 3600.0).round();
        TravelLeg::new((km * 1000.0).round(), seconds)
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    /// Traffic options are accepted and ignored; there is no traffic data.
    fn matrix_for(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
        _traffic: Option<TrafficOptions>,
    ) -> Result<Matrix, ProviderError> {
        let rows = origins
            .iter()
            .map(|&from| {
                destinations
                    .iter()
                    .map(|&to| MatrixCell::Resolved(self.leg(from, to)))
                    .collect()
            })
            .collect();

        Ok(Matrix::new(rows))
    }
}
