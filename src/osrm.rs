//! OSRM HTTP adapter for distance matrices and directions.
//!
//! OSRM has no traffic model, so `duration_in_traffic_secs` is never set and
//! callers fall back to the free-flow duration.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ProviderError;
use crate::model::{Directions, DirectionsLeg, DirectionsStep, Matrix, MatrixCell, TravelLeg};
use crate::polyline::Polyline;
use crate::traits::{DirectionsProvider, DistanceMatrixProvider, TrafficOptions};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
    /// Web frontend used for map links; `None` disables them.
    pub map_base_url: Option<String>,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
            map_base_url: Some("https://map.project-osrm.org".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn url(&self, service: &str, locations: &[(f64, f64)], query: &str) -> String {
        let coords = locations
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/{}/v1/{}/{}?{}",
            self.config.base_url, service, self.config.profile, coords, query
        )
    }

    fn get<T: DeserializeOwned>(&self, url: String) -> Result<T, ProviderError> {
        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<T>())?;
        Ok(body)
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
        _traffic: Option<TrafficOptions>,
    ) -> Result<Matrix, ProviderError> {
        if origins.is_empty() || destinations.is_empty() {
            return Ok(Matrix::default());
        }

        let locations = origins.iter().chain(destinations).copied().collect::<Vec<_>>();
        let sources = (0..origins.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(";");
        let targets = (origins.len()..locations.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(";");
        let url = self.url(
            "table",
            &locations,
            &format!("annotations=duration,distance&sources={sources}&destinations={targets}"),
        );

        let body: OsrmTableResponse = self.get(url)?;
        if body.code != "Ok" {
            return Err(ProviderError::status(body.code, body.message.unwrap_or_default()));
        }

        let durations = body.durations.ok_or_else(|| {
            ProviderError::InvalidResponse("table response without durations".to_string())
        })?;
        let distances = body.distances.unwrap_or_default();

        let rows = durations
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(j, duration)| {
                        let distance = distances
                            .get(i)
                            .and_then(|row| row.get(j))
                            .copied()
                            .flatten();
                        match (duration, distance) {
                            (Some(duration), Some(distance)) => {
                                MatrixCell::Resolved(TravelLeg::new(distance, duration))
                            }
                            _ => MatrixCell::Failed("NO_ROUTE".to_string()),
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(Matrix::new(rows))
    }
}

impl DirectionsProvider for OsrmClient {
    fn directions(&self, waypoints: &[(f64, f64)]) -> Result<Directions, ProviderError> {
        if waypoints.len() < 2 {
            return Err(ProviderError::InvalidResponse(
                "directions need at least two waypoints".to_string(),
            ));
        }

        let url = self.url(
            "route",
            waypoints,
            "overview=full&geometries=polyline&steps=true",
        );
        let body: OsrmRouteResponse = self.get(url)?;
        if body.code != "Ok" {
            return Err(ProviderError::status(body.code, body.message.unwrap_or_default()));
        }

        let route = body.routes.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("route response without routes".to_string())
        })?;
        let polyline = Polyline::decode(&route.geometry)
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

        Ok(Directions {
            polyline,
            legs: route
                .legs
                .into_iter()
                .map(|leg| DirectionsLeg {
                    distance_meters: leg.distance,
                    duration_secs: leg.duration,
                    start_address: None,
                    end_address: None,
                    steps: leg.steps.into_iter().map(OsrmStep::into_step).collect(),
                })
                .collect(),
            total_distance_meters: route.distance,
            total_duration_secs: route.duration,
        })
    }

    fn map_url(&self, waypoints: &[(f64, f64)]) -> Option<String> {
        let base = self.config.map_base_url.as_ref()?;
        if waypoints.len() < 2 {
            return None;
        }
        let locs = waypoints
            .iter()
            .map(|(lat, lng)| format!("loc={:.6},{:.6}", lat, lng))
            .collect::<Vec<_>>()
            .join("&");
        Some(format!("{}/?{}", base, locs))
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: String,
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    distance: f64,
    duration: f64,
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    modifier: Option<String>,
}

impl OsrmStep {
    fn into_step(self) -> DirectionsStep {
        let mut instruction = self.maneuver.kind.clone();
        if let Some(modifier) = &self.maneuver.modifier {
            instruction.push(' ');
            instruction.push_str(modifier);
        }
        if !self.name.is_empty() {
            instruction.push_str(" onto ");
            instruction.push_str(&self.name);
        }

        let maneuver = match self.maneuver.modifier {
            Some(modifier) => format!("{}-{}", self.maneuver.kind, modifier.replace(' ', "-")),
            None => self.maneuver.kind,
        };

        DirectionsStep {
            instruction,
            distance_meters: self.distance,
            duration_secs: self.duration,
            maneuver: Some(maneuver),
        }
    }
}
