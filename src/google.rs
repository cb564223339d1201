//! Google Maps Platform adapter: geocoding, traffic-aware distance
//! matrices and directions.

use std::env;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ProviderError;
use crate::model::{
    Coordinate, Directions, DirectionsLeg, DirectionsStep, Matrix, MatrixCell, TravelLeg,
};
use crate::polyline::Polyline;
use crate::traits::{DirectionsProvider, DistanceMatrixProvider, Geocoder, TrafficOptions};

/// Elements (origins × destinations) allowed in one matrix request.
const MAX_ELEMENTS_PER_REQUEST: usize = 100;
const MAX_DESTINATIONS_PER_REQUEST: usize = 25;

#[derive(Debug, Clone)]
pub struct GoogleMapsConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// ccTLD region bias for geocoding, e.g. "eg".
    pub region: Option<String>,
    pub language: Option<String>,
    /// Intermediate waypoints accepted by the directions service.
    pub max_waypoints: usize,
}

impl Default for GoogleMapsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://maps.googleapis.com/maps/api".to_string(),
            timeout_secs: 10,
            region: None,
            language: None,
            max_waypoints: 25,
        }
    }
}

impl GoogleMapsConfig {
    /// Reads `GOOGLE_MAPS_API_KEY` plus the optional `GOOGLE_MAPS_BASE_URL`,
    /// `GOOGLE_MAPS_TIMEOUT_SECS`, `GOOGLE_MAPS_REGION` and
    /// `GOOGLE_MAPS_LANGUAGE`. Returns `None` without an API key.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`GoogleMapsConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = lookup("GOOGLE_MAPS_API_KEY").filter(|key| !key.is_empty())?;
        let defaults = Self::default();
        Some(Self {
            api_key,
            base_url: lookup("GOOGLE_MAPS_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs: lookup("GOOGLE_MAPS_TIMEOUT_SECS")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            region: lookup("GOOGLE_MAPS_REGION"),
            language: lookup("GOOGLE_MAPS_LANGUAGE"),
            max_waypoints: defaults.max_waypoints,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GoogleMapsClient {
    config: GoogleMapsConfig,
    client: reqwest::blocking::Client,
}

impl GoogleMapsClient {
    pub fn new(config: GoogleMapsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn get<T: DeserializeOwned>(
        &self,
        service: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let mut query = params.to_vec();
        query.push(("key", self.config.api_key.clone()));
        if let Some(language) = &self.config.language {
            query.push(("language", language.clone()));
        }

        let body = self
            .client
            .get(format!("{}/{}/json", self.config.base_url, service))
            .query(&query)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<T>())?;
        Ok(body)
    }

    fn matrix_rows(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
        traffic: Option<TrafficOptions>,
    ) -> Result<Vec<Vec<MatrixCell>>, ProviderError> {
        let mut params = vec![
            ("origins", join_locations(origins)),
            ("destinations", join_locations(destinations)),
            ("mode", "driving".to_string()),
        ];
        if let Some(traffic) = traffic {
            params.push(("departure_time", departure_param(traffic)));
            params.push(("traffic_model", traffic.model.as_str().to_string()));
        }

        let body: MatrixResponse = self.get("distancematrix", &params)?;
        check_status(&body.status, body.error_message)?;
        if body.rows.len() != origins.len()
            || body
                .rows
                .iter()
                .any(|row| row.elements.len() != destinations.len())
        {
            return Err(ProviderError::InvalidResponse(format!(
                "expected a {}x{} matrix block",
                origins.len(),
                destinations.len()
            )));
        }

        Ok(body
            .rows
            .into_iter()
            .map(|row| {
                row.elements
                    .into_iter()
                    .map(MatrixElement::into_cell)
                    .collect()
            })
            .collect())
    }
}

impl Geocoder for GoogleMapsClient {
    fn geocode(&self, address: &str) -> Result<Option<Coordinate>, ProviderError> {
        let mut params = vec![("address", address.to_string())];
        if let Some(region) = &self.config.region {
            params.push(("region", region.clone()));
        }

        let body: GeocodeResponse = self.get("geocode", &params)?;
        if body.status == "ZERO_RESULTS" {
            debug!(address, "geocoder found no match");
            return Ok(None);
        }
        check_status(&body.status, body.error_message)?;

        Ok(body.results.into_iter().next().map(|result| {
            Coordinate::new(result.geometry.location.lat, result.geometry.location.lng)
                .with_formatted_address(result.formatted_address)
        }))
    }
}

impl DistanceMatrixProvider for GoogleMapsClient {
    /// Tiles the matrix into requests within the per-request quotas.
    fn matrix_for(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
        traffic: Option<TrafficOptions>,
    ) -> Result<Matrix, ProviderError> {
        if origins.is_empty() || destinations.is_empty() {
            return Ok(Matrix::default());
        }

        let mut rows = vec![Vec::with_capacity(destinations.len()); origins.len()];
        for columns in destinations.chunks(MAX_DESTINATIONS_PER_REQUEST) {
            let rows_per_request = (MAX_ELEMENTS_PER_REQUEST / columns.len()).max(1);
            for (block, chunk) in origins.chunks(rows_per_request).enumerate() {
                let offset = block * rows_per_request;
                let block_rows = self.matrix_rows(chunk, columns, traffic)?;
                for (k, cells) in block_rows.into_iter().enumerate() {
                    rows[offset + k].extend(cells);
                }
            }
        }

        debug!(
            origins = origins.len(),
            destinations = destinations.len(),
            "fetched distance matrix"
        );
        Ok(Matrix::new(rows))
    }
}

impl DirectionsProvider for GoogleMapsClient {
    fn directions(&self, waypoints: &[(f64, f64)]) -> Result<Directions, ProviderError> {
        let [origin, middle @ .., destination] = waypoints else {
            return Err(ProviderError::InvalidResponse(
                "directions need at least two waypoints".to_string(),
            ));
        };
        if middle.len() > self.config.max_waypoints {
            return Err(ProviderError::TooManyPoints {
                requested: middle.len(),
                limit: self.config.max_waypoints,
            });
        }

        let mut params = vec![
            ("origin", format_location(*origin)),
            ("destination", format_location(*destination)),
            ("mode", "driving".to_string()),
            ("departure_time", "now".to_string()),
        ];
        if !middle.is_empty() {
            params.push(("waypoints", join_locations(middle)));
        }

        let body: DirectionsResponse = self.get("directions", &params)?;
        check_status(&body.status, body.error_message)?;
        let route = body.routes.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("directions response without routes".to_string())
        })?;

        let polyline = Polyline::decode(&route.overview_polyline.points)
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;
        let legs = route
            .legs
            .into_iter()
            .map(|leg| DirectionsLeg {
                distance_meters: leg.distance.value,
                duration_secs: leg.duration.value,
                start_address: leg.start_address,
                end_address: leg.end_address,
                steps: leg
                    .steps
                    .into_iter()
                    .map(|step| DirectionsStep {
                        instruction: strip_tags(&step.html_instructions),
                        distance_meters: step.distance.value,
                        duration_secs: step.duration.value,
                        maneuver: step.maneuver,
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();

        Ok(Directions {
            polyline,
            total_distance_meters: legs.iter().map(|leg| leg.distance_meters).sum(),
            total_duration_secs: legs.iter().map(|leg| leg.duration_secs).sum(),
            legs,
        })
    }

    fn map_url(&self, waypoints: &[(f64, f64)]) -> Option<String> {
        let [origin, middle @ .., destination] = waypoints else {
            return None;
        };
        let mut params = vec![
            ("api", "1".to_string()),
            ("origin", format_location(*origin)),
            ("destination", format_location(*destination)),
            ("travelmode", "driving".to_string()),
        ];
        if !middle.is_empty() {
            params.push(("waypoints", join_locations(middle)));
        }
        reqwest::Url::parse_with_params("https://www.google.com/maps/dir/", &params)
            .ok()
            .map(String::from)
    }
}

fn format_location((lat, lng): (f64, f64)) -> String {
    format!("{:.6},{:.6}", lat, lng)
}

fn join_locations(locations: &[(f64, f64)]) -> String {
    locations
        .iter()
        .map(|&location| format_location(location))
        .collect::<Vec<_>>()
        .join("|")
}

fn departure_param(traffic: TrafficOptions) -> String {
    // The service rejects past timestamps; "now" covers anything not ahead.
    let timestamp = traffic.departure.timestamp();
    if timestamp <= chrono::Utc::now().timestamp() {
        "now".to_string()
    } else {
        timestamp.to_string()
    }
}

fn check_status(status: &str, message: Option<String>) -> Result<(), ProviderError> {
    if status == "OK" {
        Ok(())
    } else {
        Err(ProviderError::status(status, message.unwrap_or_default()))
    }
}

/// Drops HTML tags from a directions instruction.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<Measure>,
    duration: Option<Measure>,
    duration_in_traffic: Option<Measure>,
}

impl MatrixElement {
    fn into_cell(self) -> MatrixCell {
        match (self.status.as_str(), self.distance, self.duration) {
            ("OK", Some(distance), Some(duration)) => {
                let leg = TravelLeg::new(distance.value, duration.value);
                MatrixCell::Resolved(match self.duration_in_traffic {
                    Some(traffic) => leg.with_traffic(traffic.value),
                    None => leg,
                })
            }
            _ => MatrixCell::Failed(self.status),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Measure {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    overview_polyline: EncodedPolyline,
    #[serde(default)]
    legs: Vec<DirectionsRouteLeg>,
}

#[derive(Debug, Deserialize)]
struct EncodedPolyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct DirectionsRouteLeg {
    distance: Measure,
    duration: Measure,
    start_address: Option<String>,
    end_address: Option<String>,
    #[serde(default)]
    steps: Vec<DirectionsRouteStep>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRouteStep {
    html_instructions: String,
    distance: Measure,
    duration: Measure,
    maneuver: Option<String>,
}
