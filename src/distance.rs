//! Batched distance-matrix computation over a pluggable provider.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::config::TrafficModel;
use crate::error::ProviderError;
use crate::model::{Coordinate, DistanceTable, Matrix, MatrixCell};
use crate::traits::{DistanceMatrixProvider, TrafficOptions};

#[derive(Clone)]
pub struct DistanceMatrixClient {
    provider: Arc<dyn DistanceMatrixProvider>,
    traffic_model: TrafficModel,
    max_points: usize,
}

impl DistanceMatrixClient {
    pub fn new(
        provider: Arc<dyn DistanceMatrixProvider>,
        traffic_model: TrafficModel,
        max_points: usize,
    ) -> Self {
        Self {
            provider,
            traffic_model,
            max_points,
        }
    }

    /// Computes the full square matrix for `points` in one provider call.
    ///
    /// Individual cells may fail while the rest of the matrix is usable.
    pub fn compute_matrix(
        &self,
        points: &[(f64, f64)],
        include_traffic: bool,
    ) -> Result<Matrix, ProviderError> {
        if points.is_empty() {
            return Ok(Matrix::default());
        }
        if points.len() > self.max_points {
            return Err(ProviderError::TooManyPoints {
                requested: points.len(),
                limit: self.max_points,
            });
        }

        let traffic = include_traffic.then(|| TrafficOptions {
            departure: Utc::now(),
            model: self.traffic_model,
        });

        let matrix = self.provider.matrix_for(points, points, traffic)?;
        if matrix.origins() != points.len()
            || matrix.rows().iter().any(|row| row.len() != points.len())
        {
            return Err(ProviderError::InvalidResponse(format!(
                "expected a {n}x{n} matrix, got {}x{}",
                matrix.origins(),
                matrix.destinations(),
                n = points.len()
            )));
        }

        Ok(matrix)
    }

    /// Computes travel legs between deliveries, keyed by order id.
    ///
    /// Self-to-self cells and cells the provider failed to route are left out.
    pub fn compute_delivery_distances(
        &self,
        points: &[(String, Coordinate)],
        include_traffic: bool,
    ) -> Result<DistanceTable, ProviderError> {
        let locations = points.iter().map(|(_, coord)| coord.lat_lng()).collect::<Vec<_>>();
        let matrix = self.compute_matrix(&locations, include_traffic)?;

        let mut table = DistanceTable::new();
        let mut failed = 0;
        for (i, (from_id, _)) in points.iter().enumerate() {
            for (j, (to_id, _)) in points.iter().enumerate() {
                if i == j {
                    continue;
                }
                match matrix.cell(i, j) {
                    Some(MatrixCell::Resolved(leg)) => {
                        table.insert(from_id.clone(), to_id.clone(), *leg)
                    }
                    Some(MatrixCell::Failed(_)) | None => failed += 1,
                }
            }
        }

        debug!(points = points.len(), edges = table.len(), failed, "computed delivery distances");
        Ok(table)
    }
}
