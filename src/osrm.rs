//! OSRM HTTP adapter for travel matrices.
//!
//! Two entry points: the table service fills a whole matrix in one request,
//! the route service answers single legs for [`BatchedMatrixBuilder`].
//!
//! [`BatchedMatrixBuilder`]: crate::matrix::BatchedMatrixBuilder

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::haversine::HaversineMatrix;
use crate::model::Location;
use crate::traits::{Leg, MatrixProvider, PairwiseRouter, TravelMatrices};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("router returned {code}")]
    NoRoute { code: String },
}

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
    fallback: HaversineMatrix,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            fallback: HaversineMatrix::default(),
        })
    }

    pub fn with_fallback(mut self, fallback: HaversineMatrix) -> Self {
        self.fallback = fallback;
        self
    }

    fn table(&self, locations: &[Location]) -> Result<OsrmTableResponse, RouterError> {
        let url = format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url,
            self.config.profile,
            coordinates(locations)
        );

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        if body.code != "Ok" {
            return Err(RouterError::NoRoute { code: body.code });
        }
        Ok(body)
    }
}

impl PairwiseRouter for OsrmClient {
    type Error = RouterError;

    fn leg(&self, from: Location, to: Location) -> Result<Leg, RouterError> {
        let url = format!(
            "{}/route/v1/{}/{}?overview=false",
            self.config.base_url,
            self.config.profile,
            coordinates(&[from, to])
        );

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmRouteResponse>())?;

        body.into_leg()
    }
}

impl MatrixProvider for OsrmClient {
    fn matrices_for(&self, locations: &[Location]) -> TravelMatrices {
        if locations.is_empty() {
            return TravelMatrices::default();
        }

        match self.table(locations) {
            Ok(body) => body.into_matrices(locations, &self.fallback),
            Err(err) => {
                warn!(%err, "OSRM table request failed, estimating every cell");
                self.fallback.matrices_for(locations)
            }
        }
    }
}

/// OSRM expects `lng,lat` pairs joined by `;`.
fn coordinates(locations: &[Location]) -> String {
    locations
        .iter()
        .map(|loc| format!("{:.6},{:.6}", loc.lng, loc.lat))
        .collect::<Vec<_>>()
        .join(";")
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    /// Seconds; `null` for unroutable pairs.
    durations: Option<Vec<Vec<Option<f64>>>>,
    /// Meters; `null` for unroutable pairs.
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    fn into_matrices(self, locations: &[Location], fallback: &HaversineMatrix) -> TravelMatrices {
        let n = locations.len();
        let durations = self.durations.unwrap_or_default();
        let distances = self.distances.unwrap_or_default();
        let mut matrices = TravelMatrices::zeroed(n);
        let mut estimated = 0usize;

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let seconds = durations.get(i).and_then(|row| row.get(j).copied().flatten());
                let meters = distances.get(i).and_then(|row| row.get(j).copied().flatten());
                match (meters, seconds) {
                    (Some(meters), Some(seconds)) => {
                        matrices.distance_km[i][j] = meters / 1000.0;
                        matrices.time_minutes[i][j] = seconds / 60.0;
                    }
                    _ => {
                        let leg = fallback.estimate(locations[i], locations[j]);
                        matrices.distance_km[i][j] = leg.distance_km;
                        matrices.time_minutes[i][j] = leg.duration_minutes;
                        estimated += 1;
                    }
                }
            }
        }

        if estimated > 0 {
            warn!(estimated, "OSRM table had unroutable pairs, estimated them");
        }
        matrices
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
}

impl OsrmRouteResponse {
    fn into_leg(self) -> Result<Leg, RouterError> {
        match (self.code.as_str(), self.routes.first()) {
            ("Ok", Some(route)) => Ok(Leg {
                distance_km: route.distance / 1000.0,
                duration_minutes: route.duration / 60.0,
            }),
            _ => Err(RouterError::NoRoute { code: self.code }),
        }
    }
}
