//! Haversine matrix provider (fallback when the road router is unavailable).
//!
//! Uses great-circle distance to estimate travel time.
//! Less accurate than a road router but always available.

use crate::model::Location;
use crate::traits::{Leg, MatrixProvider, TravelMatrices};

/// Average driving speed assumption for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine-based matrix provider.
///
/// Estimates travel time using straight-line distance and an assumed speed.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance between two points in kilometers.
    pub fn haversine_km(from: Location, to: Location) -> f64 {
        let lat1_rad = from.lat.to_radians();
        let lat2_rad = to.lat.to_radians();
        let delta_lat = (to.lat - from.lat).to_radians();
        let delta_lng = (to.lng - from.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    /// Convert distance in km to travel time in minutes.
    pub fn km_to_minutes(&self, km: f64) -> f64 {
        km / self.speed_kmh * 60.0
    }

    /// Estimated leg between two points.
    pub fn estimate(&self, from: Location, to: Location) -> Leg {
        let km = Self::haversine_km(from, to);
        Leg {
            distance_km: km,
            duration_minutes: self.km_to_minutes(km),
        }
    }
}

impl MatrixProvider for HaversineMatrix {
    fn matrices_for(&self, locations: &[Location]) -> TravelMatrices {
        let mut matrices = TravelMatrices::zeroed(locations.len());

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    let leg = self.estimate(*from, *to);
                    matrices.distance_km[i][j] = leg.distance_km;
                    matrices.time_minutes[i][j] = leg.duration_minutes;
                }
            }
        }

        matrices
    }
}
