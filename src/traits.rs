//! Seams to the external routing collaborators.
//!
//! The engine only needs travel matrices. Where they come from (a road
//! router, a cache, a straight-line estimate) is up to the caller.

use crate::model::Location;

/// Distance (km) and travel time (minutes) for every ordered node pair.
///
/// Both matrices are indexed by the provided location order, depot first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TravelMatrices {
    pub distance_km: Vec<Vec<f64>>,
    pub time_minutes: Vec<Vec<f64>>,
}

impl TravelMatrices {
    pub fn zeroed(n: usize) -> Self {
        Self {
            distance_km: vec![vec![0.0; n]; n],
            time_minutes: vec![vec![0.0; n]; n],
        }
    }

    pub fn len(&self) -> usize {
        self.distance_km.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance_km.is_empty()
    }
}

/// Provides full travel matrices for a set of locations.
///
/// Implementations must return a complete matrix; unroutable pairs are
/// filled with an estimate rather than reported as errors.
pub trait MatrixProvider {
    fn matrices_for(&self, locations: &[Location]) -> TravelMatrices;
}

/// A single directed leg between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub distance_km: f64,
    pub duration_minutes: f64,
}

/// Looks up one directed leg at a time (e.g. a directions API).
///
/// Lookups run concurrently from a worker pool, hence `Sync`.
pub trait PairwiseRouter: Sync {
    type Error: std::fmt::Display;

    fn leg(&self, from: Location, to: Location) -> Result<Leg, Self::Error>;
}
