//! Batched pairwise matrix builder.
//!
//! Fans pairwise lookups out to a [`PairwiseRouter`] in fixed-size batches,
//! pausing between batches to stay under the router's rate limit. A failed
//! lookup is replaced by a haversine estimate for that cell only.

use std::env;
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::override_from;
use crate::haversine::{HaversineMatrix, DEFAULT_SPEED_KMH};
use crate::model::Location;
use crate::traits::{Leg, MatrixProvider, PairwiseRouter, TravelMatrices};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatrixOptions {
    /// Concurrent lookups per batch.
    pub batch_size: usize,
    /// Pause after every batch.
    pub batch_delay_ms: u64,
    /// Speed used by the straight-line fallback.
    pub fallback_speed_kmh: f64,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_ms: 500,
            fallback_speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl MatrixOptions {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        override_from(&lookup, "MATRIX_BATCH_SIZE", &mut options.batch_size);
        override_from(&lookup, "MATRIX_BATCH_DELAY_MS", &mut options.batch_delay_ms);
        override_from(&lookup, "MATRIX_FALLBACK_SPEED_KMH", &mut options.fallback_speed_kmh);
        options
    }
}

pub struct BatchedMatrixBuilder<R> {
    router: R,
    batch_size: usize,
    batch_delay: Duration,
    fallback: HaversineMatrix,
    pool: ThreadPool,
}

impl<R: PairwiseRouter> BatchedMatrixBuilder<R> {
    pub fn new(router: R, options: MatrixOptions) -> Result<Self, ThreadPoolBuildError> {
        let batch_size = options.batch_size.max(1);
        let pool = ThreadPoolBuilder::new().num_threads(batch_size).build()?;

        Ok(Self {
            router,
            batch_size,
            batch_delay: Duration::from_millis(options.batch_delay_ms),
            fallback: HaversineMatrix::new(options.fallback_speed_kmh),
            pool,
        })
    }

    fn lookup(&self, from: Location, to: Location) -> Leg {
        match self.router.leg(from, to) {
            Ok(leg) => leg,
            Err(err) => {
                warn!(%err, ?from, ?to, "pairwise lookup failed, using straight-line estimate");
                self.fallback.estimate(from, to)
            }
        }
    }
}

impl<R: PairwiseRouter> MatrixProvider for BatchedMatrixBuilder<R> {
    #[instrument(skip_all, fields(locations = locations.len()))]
    fn matrices_for(&self, locations: &[Location]) -> TravelMatrices {
        let n = locations.len();
        let mut matrices = TravelMatrices::zeroed(n);

        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .collect();

        let batches = pairs.chunks(self.batch_size).count();
        for (batch_index, batch) in pairs.chunks(self.batch_size).enumerate() {
            let legs: Vec<(usize, usize, Leg)> = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|&(i, j)| (i, j, self.lookup(locations[i], locations[j])))
                    .collect()
            });

            for (i, j, leg) in legs {
                matrices.distance_km[i][j] = leg.distance_km;
                matrices.time_minutes[i][j] = leg.duration_minutes;
            }

            if batch_index + 1 < batches && !self.batch_delay.is_zero() {
                thread::sleep(self.batch_delay);
            }
        }

        debug!(pairs = pairs.len(), batches, "travel matrices assembled");
        matrices
    }
}
