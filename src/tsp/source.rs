//! Random edge-weight updates.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::problem::{MatrixUpdate, TspObjective};
use crate::error::SourceError;
use crate::source::StreamingSource;

/// Emits a batch of random edge updates per record.
///
/// Each update picks a matrix, two distinct cities and a weight uniformly.
/// Seeded, so a run can be replayed.
#[derive(Debug, Clone)]
pub struct RandomMatrixUpdates {
    name: String,
    cities: usize,
    batch_size: usize,
    weights: Range<f64>,
    rng: StdRng,
}

impl RandomMatrixUpdates {
    /// Updates for a problem over `cities` cities: one update per batch,
    /// weights in `[1, 5000)`.
    pub fn new(cities: usize, seed: u64) -> Self {
        Self {
            name: "tsp-updates".to_string(),
            cities,
            batch_size: 1,
            weights: 1.0..5000.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Updates per record.
    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    /// Range new weights are drawn from.
    pub fn with_weights(mut self, weights: Range<f64>) -> Self {
        self.weights = weights;
        self
    }

    /// Name used in logs and as the record channel prefix.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl StreamingSource for RandomMatrixUpdates {
    type Data = Vec<MatrixUpdate>;

    fn next_record(&mut self) -> Result<Vec<MatrixUpdate>, SourceError> {
        if self.cities < 2 {
            return Err(SourceError::new(&self.name, "need at least two cities"));
        }
        if self.weights.is_empty() || !self.weights.start.is_finite() || !self.weights.end.is_finite() {
            return Err(SourceError::new(
                &self.name,
                format!("invalid weight range {:?}", self.weights),
            ));
        }

        let batch = (0..self.batch_size)
            .map(|_| {
                let matrix = if self.rng.random_bool(0.5) {
                    TspObjective::Distance
                } else {
                    TspObjective::Cost
                };
                let pair = index::sample(&mut self.rng, self.cities, 2);
                let value = self.rng.random_range(self.weights.clone());
                MatrixUpdate::new(matrix, pair.index(0), pair.index(1), value)
            })
            .collect();
        Ok(batch)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
