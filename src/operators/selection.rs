//! Parent selection strategies.
//!
//! All strategies compare candidates through a [`Compares`] implementation,
//! so they work on the rank/crowding annotation of the last ranking pass
//! rather than on raw fitness.
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"
//! - Goldberg & Deb (1991), "A Comparative Analysis of Selection Schemes
//!   Used in Genetic Algorithms"

use std::cmp::Ordering;

use rand::{Rng, RngCore};

use super::{Compares, RankingAndCrowding, Selects};
use crate::algorithm::Candidate;
use crate::error::OperatorError;

/// Binary tournament: draw two distinct candidates, keep the better one.
///
/// On a tie, one of the two is kept at random.
pub struct BinaryTournament<S> {
    comparator: Box<dyn Compares<S>>,
}

impl<S: 'static> Default for BinaryTournament<S> {
    fn default() -> Self {
        Self::new(RankingAndCrowding)
    }
}

impl<S> BinaryTournament<S> {
    /// Creates a binary tournament using `comparator`.
    pub fn new(comparator: impl Compares<S> + 'static) -> Self {
        Self {
            comparator: Box::new(comparator),
        }
    }
}

impl<S> Selects<S> for BinaryTournament<S> {
    fn select(
        &self,
        population: &[Candidate<S>],
        rng: &mut dyn RngCore,
    ) -> Result<usize, OperatorError> {
        let n = population.len();
        match n {
            0 => Err(OperatorError::new(
                self.name(),
                "cannot select from an empty population",
            )),
            1 => Ok(0),
            _ => {
                let a = rng.random_range(0..n);
                let mut b = rng.random_range(0..n - 1);
                if b >= a {
                    b += 1;
                }
                Ok(
                    match self.comparator.compare(&population[a], &population[b]) {
                        Ordering::Less => a,
                        Ordering::Greater => b,
                        Ordering::Equal => {
                            if rng.random_bool(0.5) {
                                a
                            } else {
                                b
                            }
                        }
                    },
                )
            }
        }
    }

    fn name(&self) -> &str {
        "binary-tournament"
    }
}

/// k-tournament: draw `size` candidates with replacement, keep the best.
///
/// Larger `size` means stronger selection pressure.
/// - 2: light pressure
/// - 3-5: moderate
/// - >5: strong (risk of premature convergence)
pub struct Tournament<S> {
    size: usize,
    comparator: Box<dyn Compares<S>>,
}

impl<S> Tournament<S> {
    /// Creates a tournament of `size` (clamped to at least 1).
    pub fn new(size: usize, comparator: impl Compares<S> + 'static) -> Self {
        Self {
            size: size.max(1),
            comparator: Box::new(comparator),
        }
    }

    /// Tournament size.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<S> Selects<S> for Tournament<S> {
    fn select(
        &self,
        population: &[Candidate<S>],
        rng: &mut dyn RngCore,
    ) -> Result<usize, OperatorError> {
        let n = population.len();
        if n == 0 {
            return Err(OperatorError::new(
                self.name(),
                "cannot select from an empty population",
            ));
        }
        let mut best = rng.random_range(0..n);
        for _ in 1..self.size {
            let idx = rng.random_range(0..n);
            if self.comparator.compare(&population[idx], &population[best]) == Ordering::Less {
                best = idx;
            }
        }
        Ok(best)
    }

    fn name(&self) -> &str {
        "tournament"
    }
}

/// Uniform random selection. No selection pressure.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelection;

impl<S> Selects<S> for RandomSelection {
    fn select(
        &self,
        population: &[Candidate<S>],
        rng: &mut dyn RngCore,
    ) -> Result<usize, OperatorError> {
        if population.is_empty() {
            return Err(OperatorError::new(
                "random",
                "cannot select from an empty population",
            ));
        }
        Ok(rng.random_range(0..population.len()))
    }

    fn name(&self) -> &str {
        "random"
    }
}
