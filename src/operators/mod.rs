//! Pluggable evolutionary operators.
//!
//! The algorithm talks to its operators through four small capability
//! traits. Concrete strategies are interchangeable implementations, passed
//! to [`DynamicAlgorithmBuilder`](crate::algorithm::DynamicAlgorithmBuilder)
//! as boxed trait objects.
//!
//! | Trait | Contract |
//! |---|---|
//! | [`Selects`] | population → index of one parent |
//! | [`Crosses`] | `arity()` parents → exactly `offspring()` children |
//! | [`Mutates`] | perturbs one solution in place |
//! | [`Compares`] | total preorder over ranked candidates (`Less` = better) |
//!
//! Crossover and mutation declare an application probability; the
//! algorithm draws against it, so operators themselves always apply.
//! A contract violation (an `Err`, a wrong offspring count, an out-of-range
//! index) terminates the run with
//! [`AlgorithmError::Operator`](crate::error::AlgorithmError::Operator).
//!
//! # Provided implementations
//!
//! - Comparators: [`RankingAndCrowding`], [`DominanceComparator`]
//! - Selection: [`BinaryTournament`], [`Tournament`], [`RandomSelection`]
//! - Permutation crossover: [`PmxCrossover`], [`OrderCrossover`]
//! - Permutation mutation: [`SwapMutation`], [`InsertMutation`], [`InversionMutation`]

mod comparator;
pub mod permutation;
mod selection;

use std::cmp::Ordering;

use rand::RngCore;

use crate::algorithm::Candidate;
use crate::error::OperatorError;

pub use comparator::{DominanceComparator, RankingAndCrowding};
pub use permutation::{
    InsertMutation, InversionMutation, OrderCrossover, PmxCrossover, SwapMutation,
};
pub use selection::{BinaryTournament, RandomSelection, Tournament};

/// Orders ranked candidates. `Ordering::Less` means `a` is better.
///
/// Implementations must break ties with their declared secondary key and
/// return `Equal` only for candidates they consider interchangeable; the
/// algorithm then keeps population order.
pub trait Compares<S>: Send + Sync {
    /// Compares two candidates.
    fn compare(&self, a: &Candidate<S>, b: &Candidate<S>) -> Ordering;

    /// Short name for logs and faults.
    fn name(&self) -> &str;
}

/// Picks one parent from a ranked population.
pub trait Selects<S>: Send + Sync {
    /// Returns the index of the selected parent in `population`.
    fn select(
        &self,
        population: &[Candidate<S>],
        rng: &mut dyn RngCore,
    ) -> Result<usize, OperatorError>;

    /// Short name for logs and faults.
    fn name(&self) -> &str;
}

/// Recombines parents into offspring.
pub trait Crosses<S>: Send + Sync {
    /// Produces exactly [`offspring`](Self::offspring) children from
    /// [`arity`](Self::arity) parents.
    fn cross(&self, parents: &[&S], rng: &mut dyn RngCore) -> Result<Vec<S>, OperatorError>;

    /// Probability that the algorithm applies this operator to a mating.
    fn probability(&self) -> f64;

    /// Number of parents consumed per mating.
    fn arity(&self) -> usize {
        2
    }

    /// Number of children produced per mating.
    fn offspring(&self) -> usize {
        2
    }

    /// Short name for logs and faults.
    fn name(&self) -> &str;
}

/// Perturbs a solution in place.
pub trait Mutates<S>: Send + Sync {
    /// Mutates `solution`.
    fn mutate(&self, solution: &mut S, rng: &mut dyn RngCore) -> Result<(), OperatorError>;

    /// Probability that the algorithm applies this operator to an offspring.
    fn probability(&self) -> f64;

    /// Short name for logs and faults.
    fn name(&self) -> &str;
}
