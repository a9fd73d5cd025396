//! Candidate comparators.

use std::cmp::Ordering;

use super::Compares;
use crate::algorithm::Candidate;
use crate::ranking::{dominance, Dominance};

/// NSGA-II crowded comparison: lower Pareto rank first, then larger crowding
/// distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankingAndCrowding;

impl<S> Compares<S> for RankingAndCrowding {
    fn compare(&self, a: &Candidate<S>, b: &Candidate<S>) -> Ordering {
        a.rank().cmp(&b.rank()).then_with(|| {
            b.crowding()
                .partial_cmp(&a.crowding())
                .unwrap_or(Ordering::Equal)
        })
    }

    fn name(&self) -> &str {
        "ranking-and-crowding"
    }
}

/// Pareto dominance on the objective vectors. Mutually non-dominated
/// candidates compare `Equal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DominanceComparator;

impl<S> Compares<S> for DominanceComparator {
    fn compare(&self, a: &Candidate<S>, b: &Candidate<S>) -> Ordering {
        match dominance(a.objectives(), b.objectives()) {
            Dominance::Left => Ordering::Less,
            Dominance::Right => Ordering::Greater,
            Dominance::Neither => Ordering::Equal,
        }
    }

    fn name(&self) -> &str {
        "dominance"
    }
}
