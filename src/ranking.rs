//! Pareto ranking utilities.
//!
//! Domain-agnostic building blocks for Pareto-based algorithms. All
//! objectives are **minimized**.
//!
//! - [`non_dominated_sort`]: fast non-dominated sorting (Deb et al., 2002)
//! - [`crowding_distance`]: crowding distance for diversity preservation
//! - [`assign_ranking`]: annotates a population with rank and crowding
//!
//! Infeasible candidates carry `+inf` objectives, so any feasible candidate
//! dominates them without special cases. Crowding distance ignores
//! non-finite ranges so infinities never turn into NaN.
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - IEEE Transactions on Evolutionary Computation, 6(2), 182-197

use std::cmp::Ordering;

use crate::algorithm::Candidate;

/// Result of non-dominated sorting.
///
/// `ranks[i]` is the Pareto rank of solution `i`. Rank 0 is the
/// non-dominated front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NondominatedSortResult {
    /// Pareto rank for each solution (0 = front).
    pub ranks: Vec<usize>,

    /// Indices grouped by front: `fronts[0]` holds the rank-0 indices, etc.
    /// Within a front, indices are ascending.
    pub fronts: Vec<Vec<usize>>,
}

/// Pareto dominance relation between two objective vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    /// Left dominates right.
    Left,
    /// Right dominates left.
    Right,
    /// Neither dominates the other.
    Neither,
}

/// Compares two objective vectors for Pareto dominance (minimization).
pub fn dominance(a: &[f64], b: &[f64]) -> Dominance {
    let mut a_better = false;
    let mut b_better = false;

    for (&va, &vb) in a.iter().zip(b.iter()) {
        if va < vb {
            a_better = true;
        } else if vb < va {
            b_better = true;
        }
        if a_better && b_better {
            return Dominance::Neither;
        }
    }

    match (a_better, b_better) {
        (true, false) => Dominance::Left,
        (false, true) => Dominance::Right,
        _ => Dominance::Neither,
    }
}

/// Fast non-dominated sorting.
///
/// O(m·n²) for n solutions with m objectives. An empty input yields an empty
/// result.
///
/// # Example
///
/// ```
/// use u_dynopt::ranking::non_dominated_sort;
///
/// let objectives = vec![
///     vec![1.0, 5.0],
///     vec![3.0, 3.0],
///     vec![5.0, 1.0],
///     vec![4.0, 4.0], // dominated by (3, 3)
/// ];
///
/// let result = non_dominated_sort(&objectives);
/// assert_eq!(result.ranks, vec![0, 0, 0, 1]);
/// assert_eq!(result.fronts, vec![vec![0, 1, 2], vec![3]]);
/// ```
pub fn non_dominated_sort<V: AsRef<[f64]>>(objectives: &[V]) -> NondominatedSortResult {
    let n = objectives.len();
    if n == 0 {
        return NondominatedSortResult {
            ranks: Vec::new(),
            fronts: Vec::new(),
        };
    }

    let mut domination_count = vec![0usize; n];
    let mut dominates: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            match dominance(objectives[i].as_ref(), objectives[j].as_ref()) {
                Dominance::Left => {
                    dominates[i].push(j);
                    domination_count[j] += 1;
                }
                Dominance::Right => {
                    dominates[j].push(i);
                    domination_count[i] += 1;
                }
                Dominance::Neither => {}
            }
        }
    }

    let mut ranks = vec![0usize; n];
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    let mut fronts = Vec::new();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominates[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    ranks[j] = fronts.len() + 1;
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }

    NondominatedSortResult { ranks, fronts }
}

/// Crowding distance of each solution within one front.
///
/// Boundary solutions of every objective get `f64::INFINITY`. Objectives
/// whose range is zero or not finite contribute nothing, so the result never
/// contains NaN.
///
/// # Example
///
/// ```
/// use u_dynopt::ranking::crowding_distance;
///
/// let d = crowding_distance(&[vec![1.0, 5.0], vec![3.0, 3.0], vec![5.0, 1.0]]);
/// assert!(d[0].is_infinite() && d[2].is_infinite());
/// assert!((d[1] - 2.0).abs() < 1e-12);
/// ```
pub fn crowding_distance<V: AsRef<[f64]>>(objectives: &[V]) -> Vec<f64> {
    let n = objectives.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let m = objectives[0].as_ref().len();
    let mut distances = vec![0.0f64; n];
    let mut order: Vec<usize> = (0..n).collect();

    for k in 0..m {
        let value = |i: usize| objectives[i].as_ref()[k];
        order.sort_by(|&a, &b| value(a).partial_cmp(&value(b)).unwrap_or(Ordering::Equal));

        distances[order[0]] = f64::INFINITY;
        distances[order[n - 1]] = f64::INFINITY;

        let range = value(order[n - 1]) - value(order[0]);
        if !(range.is_finite() && range > 0.0) {
            continue;
        }

        for w in 1..(n - 1) {
            let gap = value(order[w + 1]) - value(order[w - 1]);
            if gap.is_finite() {
                distances[order[w]] += gap / range;
            }
        }
    }

    distances
}

/// Annotates every candidate with its Pareto rank and its crowding distance
/// within its own front. Returns the fronts.
pub fn assign_ranking<S>(population: &mut [Candidate<S>]) -> Vec<Vec<usize>> {
    let sorted = {
        let objectives: Vec<&[f64]> = population.iter().map(|c| c.objectives()).collect();
        non_dominated_sort(&objectives)
    };

    for front in &sorted.fronts {
        let front_objs: Vec<&[f64]> = front.iter().map(|&i| population[i].objectives()).collect();
        let distances = crowding_distance(&front_objs);
        for (&i, d) in front.iter().zip(distances) {
            population[i].set_ranking(sorted.ranks[i], d);
        }
    }

    sorted.fronts
}

/// Indices of the non-dominated members of `population`, ascending.
pub fn non_dominated_indices<S>(population: &[Candidate<S>]) -> Vec<usize> {
    let objectives: Vec<&[f64]> = population.iter().map(|c| c.objectives()).collect();
    non_dominated_sort(&objectives)
        .fronts
        .into_iter()
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ---- Non-dominated sort ----

    #[test]
    fn test_empty_input() {
        let objs: Vec<Vec<f64>> = vec![];
        let result = non_dominated_sort(&objs);
        assert!(result.ranks.is_empty());
        assert!(result.fronts.is_empty());
    }

    #[test]
    fn test_single_solution() {
        let result = non_dominated_sort(&[vec![1.0, 2.0]]);
        assert_eq!(result.ranks, vec![0]);
        assert_eq!(result.fronts, vec![vec![0]]);
    }

    #[test]
    fn test_chain_of_dominance() {
        let objs = vec![vec![3.0, 3.0], vec![1.0, 1.0], vec![2.0, 2.0]];
        let result = non_dominated_sort(&objs);
        assert_eq!(result.ranks, vec![2, 0, 1]);
        assert_eq!(result.fronts, vec![vec![1], vec![2], vec![0]]);
    }

    #[test]
    fn test_mixed_fronts() {
        let objs = vec![
            vec![1.0, 5.0],
            vec![3.0, 3.0],
            vec![5.0, 1.0],
            vec![4.0, 4.0], // dominated by (3,3)
            vec![6.0, 6.0], // dominated by (4,4)
        ];
        let result = non_dominated_sort(&objs);
        assert_eq!(result.ranks, vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_identical_vectors_share_a_front() {
        let objs = vec![vec![2.0, 2.0]; 3];
        let result = non_dominated_sort(&objs);
        assert!(result.ranks.iter().all(|&r| r == 0));
    }

    #[test]
    fn test_infeasible_vectors_rank_last() {
        let inf = f64::INFINITY;
        let objs = vec![vec![inf, inf], vec![10.0, 10.0], vec![inf, inf]];
        let result = non_dominated_sort(&objs);
        assert_eq!(result.ranks, vec![1, 0, 1]);
    }

    #[test]
    fn test_dominance_relation() {
        assert_eq!(dominance(&[1.0, 1.0], &[2.0, 2.0]), Dominance::Left);
        assert_eq!(dominance(&[2.0, 2.0], &[1.0, 2.0]), Dominance::Right);
        assert_eq!(dominance(&[1.0, 3.0], &[3.0, 1.0]), Dominance::Neither);
        assert_eq!(dominance(&[1.0, 1.0], &[1.0, 1.0]), Dominance::Neither);
    }

    // ---- Crowding distance ----

    #[test]
    fn test_crowding_small_fronts_are_boundaries() {
        assert!(crowding_distance(&[vec![1.0]]).iter().all(|d| d.is_infinite()));
        assert!(crowding_distance(&[vec![1.0, 3.0], vec![3.0, 1.0]])
            .iter()
            .all(|d| d.is_infinite()));
    }

    #[test]
    fn test_crowding_evenly_spaced() {
        let objs = vec![
            vec![0.0, 4.0],
            vec![1.0, 3.0],
            vec![2.0, 2.0],
            vec![3.0, 1.0],
            vec![4.0, 0.0],
        ];
        let d = crowding_distance(&objs);
        assert!(d[0].is_infinite() && d[4].is_infinite());
        assert!((d[1] - d[2]).abs() < 1e-10);
        assert!((d[2] - d[3]).abs() < 1e-10);
    }

    #[test]
    fn test_crowding_zero_range_objective() {
        let objs = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]];
        let d = crowding_distance(&objs);
        assert!(d[1].is_finite());
    }

    #[test]
    fn test_crowding_with_infinite_members_has_no_nan() {
        let inf = f64::INFINITY;
        let objs = vec![vec![inf, inf], vec![inf, inf], vec![inf, inf], vec![inf, inf]];
        let d = crowding_distance(&objs);
        assert!(d.iter().all(|x| !x.is_nan()), "{d:?}");
    }

    // ---- Population ranking ----

    #[test]
    fn test_assign_ranking_annotates_candidates() {
        let mut pop: Vec<Candidate<u8>> = [[1.0, 5.0], [3.0, 3.0], [5.0, 1.0], [4.0, 4.0]]
            .iter()
            .enumerate()
            .map(|(i, o)| {
                let mut c = Candidate::new(i as u8);
                c.set_evaluation(Ok(o.to_vec()), 0);
                c
            })
            .collect();

        let fronts = assign_ranking(&mut pop);

        assert_eq!(fronts.len(), 2);
        assert_eq!(pop[3].rank(), 1);
        assert!(pop[0].crowding().is_infinite());
        assert!(pop[1].crowding().is_finite());
        assert_eq!(non_dominated_indices(&pop), vec![0, 1, 2]);
    }

    proptest! {
        #[test]
        fn prop_fronts_partition_population(
            objs in prop::collection::vec(prop::collection::vec(0.0f64..100.0, 2), 1..40)
        ) {
            let result = non_dominated_sort(&objs);
            let mut seen: Vec<usize> = result.fronts.iter().flatten().copied().collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..objs.len()).collect::<Vec<_>>());
        }

        #[test]
        fn prop_no_member_of_a_front_dominates_another(
            objs in prop::collection::vec(prop::collection::vec(0.0f64..100.0, 3), 1..30)
        ) {
            let result = non_dominated_sort(&objs);
            for front in &result.fronts {
                for &a in front {
                    for &b in front {
                        prop_assert_ne!(dominance(&objs[a], &objs[b]), Dominance::Left);
                    }
                }
            }
        }

        #[test]
        fn prop_every_dominated_member_has_a_better_ranked_dominator(
            objs in prop::collection::vec(prop::collection::vec(0.0f64..10.0, 2), 2..30)
        ) {
            let result = non_dominated_sort(&objs);
            for (i, &r) in result.ranks.iter().enumerate() {
                if r > 0 {
                    let has = (0..objs.len()).any(|j| {
                        result.ranks[j] == r - 1 && dominance(&objs[j], &objs[i]) == Dominance::Left
                    });
                    prop_assert!(has);
                }
            }
        }
    }
}
