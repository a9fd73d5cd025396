//! Permutation crossover and mutation.
//!
//! Operators for solutions encoded as `Vec<usize>` permutations of `0..n`
//! (tours, job orders). The free functions work on slices; the structs wrap
//! them with an application probability for the algorithm.
//!
//! # Crossover
//!
//! - [`PmxCrossover`] / [`pmx_crossover`]: Goldberg & Lingle (1985), keeps absolute positions
//! - [`OrderCrossover`] / [`order_crossover`]: Davis (1985), keeps relative order
//!
//! # Mutation
//!
//! - [`SwapMutation`]: exchange two positions, O(1)
//! - [`InsertMutation`]: move one element, O(n)
//! - [`InversionMutation`]: reverse a segment (2-opt move), O(n)
//!
//! # References
//!
//! - Davis (1985), "Applying Adaptive Algorithms to Epistatic Domains"
//! - Goldberg & Lingle (1985), "Alleles, Loci, and the Traveling Salesman Problem"

use rand::{Rng, RngCore};

use super::{Crosses, Mutates};
use crate::error::OperatorError;

const UNSET: usize = usize::MAX;

fn check_parents(name: &str, p1: &[usize], p2: &[usize]) -> Result<usize, OperatorError> {
    if p1.len() != p2.len() {
        return Err(OperatorError::new(
            name,
            format!("parents differ in length ({} vs {})", p1.len(), p2.len()),
        ));
    }
    if p1.is_empty() {
        return Err(OperatorError::new(name, "parents are empty"));
    }
    if let Some(&v) = p1.iter().chain(p2.iter()).find(|&&v| v >= p1.len()) {
        return Err(OperatorError::new(
            name,
            format!("value {v} out of range for a permutation of {}", p1.len()),
        ));
    }
    Ok(p1.len())
}

/// Partially Mapped Crossover on two permutations.
///
/// Copies a random segment from each parent and places the displaced
/// elements of the other parent by following the segment's mapping chain.
pub fn pmx_crossover(
    parent1: &[usize],
    parent2: &[usize],
    rng: &mut dyn RngCore,
) -> Result<(Vec<usize>, Vec<usize>), OperatorError> {
    let n = check_parents("pmx", parent1, parent2)?;
    if n == 1 {
        return Ok((parent1.to_vec(), parent2.to_vec()));
    }
    let (start, end) = random_segment(n, rng);
    Ok((
        pmx_child(parent1, parent2, start, end)?,
        pmx_child(parent2, parent1, start, end)?,
    ))
}

fn pmx_child(
    template: &[usize],
    donor: &[usize],
    start: usize,
    end: usize,
) -> Result<Vec<usize>, OperatorError> {
    let n = template.len();
    let mut child = vec![UNSET; n];
    let mut placed = vec![false; n];
    let mut donor_pos = vec![UNSET; n];
    for (i, &v) in donor.iter().enumerate() {
        donor_pos[v] = i;
    }

    for i in start..=end {
        child[i] = template[i];
        placed[template[i]] = true;
    }

    for i in start..=end {
        let value = donor[i];
        if placed[value] {
            continue;
        }
        let mut pos = i;
        // A chain longer than n means the parents are not permutations.
        for _ in 0..=n {
            let target = donor_pos[template[pos]];
            if target == UNSET {
                return Err(OperatorError::new("pmx", "parents are not permutations of the same set"));
            }
            if target < start || target > end {
                child[target] = value;
                placed[value] = true;
                break;
            }
            pos = target;
        }
        if !placed[value] {
            return Err(OperatorError::new("pmx", "mapping chain did not terminate"));
        }
    }

    for (slot, &v) in child.iter_mut().zip(donor) {
        if *slot == UNSET {
            *slot = v;
        }
    }
    Ok(child)
}

/// Order Crossover on two permutations.
///
/// Copies a random segment from one parent, then fills the remaining
/// positions with the other parent's elements in their order, starting after
/// the segment and wrapping around.
pub fn order_crossover(
    parent1: &[usize],
    parent2: &[usize],
    rng: &mut dyn RngCore,
) -> Result<(Vec<usize>, Vec<usize>), OperatorError> {
    let n = check_parents("ox", parent1, parent2)?;
    if n == 1 {
        return Ok((parent1.to_vec(), parent2.to_vec()));
    }
    let (start, end) = random_segment(n, rng);
    Ok((
        ox_child(parent1, parent2, start, end),
        ox_child(parent2, parent1, start, end),
    ))
}

fn ox_child(template: &[usize], donor: &[usize], start: usize, end: usize) -> Vec<usize> {
    let n = template.len();
    let mut child = vec![UNSET; n];
    let mut used = vec![false; n];

    for i in start..=end {
        child[i] = template[i];
        used[template[i]] = true;
    }

    let mut pos = (end + 1) % n;
    for offset in 0..n {
        let v = donor[(end + 1 + offset) % n];
        if !used[v] {
            used[v] = true;
            child[pos] = v;
            pos = (pos + 1) % n;
        }
    }
    child
}

/// Random segment `[start, end]` within `0..n`, `start <= end`.
fn random_segment(n: usize, rng: &mut dyn RngCore) -> (usize, usize) {
    let a = rng.random_range(0..n);
    let b = rng.random_range(0..n);
    (a.min(b), a.max(b))
}

macro_rules! probability_ctor {
    ($ty:ident) => {
        impl $ty {
            /// Creates the operator with an application probability in `[0, 1]`.
            pub fn new(probability: f64) -> Self {
                Self { probability }
            }
        }
    };
}

/// PMX crossover with an application probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmxCrossover {
    probability: f64,
}
probability_ctor!(PmxCrossover);

impl Crosses<Vec<usize>> for PmxCrossover {
    fn cross(
        &self,
        parents: &[&Vec<usize>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<usize>>, OperatorError> {
        let [p1, p2] = parents else {
            return Err(OperatorError::new("pmx", format!("expected 2 parents, got {}", parents.len())));
        };
        let (c1, c2) = pmx_crossover(p1, p2, rng)?;
        Ok(vec![c1, c2])
    }

    fn probability(&self) -> f64 {
        self.probability
    }

    fn name(&self) -> &str {
        "pmx"
    }
}

/// Order crossover with an application probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderCrossover {
    probability: f64,
}
probability_ctor!(OrderCrossover);

impl Crosses<Vec<usize>> for OrderCrossover {
    fn cross(
        &self,
        parents: &[&Vec<usize>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<usize>>, OperatorError> {
        let [p1, p2] = parents else {
            return Err(OperatorError::new("ox", format!("expected 2 parents, got {}", parents.len())));
        };
        let (c1, c2) = order_crossover(p1, p2, rng)?;
        Ok(vec![c1, c2])
    }

    fn probability(&self) -> f64 {
        self.probability
    }

    fn name(&self) -> &str {
        "ox"
    }
}

/// Swaps two random positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapMutation {
    probability: f64,
}
probability_ctor!(SwapMutation);

impl Mutates<Vec<usize>> for SwapMutation {
    fn mutate(&self, perm: &mut Vec<usize>, rng: &mut dyn RngCore) -> Result<(), OperatorError> {
        let n = perm.len();
        if n >= 2 {
            let i = rng.random_range(0..n);
            let mut j = rng.random_range(0..n - 1);
            if j >= i {
                j += 1;
            }
            perm.swap(i, j);
        }
        Ok(())
    }

    fn probability(&self) -> f64 {
        self.probability
    }

    fn name(&self) -> &str {
        "swap"
    }
}

/// Removes a random element and reinserts it at a random position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertMutation {
    probability: f64,
}
probability_ctor!(InsertMutation);

impl Mutates<Vec<usize>> for InsertMutation {
    fn mutate(&self, perm: &mut Vec<usize>, rng: &mut dyn RngCore) -> Result<(), OperatorError> {
        let n = perm.len();
        if n >= 2 {
            let item = perm.remove(rng.random_range(0..n));
            perm.insert(rng.random_range(0..n), item);
        }
        Ok(())
    }

    fn probability(&self) -> f64 {
        self.probability
    }

    fn name(&self) -> &str {
        "insert"
    }
}

/// Reverses a random segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InversionMutation {
    probability: f64,
}
probability_ctor!(InversionMutation);

impl Mutates<Vec<usize>> for InversionMutation {
    fn mutate(&self, perm: &mut Vec<usize>, rng: &mut dyn RngCore) -> Result<(), OperatorError> {
        if perm.len() >= 2 {
            let (start, end) = random_segment(perm.len(), rng);
            perm[start..=end].reverse();
        }
        Ok(())
    }

    fn probability(&self) -> f64 {
        self.probability
    }

    fn name(&self) -> &str {
        "inversion"
    }
}
