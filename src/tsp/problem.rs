//! Bi-objective TSP over two mutable matrices.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::RngCore;

use super::instance::{Matrix, TspInstance};
use crate::error::{EvaluationError, InstanceError};
use crate::problem::{DynamicProblem, ProblemModel};

/// Which matrix an objective, or an update, refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TspObjective {
    /// Objective 0.
    Distance,
    /// Objective 1.
    Cost,
}

impl TspObjective {
    /// Position in the objective vector.
    pub fn index(self) -> usize {
        match self {
            TspObjective::Distance => 0,
            TspObjective::Cost => 1,
        }
    }
}

/// New weight for one undirected edge.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatrixUpdate {
    /// Matrix to update.
    pub matrix: TspObjective,
    /// First city.
    pub row: usize,
    /// Second city.
    pub col: usize,
    /// New weight, applied to `(row, col)` and `(col, row)`.
    pub value: f64,
}

impl MatrixUpdate {
    /// Creates an update.
    pub fn new(matrix: TspObjective, row: usize, col: usize, value: f64) -> Self {
        Self {
            matrix,
            row,
            col,
            value,
        }
    }

    fn check(&self, n: usize) -> Result<(), EvaluationError> {
        if self.row >= n || self.col >= n {
            return Err(EvaluationError::UpdateRejected(format!(
                "edge ({}, {}) out of range for {n} cities",
                self.row, self.col
            )));
        }
        if self.row == self.col {
            return Err(EvaluationError::UpdateRejected(format!(
                "diagonal entry ({0}, {0}) is fixed at zero",
                self.row
            )));
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(EvaluationError::UpdateRejected(format!(
                "invalid edge weight {}",
                self.value
            )));
        }
        Ok(())
    }
}

/// The distance and cost matrices of a bi-objective TSP.
///
/// Cloning is cheap: each matrix sits behind its own [`Arc`], and
/// [`with_updates`](Self::with_updates) copies only the matrices an update
/// batch touches.
#[derive(Debug, Clone, PartialEq)]
pub struct TspMatrices {
    distance: Arc<Matrix>,
    cost: Arc<Matrix>,
}

impl TspMatrices {
    /// Pairs two matrices of the same dimension.
    pub fn new(distance: Matrix, cost: Matrix) -> Result<Self, InstanceError> {
        if distance.dimension() != cost.dimension() {
            return Err(InstanceError::DimensionMismatch {
                expected: distance.dimension(),
                found: cost.dimension(),
            });
        }
        Ok(Self {
            distance: Arc::new(distance),
            cost: Arc::new(cost),
        })
    }

    /// Distance matrix from one instance, cost matrix from another.
    pub fn from_instances(distance: &TspInstance, cost: &TspInstance) -> Result<Self, InstanceError> {
        Self::new(distance.distance_matrix(), cost.distance_matrix())
    }

    /// Number of cities.
    pub fn dimension(&self) -> usize {
        self.distance.dimension()
    }

    /// Matrix behind `objective`.
    pub fn matrix(&self, objective: TspObjective) -> &Matrix {
        match objective {
            TspObjective::Distance => &self.distance,
            TspObjective::Cost => &self.cost,
        }
    }

    /// Applies a batch of updates, all or nothing.
    pub fn with_updates(&self, updates: &[MatrixUpdate]) -> Result<Self, EvaluationError> {
        let n = self.dimension();
        for update in updates {
            update.check(n)?;
        }
        let mut next = self.clone();
        for update in updates {
            let m = match update.matrix {
                TspObjective::Distance => Arc::make_mut(&mut next.distance),
                TspObjective::Cost => Arc::make_mut(&mut next.cost),
            };
            m.set(update.row, update.col, update.value);
        }
        Ok(next)
    }

    /// Whether the `objective` matrix is shared with `other` (no copy was made).
    pub fn shares_storage_with(&self, other: &Self, objective: TspObjective) -> bool {
        match objective {
            TspObjective::Distance => Arc::ptr_eq(&self.distance, &other.distance),
            TspObjective::Cost => Arc::ptr_eq(&self.cost, &other.cost),
        }
    }
}

/// Bi-objective symmetric TSP: minimize tour length under the distance
/// matrix and under the cost matrix.
///
/// Solutions are permutations of `0..n`. Records are update batches; a
/// batch with any invalid entry is rejected whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiobjectiveTsp {
    cities: usize,
}

impl MultiobjectiveTsp {
    /// Problem over `cities` cities.
    pub fn new(cities: usize) -> Self {
        Self { cities }
    }

    /// Dynamic problem starting from `matrices`.
    pub fn problem(matrices: TspMatrices) -> DynamicProblem<Self> {
        DynamicProblem::new(Self::new(matrices.dimension()), matrices)
    }

    /// Dynamic problem from two TSPLIB files, as the distance and the cost
    /// instance.
    pub fn from_files(
        distance: impl AsRef<std::path::Path>,
        cost: impl AsRef<std::path::Path>,
    ) -> Result<DynamicProblem<Self>, InstanceError> {
        let distance = TspInstance::from_path(distance)?;
        let cost = TspInstance::from_path(cost)?;
        Ok(Self::problem(TspMatrices::from_instances(&distance, &cost)?))
    }

    /// Number of cities.
    pub fn cities(&self) -> usize {
        self.cities
    }

    fn check_tour(&self, tour: &[usize]) -> Result<(), EvaluationError> {
        if tour.len() != self.cities {
            return Err(EvaluationError::Failed(format!(
                "tour visits {} cities, expected {}",
                tour.len(),
                self.cities
            )));
        }
        let mut seen = vec![false; self.cities];
        for &city in tour {
            match seen.get_mut(city) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(EvaluationError::Failed(format!(
                        "city {city} is out of range or repeated"
                    )))
                }
            }
        }
        Ok(())
    }
}

impl ProblemModel for MultiobjectiveTsp {
    type Solution = Vec<usize>;
    type Params = TspMatrices;
    type Record = Vec<MatrixUpdate>;

    fn number_of_objectives(&self) -> usize {
        2
    }

    fn create_solution(&self, _params: &TspMatrices, rng: &mut dyn RngCore) -> Vec<usize> {
        let mut tour: Vec<usize> = (0..self.cities).collect();
        tour.shuffle(rng);
        tour
    }

    fn evaluate(&self, params: &TspMatrices, tour: &Vec<usize>) -> Result<Vec<f64>, EvaluationError> {
        self.check_tour(tour)?;
        Ok(vec![
            params.matrix(TspObjective::Distance).tour_length(tour),
            params.matrix(TspObjective::Cost).tour_length(tour),
        ])
    }

    fn apply(&self, params: &TspMatrices, record: &Vec<MatrixUpdate>) -> Result<TspMatrices, EvaluationError> {
        params.with_updates(record)
    }

    fn name(&self) -> &str {
        "multiobjective-tsp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square() -> TspInstance {
        TspInstance::new("square", vec![(0.0, 0.0), (3.0, 0.0), (3.0, 4.0), (0.0, 4.0)])
    }

    fn line() -> TspInstance {
        TspInstance::new("line", vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)])
    }

    fn matrices() -> TspMatrices {
        TspMatrices::from_instances(&square(), &line()).unwrap()
    }

    // ---- Evaluation ----

    #[test]
    fn test_evaluate_both_objectives() {
        let tsp = MultiobjectiveTsp::new(4);
        let objs = tsp.evaluate(&matrices(), &vec![0, 1, 2, 3]).unwrap();
        assert_eq!(objs, vec![14.0, 6.0]);
    }

    #[test]
    fn test_evaluate_rejects_non_permutations() {
        let tsp = MultiobjectiveTsp::new(4);
        assert!(tsp.evaluate(&matrices(), &vec![0, 1, 2]).is_err());
        assert!(tsp.evaluate(&matrices(), &vec![0, 1, 1, 3]).is_err());
        assert!(tsp.evaluate(&matrices(), &vec![0, 1, 2, 9]).is_err());
    }

    #[test]
    fn test_create_solution_is_permutation() {
        let tsp = MultiobjectiveTsp::new(10);
        let mut rng = StdRng::seed_from_u64(3);
        let mut tour = tsp.create_solution(&matrices(), &mut rng);
        tour.sort_unstable();
        assert_eq!(tour, (0..10).collect::<Vec<_>>());
    }

    // ---- Updates ----

    #[test]
    fn test_update_is_symmetric_and_copy_on_write() {
        let before = matrices();
        let after = before
            .with_updates(&[MatrixUpdate::new(TspObjective::Cost, 0, 3, 10.0)])
            .unwrap();

        assert_eq!(after.matrix(TspObjective::Cost).get(0, 3), 10.0);
        assert_eq!(after.matrix(TspObjective::Cost).get(3, 0), 10.0);
        assert_eq!(before.matrix(TspObjective::Cost).get(0, 3), 3.0);
        assert!(after.shares_storage_with(&before, TspObjective::Distance));
        assert!(!after.shares_storage_with(&before, TspObjective::Cost));
    }

    #[test]
    fn test_invalid_batch_is_rejected_whole() {
        let before = matrices();
        let batch = [
            MatrixUpdate::new(TspObjective::Distance, 0, 1, 7.0),
            MatrixUpdate::new(TspObjective::Distance, 2, 2, 1.0),
        ];
        assert!(matches!(
            before.with_updates(&batch),
            Err(EvaluationError::UpdateRejected(_))
        ));
        let out_of_range = [MatrixUpdate::new(TspObjective::Cost, 0, 4, 1.0)];
        assert!(before.with_updates(&out_of_range).is_err());
        let nan = [MatrixUpdate::new(TspObjective::Cost, 0, 1, f64::NAN)];
        assert!(before.with_updates(&nan).is_err());
    }

    #[test]
    fn test_dynamic_problem_absorbs_updates() {
        let problem = MultiobjectiveTsp::problem(matrices());
        let tour = vec![0, 1, 2, 3];
        assert_eq!(problem.evaluate(&tour).unwrap(), vec![14.0, 6.0]);

        problem
            .apply(&vec![MatrixUpdate::new(TspObjective::Distance, 0, 1, 10.0)])
            .unwrap();
        assert_eq!(problem.version(), 1);
        assert_eq!(problem.evaluate(&tour).unwrap(), vec![21.0, 6.0]);
    }

    #[test]
    fn test_mismatched_instances() {
        let three = TspInstance::new("three", vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let err = TspMatrices::from_instances(&square(), &three).unwrap_err();
        assert!(matches!(err, InstanceError::DimensionMismatch { expected: 4, found: 3 }));
    }
}
