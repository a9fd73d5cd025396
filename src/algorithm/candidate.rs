//! Population member.

use crate::error::EvaluationError;

/// A candidate solution in the population.
///
/// Carries the problem-specific representation, its objective vector, the
/// problem version it was evaluated against, and the ranking annotation of
/// the last ranking pass.
///
/// A candidate is **stale** when it has no evaluation for the current
/// problem parameters: freshly created, changed by an operator, or
/// invalidated after a problem change.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Candidate<S> {
    solution: S,
    objectives: Vec<f64>,
    feasible: bool,
    evaluated_at: Option<u64>,
    rank: usize,
    crowding: f64,
}

impl<S> Candidate<S> {
    /// Wraps a solution as a stale, unranked candidate.
    pub fn new(solution: S) -> Self {
        Self {
            solution,
            objectives: Vec::new(),
            feasible: false,
            evaluated_at: None,
            rank: usize::MAX,
            crowding: 0.0,
        }
    }

    /// The encoded solution.
    pub fn solution(&self) -> &S {
        &self.solution
    }

    /// Consumes the candidate, returning the solution.
    pub fn into_solution(self) -> S {
        self.solution
    }

    /// Objective values of the last evaluation (empty if never evaluated).
    ///
    /// Infeasible candidates report `+inf` for every objective.
    pub fn objectives(&self) -> &[f64] {
        &self.objectives
    }

    /// Whether the last evaluation succeeded.
    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    /// Problem version of the last evaluation, `None` when stale.
    pub fn evaluated_at(&self) -> Option<u64> {
        self.evaluated_at
    }

    /// Whether the candidate needs (re-)evaluation.
    pub fn is_stale(&self) -> bool {
        self.evaluated_at.is_none()
    }

    /// Pareto rank from the last ranking pass (`usize::MAX` when unranked).
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Crowding distance from the last ranking pass.
    pub fn crowding(&self) -> f64 {
        self.crowding
    }

    /// Records an evaluation outcome.
    ///
    /// A failed evaluation keeps the candidate in the population as an
    /// infeasible member whose objectives are all `+inf`, so it is dominated
    /// by every feasible member.
    pub(crate) fn set_evaluation(&mut self, outcome: Result<Vec<f64>, EvaluationError>, version: u64) {
        match outcome {
            Ok(objectives) => {
                self.objectives = objectives;
                self.feasible = true;
            }
            Err(_) => {
                let m = self.objectives.len().max(1);
                self.objectives = vec![f64::INFINITY; m];
                self.feasible = false;
            }
        }
        self.evaluated_at = Some(version);
        self.rank = usize::MAX;
        self.crowding = 0.0;
    }

    /// Marks the candidate infeasible with `m` objectives.
    pub(crate) fn set_infeasible(&mut self, m: usize, version: u64) {
        self.objectives = vec![f64::INFINITY; m];
        self.feasible = false;
        self.evaluated_at = Some(version);
        self.rank = usize::MAX;
        self.crowding = 0.0;
    }

    /// Drops the evaluation and ranking: objectives are kept for inspection
    /// but can no longer be trusted.
    pub fn invalidate(&mut self) {
        self.evaluated_at = None;
        self.rank = usize::MAX;
        self.crowding = 0.0;
    }

    pub(crate) fn set_ranking(&mut self, rank: usize, crowding: f64) {
        self.rank = rank;
        self.crowding = crowding;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_candidate_is_stale() {
        let c = Candidate::new(vec![0usize, 1, 2]);
        assert!(c.is_stale());
        assert!(!c.is_feasible());
        assert_eq!(c.rank(), usize::MAX);
        assert!(c.objectives().is_empty());
    }

    #[test]
    fn test_successful_evaluation() {
        let mut c = Candidate::new(1u8);
        c.set_evaluation(Ok(vec![1.0, 2.0]), 3);
        assert!(!c.is_stale());
        assert!(c.is_feasible());
        assert_eq!(c.evaluated_at(), Some(3));
        assert_eq!(c.objectives(), &[1.0, 2.0]);
    }

    #[test]
    fn test_failed_evaluation_marks_infeasible() {
        let mut c = Candidate::new(1u8);
        c.set_evaluation(Ok(vec![1.0, 2.0]), 1);
        c.set_evaluation(Err(EvaluationError::Failed("bad".into())), 2);
        assert!(!c.is_feasible());
        assert_eq!(c.objectives(), &[f64::INFINITY, f64::INFINITY]);
        assert_eq!(c.evaluated_at(), Some(2));
    }

    #[test]
    fn test_invalidate_resets_ranking() {
        let mut c = Candidate::new(1u8);
        c.set_evaluation(Ok(vec![1.0]), 1);
        c.set_ranking(0, 3.5);
        c.invalidate();
        assert!(c.is_stale());
        assert_eq!(c.rank(), usize::MAX);
        assert_eq!(c.crowding(), 0.0);
    }
}
