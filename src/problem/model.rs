//! Problem-specific contract.
//!
//! [`ProblemModel`] is the only trait a user implements to plug a problem
//! into the runtime. It is **static**: it never stores the changing data
//! itself. The changing data lives in `Params`, owned by
//! [`DynamicProblem`](super::DynamicProblem), which hands the model a
//! consistent snapshot on every call.

use rand::RngCore;

use crate::error::EvaluationError;

/// A multi-objective problem whose parameters are replaced over time.
///
/// All objectives are minimized.
///
/// # Implementing
///
/// ```ignore
/// struct Knapsack;
///
/// impl ProblemModel for Knapsack {
///     type Solution = Vec<bool>;
///     type Params = Vec<(f64, f64)>;   // (weight, value) per item
///     type Record = (usize, f64, f64);  // item, new weight, new value
///
///     fn number_of_objectives(&self) -> usize { 2 }
///     fn create_solution(&self, p: &Self::Params, rng: &mut dyn RngCore) -> Vec<bool> { ... }
///     fn evaluate(&self, p: &Self::Params, s: &Vec<bool>) -> Result<Vec<f64>, EvaluationError> { ... }
///     fn apply(&self, p: &Self::Params, r: &Self::Record) -> Result<Self::Params, EvaluationError> { ... }
/// }
/// ```
pub trait ProblemModel: Send + Sync + 'static {
    /// Encoded candidate solution.
    type Solution: Clone + Send + Sync + 'static;

    /// Evaluation parameters derived from observed data.
    type Params: Send + Sync + 'static;

    /// Payload of the observed records this problem absorbs.
    type Record: Send + Sync + 'static;

    /// Number of objectives returned by [`evaluate`](Self::evaluate).
    fn number_of_objectives(&self) -> usize;

    /// Creates a random valid solution.
    fn create_solution(&self, params: &Self::Params, rng: &mut dyn RngCore) -> Self::Solution;

    /// Computes the objective vector of `solution` under `params`.
    fn evaluate(
        &self,
        params: &Self::Params,
        solution: &Self::Solution,
    ) -> Result<Vec<f64>, EvaluationError>;

    /// Derives the parameters that result from absorbing `record`.
    ///
    /// Must not mutate `params`: the current snapshot may be in use by a
    /// concurrent evaluation.
    fn apply(
        &self,
        params: &Self::Params,
        record: &Self::Record,
    ) -> Result<Self::Params, EvaluationError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
