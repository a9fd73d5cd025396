//! Assembly of a [`DynamicAlgorithm`] from its parts.

use std::sync::Arc;

use super::runner::{DynamicAlgorithm, Operators};
use super::DynamicConfig;
use crate::error::ConfigError;
use crate::operators::{BinaryTournament, Compares, Crosses, Mutates, RankingAndCrowding, Selects};
use crate::problem::{DynamicProblem, ProblemModel};

/// Builder for [`DynamicAlgorithm`].
///
/// Crossover and mutation are required; selection defaults to
/// [`BinaryTournament`] and the comparator to [`RankingAndCrowding`].
///
/// ```ignore
/// let algorithm = DynamicAlgorithm::builder(problem)
///     .config(DynamicConfig::fast().with_seed(42))
///     .crossover(PmxCrossover::new(0.9))
///     .mutation(SwapMutation::new(0.2))
///     .build()?;
/// ```
pub struct DynamicAlgorithmBuilder<M: ProblemModel> {
    problem: Arc<DynamicProblem<M>>,
    config: DynamicConfig,
    selection: Option<Box<dyn Selects<M::Solution>>>,
    crossover: Option<Box<dyn Crosses<M::Solution>>>,
    mutation: Option<Box<dyn Mutates<M::Solution>>>,
    comparator: Option<Box<dyn Compares<M::Solution>>>,
    channel_name: Option<String>,
}

impl<M: ProblemModel> DynamicAlgorithmBuilder<M> {
    /// Starts a builder for `problem` with the default configuration.
    pub fn new(problem: Arc<DynamicProblem<M>>) -> Self {
        Self {
            problem,
            config: DynamicConfig::default(),
            selection: None,
            crossover: None,
            mutation: None,
            comparator: None,
            channel_name: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: DynamicConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the parent selection strategy.
    pub fn selection(mut self, selection: impl Selects<M::Solution> + 'static) -> Self {
        self.selection = Some(Box::new(selection));
        self
    }

    /// Sets the crossover operator.
    pub fn crossover(mut self, crossover: impl Crosses<M::Solution> + 'static) -> Self {
        self.crossover = Some(Box::new(crossover));
        self
    }

    /// Sets the mutation operator.
    pub fn mutation(mut self, mutation: impl Mutates<M::Solution> + 'static) -> Self {
        self.mutation = Some(Box::new(mutation));
        self
    }

    /// Sets the comparator used for ordering and elitist replacement.
    pub fn comparator(mut self, comparator: impl Compares<M::Solution> + 'static) -> Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    /// Names the output channel (defaults to `"<model>/fronts"`).
    pub fn channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = Some(name.into());
        self
    }

    /// Validates the configuration and operators and builds the algorithm.
    pub fn build(self) -> Result<DynamicAlgorithm<M>, ConfigError> {
        self.config.validate()?;

        let crossover = self
            .crossover
            .ok_or_else(|| ConfigError::new("a crossover operator is required"))?;
        let mutation = self
            .mutation
            .ok_or_else(|| ConfigError::new("a mutation operator is required"))?;

        check_probability(crossover.name(), crossover.probability())?;
        check_probability(mutation.name(), mutation.probability())?;
        if crossover.arity() == 0 || crossover.offspring() == 0 {
            return Err(ConfigError::new(format!(
                "crossover `{}` must take at least one parent and produce at least one child",
                crossover.name()
            )));
        }

        let channel_name = self
            .channel_name
            .unwrap_or_else(|| format!("{}/fronts", self.problem.model().name()));

        let operators = Operators {
            selection: self
                .selection
                .unwrap_or_else(|| Box::new(BinaryTournament::default())),
            crossover,
            mutation,
            comparator: self
                .comparator
                .unwrap_or_else(|| Box::new(RankingAndCrowding)),
        };
        Ok(DynamicAlgorithm::assemble(
            self.problem,
            self.config,
            operators,
            channel_name,
        ))
    }
}

fn check_probability(operator: &str, p: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(ConfigError::new(format!(
            "probability of `{operator}` must be in [0, 1], got {p}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Variant;
    use crate::error::EvaluationError;
    use crate::operators::{PmxCrossover, SwapMutation};
    use rand::seq::SliceRandom;
    use rand::RngCore;

    struct Identity;

    impl ProblemModel for Identity {
        type Solution = Vec<usize>;
        type Params = usize;
        type Record = usize;

        fn number_of_objectives(&self) -> usize {
            2
        }

        fn create_solution(&self, n: &usize, rng: &mut dyn RngCore) -> Vec<usize> {
            let mut perm: Vec<usize> = (0..*n).collect();
            perm.shuffle(rng);
            perm
        }

        fn evaluate(&self, _n: &usize, s: &Vec<usize>) -> Result<Vec<f64>, EvaluationError> {
            Ok(vec![s[0] as f64, -(s[0] as f64)])
        }

        fn apply(&self, _n: &usize, record: &usize) -> Result<usize, EvaluationError> {
            Ok(*record)
        }
    }

    fn problem() -> Arc<DynamicProblem<Identity>> {
        Arc::new(DynamicProblem::new(Identity, 6))
    }

    #[test]
    fn test_build_with_defaults() {
        let algorithm = DynamicAlgorithmBuilder::new(problem())
            .crossover(PmxCrossover::new(0.9))
            .mutation(SwapMutation::new(0.1))
            .build()
            .unwrap();
        assert!(algorithm.observable().name().ends_with("/fronts"));
        assert_eq!(algorithm.config().population_size, 100);
    }

    #[test]
    fn test_missing_operators_are_rejected() {
        let err = DynamicAlgorithmBuilder::new(problem())
            .mutation(SwapMutation::new(0.1))
            .build()
            .unwrap_err();
        assert!(err.0.contains("crossover"));

        let err = DynamicAlgorithmBuilder::new(problem())
            .crossover(PmxCrossover::new(0.9))
            .build()
            .unwrap_err();
        assert!(err.0.contains("mutation"));
    }

    #[test]
    fn test_probability_out_of_range_is_rejected() {
        for p in [-0.1, 1.01, f64::NAN] {
            let result = DynamicAlgorithmBuilder::new(problem())
                .crossover(PmxCrossover::new(p))
                .mutation(SwapMutation::new(0.1))
                .build();
            assert!(result.is_err(), "probability {p} accepted");
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = DynamicAlgorithmBuilder::new(problem())
            .config(
                DynamicConfig::default()
                    .with_population_size(10)
                    .with_variant(Variant::MoCell { archive_size: 5 }),
            )
            .crossover(PmxCrossover::new(0.9))
            .mutation(SwapMutation::new(0.1))
            .channel_name("custom")
            .build();
        assert!(result.is_err());
    }
}
