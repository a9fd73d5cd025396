//! Dynamic algorithm configuration.
//!
//! [`DynamicConfig`] holds every parameter of the continuous evolutionary
//! loop. It is validated once when the algorithm is built and is immutable
//! afterwards.

use crate::error::ConfigError;

/// What the algorithm does with its population after a problem change.
///
/// In every case all members are first invalidated (their objectives were
/// computed against parameters that no longer exist).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RestartPolicy {
    /// Keep every representation and re-evaluate it.
    #[default]
    FullReevaluate,
    /// Discard the population and create a new random one.
    FullRestart,
    /// Replace a random `fraction` of the population with new random
    /// members and re-evaluate the rest.
    Partial {
        /// Share of members replaced, in `(0, 1]`.
        fraction: f64,
    },
}

/// Which candidates a published snapshot carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum PublishScope {
    /// Feasible non-dominated members (the archive for MOCell).
    #[default]
    Front,
    /// The whole population.
    Population,
}

/// Evolutionary scheme driving each generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Variant {
    /// Generational NSGA-II: offspring pool, elitist truncation by rank and
    /// crowding distance.
    #[default]
    Nsga2,
    /// Cellular MOCell: the population sits on a square toroidal grid and
    /// each cell mates within its C9 neighbourhood; an external archive keeps
    /// the non-dominated set.
    MoCell {
        /// Archive capacity.
        archive_size: usize,
    },
}

/// Configuration for the dynamic multi-objective algorithm.
///
/// # Defaults
///
/// ```
/// use u_dynopt::algorithm::{DynamicConfig, RestartPolicy};
///
/// let config = DynamicConfig::default();
/// assert_eq!(config.population_size, 100);
/// assert_eq!(config.restart, RestartPolicy::FullReevaluate);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_dynopt::algorithm::{DynamicConfig, RestartPolicy, Variant};
///
/// let config = DynamicConfig::default()
///     .with_population_size(64)
///     .with_restart(RestartPolicy::Partial { fraction: 0.25 })
///     .with_variant(Variant::MoCell { archive_size: 50 })
///     .with_publish_every(5)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DynamicConfig {
    /// Number of individuals. Constant for the whole run.
    ///
    /// MOCell requires a perfect square of at least 9.
    pub population_size: usize,

    /// Evaluation budget. Changes never reset it.
    pub max_evaluations: u64,

    /// Optional generation limit. Changes never reset the counter.
    pub max_generations: Option<usize>,

    /// Optional wall-clock limit in milliseconds, checked before each
    /// generation.
    pub time_limit_ms: Option<u64>,

    /// Reaction to a detected problem change.
    pub restart: RestartPolicy,

    /// Publish every `publish_every` generations (1 = every generation).
    pub publish_every: usize,

    /// Content of published snapshots.
    pub publish_scope: PublishScope,

    /// Evolutionary scheme.
    pub variant: Variant,

    /// Random seed. `None` draws one from the OS.
    pub seed: Option<u64>,

    /// Optional pause between generations in milliseconds.
    ///
    /// Leaves CPU to the sources and consumers when the algorithm shares a
    /// small machine with them.
    pub throttle_ms: Option<u64>,

    /// Evaluate a generation's solutions in parallel with rayon. Requires
    /// the `parallel` feature. Results do not depend on it.
    pub parallel: bool,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_evaluations: 100_000,
            max_generations: None,
            time_limit_ms: None,
            restart: RestartPolicy::default(),
            publish_every: 1,
            publish_scope: PublishScope::default(),
            variant: Variant::default(),
            seed: None,
            throttle_ms: None,
            parallel: false,
        }
    }
}

impl DynamicConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the evaluation budget.
    pub fn with_max_evaluations(mut self, n: u64) -> Self {
        self.max_evaluations = n;
        self
    }

    /// Sets the generation limit.
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = Some(n);
        self
    }

    /// Sets the wall-clock limit in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Sets the restart policy.
    pub fn with_restart(mut self, policy: RestartPolicy) -> Self {
        self.restart = policy;
        self
    }

    /// Sets the publish cadence in generations.
    pub fn with_publish_every(mut self, k: usize) -> Self {
        self.publish_every = k;
        self
    }

    /// Sets what published snapshots contain.
    pub fn with_publish_scope(mut self, scope: PublishScope) -> Self {
        self.publish_scope = scope;
        self
    }

    /// Sets the evolutionary scheme.
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the pause between generations in milliseconds.
    pub fn with_throttle_ms(mut self, ms: u64) -> Self {
        self.throttle_ms = Some(ms);
        self
    }

    /// Enables or disables parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Preset for fast reaction: small population, short budget.
    ///
    /// - Population: 36, Evaluations: 20,000
    pub fn fast() -> Self {
        Self {
            population_size: 36,
            max_evaluations: 20_000,
            ..Self::default()
        }
    }

    /// Preset for a balanced run.
    ///
    /// - Population: 100, Evaluations: 250,000, publishing every 5 generations
    pub fn balanced() -> Self {
        Self {
            population_size: 100,
            max_evaluations: 250_000,
            publish_every: 5,
            ..Self::default()
        }
    }

    /// Preset for quality: large population and budget, partial restarts keep
    /// most of the accumulated structure across changes.
    ///
    /// - Population: 196, Evaluations: 1,000,000, publishing every 10 generations
    /// - Restart: replace 20% of the population
    pub fn quality() -> Self {
        Self {
            population_size: 196,
            max_evaluations: 1_000_000,
            publish_every: 10,
            restart: RestartPolicy::Partial { fraction: 0.2 },
            ..Self::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::new("population_size must be at least 2"));
        }
        if self.max_evaluations == 0 {
            return Err(ConfigError::new("max_evaluations must be at least 1"));
        }
        if self.max_generations == Some(0) {
            return Err(ConfigError::new("max_generations must be positive or None"));
        }
        if self.time_limit_ms == Some(0) {
            return Err(ConfigError::new("time_limit_ms must be positive or None"));
        }
        if self.publish_every == 0 {
            return Err(ConfigError::new("publish_every must be at least 1"));
        }
        if self.parallel && !cfg!(feature = "parallel") {
            return Err(ConfigError::new("parallel evaluation requires the `parallel` feature"));
        }
        if let RestartPolicy::Partial { fraction } = self.restart {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ConfigError::new(format!(
                    "partial restart fraction must be in (0, 1], got {fraction}"
                )));
            }
        }
        if let Variant::MoCell { archive_size } = self.variant {
            if archive_size == 0 {
                return Err(ConfigError::new("MOCell archive_size must be at least 1"));
            }
            if grid_side(self.population_size).is_none() {
                return Err(ConfigError::new(format!(
                    "MOCell needs a square population of at least 9, got {}",
                    self.population_size
                )));
            }
        }
        Ok(())
    }
}

/// Side of the square grid holding `n` cells, if `n` is a perfect square ≥ 9.
///
/// On a smaller grid the C9 neighbourhood would visit some cells twice.
pub(crate) fn grid_side(n: usize) -> Option<usize> {
    let side = (n as f64).sqrt().round() as usize;
    (side >= 3 && side * side == n).then_some(side)
}
