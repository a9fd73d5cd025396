//! Continuous evolutionary loop.
//!
//! [`DynamicAlgorithm`] keeps optimizing while the problem underneath it
//! changes:
//!
//! ```text
//! Initializing ─► ┌─► Evaluating ─► Ranking ─► Selecting ─► Reproducing ─► Replacing ─┐
//!                 │                                                                   │
//!                 └──────── [Restarting] ◄── CheckingForChange ◄── publish? ◄─────────┘
//!                                                  │
//!                        budget / limit / cancel ──┴─► Terminated
//! ```
//!
//! The pending-change flag of the [`DynamicProblem`] is consulted once per
//! generation, after replacement. A detected change invalidates every member
//! and applies the configured [`RestartPolicy`]. Generation counter and
//! evaluation budget keep running across changes.
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - Nebro et al. (2009), "MOCell: A Cellular Genetic Algorithm for
//!   Multiobjective Optimization"
//! - Deb, Rao & Karthik (2007), "Dynamic Multi-objective Optimization and
//!   Decision-Making Using Modified NSGA-II"

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::archive::CrowdingArchive;
use super::builder::DynamicAlgorithmBuilder;
use super::config::grid_side;
use super::{Candidate, DynamicConfig, PublishScope, RestartPolicy, Variant};
use crate::channel::EventChannel;
use crate::error::{AlgorithmError, OperatorError};
use crate::observed::AlgorithmObservedData;
use crate::operators::{Compares, Crosses, Mutates, Selects};
use crate::problem::{DynamicProblem, ProblemModel};
use crate::ranking::{assign_ranking, dominance, non_dominated_indices, Dominance};

/// Channel on which an algorithm publishes its solution sets.
pub type FrontChannel<S> = EventChannel<Arc<AlgorithmObservedData<S>>>;

/// Step of a running generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Evaluating stale members or offspring.
    Evaluating,
    /// Non-dominated sorting and crowding.
    Ranking,
    /// Choosing parents.
    Selecting,
    /// Crossover and mutation.
    Reproducing,
    /// Elitist (NSGA-II) or cell-wise (MOCell) replacement.
    Replacing,
    /// Consulting the problem's pending-change flag.
    CheckingForChange,
    /// Applying the restart policy after a change.
    Restarting,
}

/// Lifecycle of a [`DynamicAlgorithm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmState {
    /// Built, population not created yet.
    Initializing,
    /// Inside a generation.
    Running(Phase),
    /// `run` returned.
    Terminated,
}

impl AlgorithmState {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            AlgorithmState::Initializing => "initializing",
            AlgorithmState::Running(Phase::Evaluating) => "evaluating",
            AlgorithmState::Running(Phase::Ranking) => "ranking",
            AlgorithmState::Running(Phase::Selecting) => "selecting",
            AlgorithmState::Running(Phase::Reproducing) => "reproducing",
            AlgorithmState::Running(Phase::Replacing) => "replacing",
            AlgorithmState::Running(Phase::CheckingForChange) => "checking_for_change",
            AlgorithmState::Running(Phase::Restarting) => "restarting",
            AlgorithmState::Terminated => "terminated",
        }
    }
}

/// Why a run ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Termination {
    /// The evaluation budget was spent.
    EvaluationBudget,
    /// The generation limit was reached.
    GenerationLimit,
    /// The wall-clock limit elapsed.
    TimeLimit,
    /// The cancellation token fired.
    Cancelled,
}

impl Termination {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Termination::EvaluationBudget => "evaluation_budget",
            Termination::GenerationLimit => "generation_limit",
            Termination::TimeLimit => "time_limit",
            Termination::Cancelled => "cancelled",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport<S> {
    /// Completed generations.
    pub generations: usize,
    /// Solution evaluations, including re-evaluations after changes.
    pub evaluations: u64,
    /// Evaluations that failed and produced an infeasible member.
    pub evaluation_failures: u64,
    /// Problem changes detected.
    pub changes_detected: u64,
    /// Snapshots published.
    pub published: u64,
    /// Problem version at termination.
    pub problem_version: u64,
    /// Why the run ended.
    pub termination: Termination,
    /// Wall-clock duration of this `run` call.
    pub elapsed: Duration,
    /// Final non-dominated set (the archive for MOCell).
    pub front: Vec<Candidate<S>>,
}

pub(super) struct Operators<S> {
    pub(super) selection: Box<dyn Selects<S>>,
    pub(super) crossover: Box<dyn Crosses<S>>,
    pub(super) mutation: Box<dyn Mutates<S>>,
    pub(super) comparator: Box<dyn Compares<S>>,
}

/// Multi-objective evolutionary algorithm over a [`DynamicProblem`].
///
/// Built with [`DynamicAlgorithm::builder`]. [`run`](Self::run) blocks the
/// calling thread until a terminal condition; run it on a dedicated thread
/// (the runtime uses `spawn_blocking`).
pub struct DynamicAlgorithm<M: ProblemModel> {
    problem: Arc<DynamicProblem<M>>,
    config: DynamicConfig,
    ops: Operators<M::Solution>,
    channel: FrontChannel<M::Solution>,
    rng: StdRng,
    population: Vec<Candidate<M::Solution>>,
    archive: Option<CrowdingArchive<M::Solution>>,
    grid_side: usize,
    state: AlgorithmState,
    generation: usize,
    evaluations: u64,
    evaluation_failures: u64,
    changes_detected: u64,
    published: u64,
    last_published: Option<usize>,
}

impl<M: ProblemModel> std::fmt::Debug for DynamicAlgorithm<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicAlgorithm")
            .field("problem", &self.problem)
            .field("variant", &self.config.variant)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("evaluations", &self.evaluations)
            .finish()
    }
}

impl<M: ProblemModel> DynamicAlgorithm<M> {
    /// Starts building an algorithm for `problem`.
    pub fn builder(problem: Arc<DynamicProblem<M>>) -> DynamicAlgorithmBuilder<M> {
        DynamicAlgorithmBuilder::new(problem)
    }

    pub(super) fn assemble(
        problem: Arc<DynamicProblem<M>>,
        config: DynamicConfig,
        ops: Operators<M::Solution>,
        channel_name: String,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        let archive = match config.variant {
            Variant::MoCell { archive_size } => Some(CrowdingArchive::new(archive_size)),
            Variant::Nsga2 => None,
        };
        Self {
            grid_side: grid_side(config.population_size).unwrap_or(0),
            problem,
            ops,
            channel: EventChannel::new(channel_name),
            rng,
            population: Vec::with_capacity(config.population_size * 2),
            archive,
            config,
            state: AlgorithmState::Initializing,
            generation: 0,
            evaluations: 0,
            evaluation_failures: 0,
            changes_detected: 0,
            published: 0,
            last_published: None,
        }
    }

    /// Channel on which solution sets are published. Clones share
    /// subscribers, so subscribe before calling [`run`](Self::run).
    pub fn observable(&self) -> FrontChannel<M::Solution> {
        self.channel.clone()
    }

    /// The problem being optimized.
    pub fn problem(&self) -> &Arc<DynamicProblem<M>> {
        &self.problem
    }

    /// The validated configuration.
    pub fn config(&self) -> &DynamicConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AlgorithmState {
        self.state
    }

    /// Completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Evaluations so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Current population (empty before the first `run`).
    pub fn population(&self) -> &[Candidate<M::Solution>] {
        &self.population
    }

    /// Current feasible non-dominated set (the archive for MOCell).
    pub fn front(&self) -> Vec<Candidate<M::Solution>> {
        match &self.archive {
            Some(archive) => archive.members().to_vec(),
            None => non_dominated_indices(&self.population)
                .into_iter()
                .map(|i| &self.population[i])
                .filter(|c| c.is_feasible())
                .cloned()
                .collect(),
        }
    }

    /// Runs generations until the budget, a limit or `cancel` stops it.
    ///
    /// Cancellation is checked before each generation; a generation in
    /// progress always completes. The last completed generation is
    /// published on termination if the cadence skipped it.
    ///
    /// # Errors
    ///
    /// [`AlgorithmError::Operator`] when an operator violates its contract.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<RunReport<M::Solution>, AlgorithmError> {
        let started = Instant::now();
        info!(
            problem = self.problem.model().name(),
            variant = ?self.config.variant,
            population = self.config.population_size,
            max_evaluations = self.config.max_evaluations,
            "algorithm starting"
        );

        if self.population.is_empty() {
            self.initialize();
        }

        let termination = loop {
            if let Some(reason) = self.should_stop(started, cancel) {
                break reason;
            }

            let step = match self.config.variant {
                Variant::Nsga2 => self.nsga2_generation(),
                Variant::MoCell { .. } => self.mocell_generation(),
            };
            if let Err(err) = step {
                let err = AlgorithmError::operator(err, self.generation + 1);
                error!(generation = self.generation + 1, label = err.as_label(), "{err}");
                self.state = AlgorithmState::Terminated;
                return Err(err);
            }
            self.generation += 1;

            self.check_for_change();
            if self.generation % self.config.publish_every == 0 {
                self.publish();
            }
            debug!(
                generation = self.generation,
                evaluations = self.evaluations,
                version = self.problem.version(),
                "generation completed"
            );
            self.throttle(cancel);
        };

        if self.generation > 0 && self.last_published != Some(self.generation) {
            self.publish();
        }
        self.state = AlgorithmState::Terminated;
        info!(
            generations = self.generation,
            evaluations = self.evaluations,
            changes = self.changes_detected,
            termination = termination.as_label(),
            "algorithm terminated"
        );

        Ok(RunReport {
            generations: self.generation,
            evaluations: self.evaluations,
            evaluation_failures: self.evaluation_failures,
            changes_detected: self.changes_detected,
            published: self.published,
            problem_version: self.problem.version(),
            termination,
            elapsed: started.elapsed(),
            front: self.front(),
        })
    }

    fn enter(&mut self, phase: Phase) {
        self.state = AlgorithmState::Running(phase);
        trace!(generation = self.generation + 1, phase = self.state.as_label(), "phase");
    }

    fn should_stop(&self, started: Instant, cancel: &CancellationToken) -> Option<Termination> {
        if cancel.is_cancelled() {
            Some(Termination::Cancelled)
        } else if self.evaluations >= self.config.max_evaluations {
            Some(Termination::EvaluationBudget)
        } else if self.config.max_generations.is_some_and(|g| self.generation >= g) {
            Some(Termination::GenerationLimit)
        } else if self
            .config
            .time_limit_ms
            .is_some_and(|ms| started.elapsed() >= Duration::from_millis(ms))
        {
            Some(Termination::TimeLimit)
        } else {
            None
        }
    }

    fn throttle(&self, cancel: &CancellationToken) {
        let Some(ms) = self.config.throttle_ms else {
            return;
        };
        let deadline = Instant::now() + Duration::from_millis(ms);
        while !cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }
    }

    fn random_member(&mut self) -> Candidate<M::Solution> {
        Candidate::new(self.problem.create_solution(&mut self.rng))
    }

    fn initialize(&mut self) {
        self.population = (0..self.config.population_size)
            .map(|_| Candidate::new(self.problem.create_solution(&mut self.rng)))
            .collect();
        self.evaluate_population();
        self.rank_population();
        self.refill_archive();
        debug!(
            population = self.population.len(),
            evaluations = self.evaluations,
            "population initialized"
        );
    }

    fn evaluate_population(&mut self) {
        let (evaluated, failed) = evaluate_stale(&self.problem, &mut self.population, self.config.parallel);
        self.evaluations += evaluated;
        self.evaluation_failures += failed;
    }

    fn rank_population(&mut self) {
        assign_ranking(&mut self.population);
        let comparator = &self.ops.comparator;
        self.population.sort_by(|a, b| comparator.compare(a, b));
    }

    fn refill_archive(&mut self) {
        if let Some(archive) = self.archive.as_mut() {
            archive.clear();
            for member in &self.population {
                archive.offer(member);
            }
        }
    }

    fn select_from(
        selection: &dyn Selects<M::Solution>,
        pool: &[Candidate<M::Solution>],
        rng: &mut StdRng,
    ) -> Result<usize, OperatorError> {
        let idx = selection.select(pool, rng)?;
        if idx >= pool.len() {
            return Err(OperatorError::new(
                selection.name(),
                format!("selected index {idx} out of range for {} candidates", pool.len()),
            ));
        }
        Ok(idx)
    }

    fn nsga2_generation(&mut self) -> Result<(), OperatorError> {
        let n = self.config.population_size;

        self.enter(Phase::Evaluating);
        self.evaluate_population();

        self.enter(Phase::Ranking);
        self.rank_population();

        self.enter(Phase::Selecting);
        let arity = self.ops.crossover.arity();
        let matings = n.div_ceil(self.ops.crossover.offspring());
        let mut pool = Vec::with_capacity(matings * arity);
        for _ in 0..matings * arity {
            pool.push(Self::select_from(
                self.ops.selection.as_ref(),
                &self.population,
                &mut self.rng,
            )?);
        }

        self.enter(Phase::Reproducing);
        let mut offspring = Vec::with_capacity(matings * self.ops.crossover.offspring());
        for mating in pool.chunks(arity) {
            let parents: Vec<&M::Solution> =
                mating.iter().map(|&i| self.population[i].solution()).collect();
            let children = variation(
                self.ops.crossover.as_ref(),
                self.ops.mutation.as_ref(),
                &parents,
                &mut self.rng,
            )?;
            offspring.extend(children.into_iter().map(Candidate::new));
        }
        offspring.truncate(n);

        self.enter(Phase::Evaluating);
        let (evaluated, failed) = evaluate_stale(&self.problem, &mut offspring, self.config.parallel);
        self.evaluations += evaluated;
        self.evaluation_failures += failed;

        self.enter(Phase::Replacing);
        let mut combined = std::mem::take(&mut self.population);
        combined.extend(offspring);
        assign_ranking(&mut combined);
        let comparator = &self.ops.comparator;
        combined.sort_by(|a, b| comparator.compare(a, b));
        combined.truncate(n);
        self.population = combined;
        Ok(())
    }

    fn mocell_generation(&mut self) -> Result<(), OperatorError> {
        self.enter(Phase::Evaluating);
        self.evaluate_population();

        self.enter(Phase::Ranking);
        let mut archive_pool: Vec<Candidate<M::Solution>> = self
            .archive
            .as_ref()
            .map(|a| a.members().to_vec())
            .unwrap_or_default();
        assign_ranking(&mut archive_pool);

        for cell in 0..self.population.len() {
            self.enter(Phase::Selecting);
            let hood = c9_neighbourhood(cell, self.grid_side);
            let mut local: Vec<Candidate<M::Solution>> =
                hood.iter().map(|&i| self.population[i].clone()).collect();
            assign_ranking(&mut local);

            let selection = self.ops.selection.as_ref();
            let first = Self::select_from(selection, &local, &mut self.rng)?;
            let mut parents: Vec<&M::Solution> = vec![local[first].solution()];
            for _ in 1..self.ops.crossover.arity() {
                let pool = if archive_pool.is_empty() {
                    &local
                } else {
                    &archive_pool
                };
                let idx = Self::select_from(selection, pool, &mut self.rng)?;
                parents.push(pool[idx].solution());
            }

            self.enter(Phase::Reproducing);
            let mut children = variation(
                self.ops.crossover.as_ref(),
                self.ops.mutation.as_ref(),
                &parents,
                &mut self.rng,
            )?;
            drop(parents);
            let mut child = [Candidate::new(children.swap_remove(0))];
            let (evaluated, failed) = evaluate_stale(&self.problem, &mut child, false);
            self.evaluations += evaluated;
            self.evaluation_failures += failed;
            let [child] = child;

            self.enter(Phase::Replacing);
            let target = mocell_replacement(&self.population, &hood, &child, self.ops.comparator.as_ref());
            if let Some(target) = target {
                if let Some(archive) = self.archive.as_mut() {
                    archive.offer(&child);
                }
                self.population[target] = child;
            }
        }

        assign_ranking(&mut self.population);
        Ok(())
    }

    fn check_for_change(&mut self) {
        self.enter(Phase::CheckingForChange);
        if !self.problem.take_pending_change() {
            return;
        }
        self.changes_detected += 1;

        self.enter(Phase::Restarting);
        info!(
            generation = self.generation,
            version = self.problem.version(),
            policy = ?self.config.restart,
            "problem change detected"
        );
        for member in &mut self.population {
            member.invalidate();
        }

        let n = self.population.len();
        match self.config.restart {
            RestartPolicy::FullReevaluate => {}
            RestartPolicy::FullRestart => {
                self.population = (0..n)
                    .map(|_| Candidate::new(self.problem.create_solution(&mut self.rng)))
                    .collect();
            }
            RestartPolicy::Partial { fraction } => {
                let k = ((n as f64 * fraction).round() as usize).clamp(1, n);
                let mut doomed = rand::seq::index::sample(&mut self.rng, n, k).into_vec();
                doomed.sort_unstable();
                for &i in doomed.iter().rev() {
                    self.population.remove(i);
                }
                for _ in 0..k {
                    let member = self.random_member();
                    self.population.push(member);
                }
            }
        }

        self.evaluate_population();
        self.rank_population();
        self.refill_archive();
    }

    fn publish(&mut self) {
        let solutions = match self.config.publish_scope {
            PublishScope::Front => self.front(),
            PublishScope::Population => self.population.clone(),
        };
        // Oldest parameters any published objective was computed against.
        let version = solutions
            .iter()
            .filter_map(|c| c.evaluated_at())
            .min()
            .unwrap_or_else(|| self.problem.version());
        let data = Arc::new(AlgorithmObservedData::new(
            self.generation,
            self.evaluations,
            version,
            self.changes_detected,
            solutions,
        ));

        let delivery = self.channel.publish(&data);
        self.published += 1;
        self.last_published = Some(self.generation);
        trace!(
            generation = self.generation,
            solutions = data.len(),
            delivered = delivery.delivered,
            failed = delivery.failed,
            "published"
        );
    }
}

/// Evaluates every stale member. Returns `(evaluated, failed)`.
fn evaluate_stale<M: ProblemModel>(
    problem: &DynamicProblem<M>,
    members: &mut [Candidate<M::Solution>],
    parallel: bool,
) -> (u64, u64) {
    let m = problem.number_of_objectives();
    let sum = |a: (u64, u64), b: (u64, u64)| (a.0 + b.0, a.1 + b.1);

    #[cfg(feature = "parallel")]
    if parallel {
        use rayon::prelude::*;
        return members
            .par_iter_mut()
            .filter(|c| c.is_stale())
            .map(|member| evaluate_one(problem, member, m))
            .reduce(|| (0, 0), sum);
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    members
        .iter_mut()
        .filter(|c| c.is_stale())
        .map(|member| evaluate_one(problem, member, m))
        .fold((0, 0), sum)
}

/// Evaluates one member; returns `(evaluations, failures)`.
fn evaluate_one<M: ProblemModel>(
    problem: &DynamicProblem<M>,
    member: &mut Candidate<M::Solution>,
    m: usize,
) -> (u64, u64) {
    let (outcome, version) = problem.evaluate_versioned(member.solution());
    match outcome {
        Ok(objectives) => {
            member.set_evaluation(Ok(objectives), version);
            (1, 0)
        }
        Err(err) => {
            debug!(version, label = err.as_label(), "{err}");
            member.set_infeasible(m, version);
            (1, 1)
        }
    }
}

/// Crossover with its probability, then mutation of each child with its
/// probability. Without crossover the parents are copied.
fn variation<S: Clone>(
    crossover: &dyn Crosses<S>,
    mutation: &dyn Mutates<S>,
    parents: &[&S],
    rng: &mut StdRng,
) -> Result<Vec<S>, OperatorError> {
    let expected = crossover.offspring();
    let mut children = if rng.random_bool(crossover.probability()) {
        let children = crossover.cross(parents, rng)?;
        if children.len() != expected {
            return Err(OperatorError::new(
                crossover.name(),
                format!("returned {} offspring, declared {expected}", children.len()),
            ));
        }
        children
    } else {
        parents
            .iter()
            .cycle()
            .take(expected)
            .map(|p| (*p).clone())
            .collect()
    };
    for child in &mut children {
        if rng.random_bool(mutation.probability()) {
            mutation.mutate(child, rng)?;
        }
    }
    Ok(children)
}

/// Population index a MOCell child is written to, if any.
///
/// A child dominating the centre cell replaces it; a dominated child is
/// discarded. Otherwise the child is ranked together with the neighbourhood
/// and takes the place of the worst neighbour, unless it is the worst.
fn mocell_replacement<S: Clone>(
    population: &[Candidate<S>],
    hood: &[usize; 9],
    child: &Candidate<S>,
    comparator: &dyn Compares<S>,
) -> Option<usize> {
    let cell = hood[4];
    match dominance(population[cell].objectives(), child.objectives()) {
        Dominance::Right => Some(cell),
        Dominance::Left => None,
        Dominance::Neither => {
            let mut local: Vec<Candidate<S>> = hood.iter().map(|&i| population[i].clone()).collect();
            local.push(child.clone());
            assign_ranking(&mut local);
            let (worst, _) = local
                .iter()
                .enumerate()
                .max_by(|a, b| comparator.compare(a.1, b.1))?;
            // Index 9 is the child itself.
            hood.get(worst).copied()
        }
    }
}

/// Moore neighbourhood (the cell and its 8 neighbours) on a toroidal
/// `side × side` grid.
fn c9_neighbourhood(cell: usize, side: usize) -> [usize; 9] {
    let (row, col) = (cell / side, cell % side);
    let mut hood = [cell; 9];
    let mut k = 0;
    for dr in [side - 1, 0, 1] {
        for dc in [side - 1, 0, 1] {
            hood[k] = ((row + dr) % side) * side + (col + dc) % side;
            k += 1;
        }
    }
    hood
}
