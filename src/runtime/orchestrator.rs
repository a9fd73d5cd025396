//! Wiring and lifecycle of sources, problem, algorithm and consumers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{error, info, warn};

use super::RuntimeConfig;
use crate::algorithm::{DynamicAlgorithm, FrontChannel, RunReport};
use crate::channel::EventChannel;
use crate::consumer::{Consume, ConsumerSet, ConsumerStats};
use crate::error::{panic_message, AlgorithmError, LifecycleError, RuntimeError};
use crate::observed::ObservedRecord;
use crate::problem::{DynamicProblem, ProblemModel};
use crate::source::{spawn_source, SourceConfig, SourceReport, StreamingSource};

type SourceStarter = Box<dyn FnOnce(CancellationToken) -> RunningSource + Send>;

struct RunningSource {
    name: String,
    handle: JoinHandle<SourceReport>,
}

/// Everything a stopped runtime produced.
#[derive(Debug, Clone)]
pub struct RunOutcome<S> {
    /// Algorithm summary, including the final front.
    pub report: RunReport<S>,
    /// One report per source, in registration order.
    pub sources: Vec<SourceReport>,
    /// One entry per consumer, in registration order.
    pub consumers: Vec<ConsumerStats>,
}

/// Assembles a dynamic optimization run.
///
/// Sources and consumers are registered first; nothing runs until
/// [`start`](Self::start), which consumes the runtime. The problem is the
/// one the algorithm was built over.
///
/// # Lifecycle
///
/// 1. **Assembly**: `add_source` creates one record channel per source and
///    subscribes the problem to it; `add_consumer` queues a consumer
/// 2. **Start**: consumers are attached to the algorithm channel, sources
///    are spawned, then the algorithm starts on a blocking thread
/// 3. **Stop**: [`RunningRuntime::shutdown`] or [`RunningRuntime::wait`]
///    stops sources, then the algorithm, then drains consumers
pub struct DynamicRuntime<M: ProblemModel> {
    problem: Arc<DynamicProblem<M>>,
    algorithm: DynamicAlgorithm<M>,
    config: RuntimeConfig,
    sources: Vec<SourceStarter>,
    consumers: Vec<Arc<dyn Consume<M::Solution>>>,
}

impl<M: ProblemModel> DynamicRuntime<M> {
    /// Creates a runtime around a built algorithm.
    pub fn new(algorithm: DynamicAlgorithm<M>, config: RuntimeConfig) -> Self {
        Self {
            problem: Arc::clone(algorithm.problem()),
            algorithm,
            config,
            sources: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// The problem shared by the sources and the algorithm.
    pub fn problem(&self) -> &Arc<DynamicProblem<M>> {
        &self.problem
    }

    /// The algorithm, before it starts.
    pub fn algorithm(&self) -> &DynamicAlgorithm<M> {
        &self.algorithm
    }

    /// Registers a source feeding the problem.
    ///
    /// Returns the source's record channel. Further subscribers may be
    /// attached to it, and records may be published on it directly.
    pub fn add_source<S>(&mut self, source: S, config: SourceConfig) -> EventChannel<ObservedRecord<M::Record>>
    where
        S: StreamingSource<Data = M::Record>,
    {
        let name = source.name().to_string();
        let channel = EventChannel::new(format!("{name}/records"));
        self.problem.subscribe_to(&channel);

        let out = channel.clone();
        self.sources.push(Box::new(move |cancel| RunningSource {
            name,
            handle: spawn_source(source, out, config, cancel),
        }));
        channel
    }

    /// Registers a consumer of the published solution sets.
    pub fn add_consumer(&mut self, consumer: Arc<dyn Consume<M::Solution>>) -> &mut Self {
        self.consumers.push(consumer);
        self
    }

    /// Starts every component.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NoRuntime`] when called outside a tokio runtime.
    pub fn start(self) -> Result<RunningRuntime<M>, LifecycleError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;
        info!(
            problem = self.problem.model().name(),
            sources = self.sources.len(),
            consumers = self.consumers.len(),
            "starting dynamic runtime"
        );

        let root = CancellationToken::new();
        let source_cancel = root.child_token();
        let algorithm_cancel = root.child_token();

        let observable = self.algorithm.observable();
        let consumers = ConsumerSet::new(self.consumers);
        consumers.attach(&observable);

        let sources: Vec<RunningSource> = self
            .sources
            .into_iter()
            .map(|start| start(source_cancel.clone()))
            .collect();

        let mut algorithm = self.algorithm;
        let token = algorithm_cancel.clone();
        let algorithm = runtime.spawn_blocking(move || algorithm.run(&token));

        info!("dynamic runtime started");
        Ok(RunningRuntime {
            problem: self.problem,
            observable,
            config: self.config,
            sources,
            algorithm,
            consumers,
            source_cancel,
            algorithm_cancel,
            _guard: root.drop_guard(),
        })
    }
}

/// Handle to a started runtime.
///
/// Dropping it without calling [`shutdown`](Self::shutdown) or
/// [`wait`](Self::wait) cancels every component without waiting for them.
pub struct RunningRuntime<M: ProblemModel> {
    problem: Arc<DynamicProblem<M>>,
    observable: FrontChannel<M::Solution>,
    config: RuntimeConfig,
    sources: Vec<RunningSource>,
    algorithm: JoinHandle<Result<RunReport<M::Solution>, AlgorithmError>>,
    consumers: ConsumerSet<M::Solution>,
    source_cancel: CancellationToken,
    algorithm_cancel: CancellationToken,
    _guard: DropGuard,
}

impl<M: ProblemModel> RunningRuntime<M> {
    /// The shared problem.
    pub fn problem(&self) -> &Arc<DynamicProblem<M>> {
        &self.problem
    }

    /// The algorithm's output channel.
    pub fn observable(&self) -> &FrontChannel<M::Solution> {
        &self.observable
    }

    /// Live consumer counters.
    pub fn consumer_stats(&self) -> Vec<ConsumerStats> {
        self.consumers.stats()
    }

    /// Whether the algorithm has reached a terminal condition.
    pub fn is_finished(&self) -> bool {
        self.algorithm.is_finished()
    }

    /// Token that stops the algorithm when cancelled.
    ///
    /// Cancelling it ends the run early; [`wait`](Self::wait) then returns
    /// with [`Termination::Cancelled`](crate::algorithm::Termination).
    pub fn algorithm_token(&self) -> CancellationToken {
        self.algorithm_cancel.clone()
    }

    /// Stops the run now.
    ///
    /// Sources are stopped first so no record arrives mid-teardown, then
    /// the algorithm is cancelled and allowed to finish its current
    /// generation, then consumers drain what was already published. Each
    /// stage is bounded by its [`RuntimeConfig`] window; the remaining
    /// stages still run after an overrun, and the first failure is returned.
    pub async fn shutdown(self) -> Result<RunOutcome<M::Solution>, RuntimeError> {
        info!("shutting down dynamic runtime");
        let mut faults: Vec<RuntimeError> = Vec::new();

        let sources = stop_sources(
            self.sources,
            &self.source_cancel,
            self.config.source_stop_timeout,
            &mut faults,
        )
        .await;

        self.algorithm_cancel.cancel();
        let report = join_algorithm(self.algorithm, Some(self.config.algorithm_stop_timeout)).await;

        let consumers = drain_consumers(self.consumers, self.config.consumer_drain_timeout, &mut faults).await;
        finish(report, sources, consumers, faults)
    }

    /// Waits for the algorithm to reach a terminal condition, then stops
    /// sources and drains consumers.
    pub async fn wait(self) -> Result<RunOutcome<M::Solution>, RuntimeError> {
        let report = join_algorithm(self.algorithm, None).await;
        info!("algorithm finished, stopping dynamic runtime");
        let mut faults: Vec<RuntimeError> = Vec::new();

        let sources = stop_sources(
            self.sources,
            &self.source_cancel,
            self.config.source_stop_timeout,
            &mut faults,
        )
        .await;
        let consumers = drain_consumers(self.consumers, self.config.consumer_drain_timeout, &mut faults).await;
        finish(report, sources, consumers, faults)
    }
}

async fn stop_sources(
    sources: Vec<RunningSource>,
    cancel: &CancellationToken,
    window: Duration,
    faults: &mut Vec<RuntimeError>,
) -> Vec<SourceReport> {
    cancel.cancel();
    let mut reports = Vec::with_capacity(sources.len());
    for RunningSource { name, mut handle } in sources {
        match tokio::time::timeout(window, &mut handle).await {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(join)) => {
                error!(source = %name, "source task failed: {join}");
                reports.push(SourceReport {
                    name,
                    panicked: join.is_panic(),
                    ..SourceReport::default()
                });
            }
            Err(_) => {
                handle.abort();
                warn!(source = %name, timeout = ?window, "source did not stop in time");
                faults.push(
                    LifecycleError::SourceStopTimeout {
                        name: name.clone(),
                        timeout: window,
                    }
                    .into(),
                );
                reports.push(SourceReport {
                    name,
                    ..SourceReport::default()
                });
            }
        }
    }
    reports
}

async fn join_algorithm<S>(
    handle: JoinHandle<Result<RunReport<S>, AlgorithmError>>,
    window: Option<Duration>,
) -> Result<RunReport<S>, RuntimeError> {
    let joined = match window {
        Some(window) => match tokio::time::timeout(window, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(timeout = ?window, "algorithm did not stop in time");
                return Err(LifecycleError::AlgorithmStopTimeout { timeout: window }.into());
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(Ok(report)) => {
            info!(
                termination = report.termination.as_label(),
                generations = report.generations,
                evaluations = report.evaluations,
                "algorithm stopped"
            );
            Ok(report)
        }
        Ok(Err(err)) => {
            error!(kind = err.as_label(), "algorithm failed: {err}");
            Err(err.into())
        }
        Err(join) => {
            let message = if join.is_panic() {
                panic_message(&*join.into_panic())
            } else {
                join.to_string()
            };
            error!("algorithm thread panicked: {message}");
            Err(LifecycleError::AlgorithmPanicked(message).into())
        }
    }
}

async fn drain_consumers<S: Send + Sync + 'static>(
    consumers: ConsumerSet<S>,
    window: Duration,
    faults: &mut Vec<RuntimeError>,
) -> Vec<ConsumerStats> {
    consumers.detach();
    let snapshot = consumers.stats();
    match tokio::time::timeout(window, consumers.shutdown()).await {
        Ok(stats) => stats,
        Err(_) => {
            warn!(timeout = ?window, "consumers did not drain in time");
            faults.push(LifecycleError::ConsumerDrainTimeout { timeout: window }.into());
            snapshot
        }
    }
}

fn finish<S>(
    report: Result<RunReport<S>, RuntimeError>,
    sources: Vec<SourceReport>,
    consumers: Vec<ConsumerStats>,
    faults: Vec<RuntimeError>,
) -> Result<RunOutcome<S>, RuntimeError> {
    let mut faults = faults.into_iter();
    // Source faults happen first in teardown order.
    let report = match (report, faults.next()) {
        (_, Some(first)) => return Err(first),
        (report, None) => report?,
    };
    info!(
        sources = sources.len(),
        consumers = consumers.len(),
        "dynamic runtime stopped"
    );
    Ok(RunOutcome {
        report,
        sources,
        consumers,
    })
}
