//! Problem wrapper that absorbs observed data while the search runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::RngCore;
use tracing::{debug, warn};

use super::model::ProblemModel;
use crate::channel::{EventChannel, SubscriptionId};
use crate::error::{EvaluationError, HandlerError};
use crate::observed::ObservedRecord;

/// Parameters together with the version they were committed as.
#[derive(Debug)]
pub struct ParamsSnapshot<P> {
    /// Committed parameters.
    pub params: Arc<P>,
    /// Version number, starting at 0 for the initial parameters.
    pub version: u64,
}

impl<P> Clone for ParamsSnapshot<P> {
    fn clone(&self) -> Self {
        Self {
            params: Arc::clone(&self.params),
            version: self.version,
        }
    }
}

struct ProblemState<P> {
    params: Arc<P>,
    version: u64,
    pending: bool,
}

/// A problem evaluator whose parameters change in response to observed data.
///
/// Parameters, version and pending-change flag live in one cell guarded by a
/// short critical section: writers swap an `Arc` in, readers clone it out.
/// Evaluation always happens outside the section.
///
/// - [`apply`](Self::apply) commits new parameters and raises the flag in one
///   step, so the flag is never seen without the parameters it announces.
/// - [`take_pending_change`](Self::take_pending_change) reads and clears the
///   flag in one step, so each committed change is reported at most once.
/// - Several records arriving between checks collapse into a single reported
///   change carrying the latest parameters.
pub struct DynamicProblem<M: ProblemModel> {
    model: M,
    state: Mutex<ProblemState<M::Params>>,
    writer: Mutex<()>,
    rejected: AtomicU64,
}

impl<M: ProblemModel> std::fmt::Debug for DynamicProblem<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicProblem")
            .field("model", &self.model.name())
            .field("version", &self.version())
            .field("pending", &self.has_pending_change())
            .finish()
    }
}

impl<M: ProblemModel> DynamicProblem<M> {
    /// Creates the problem with its initial parameters (version 0, no
    /// pending change).
    pub fn new(model: M, initial: M::Params) -> Self {
        Self {
            model,
            state: Mutex::new(ProblemState {
                params: Arc::new(initial),
                version: 0,
                pending: false,
            }),
            writer: Mutex::new(()),
            rejected: AtomicU64::new(0),
        }
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Number of objectives.
    pub fn number_of_objectives(&self) -> usize {
        self.model.number_of_objectives()
    }

    /// Latest committed parameters and their version.
    pub fn snapshot(&self) -> ParamsSnapshot<M::Params> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        ParamsSnapshot {
            params: Arc::clone(&state.params),
            version: state.version,
        }
    }

    /// Version of the latest committed parameters.
    pub fn version(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .version
    }

    /// Number of records that could not be applied.
    pub fn rejected_updates(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Absorbs one record: derives new parameters from the latest ones,
    /// commits them and raises the pending-change flag.
    ///
    /// Returns the new version. A rejected record leaves parameters and flag
    /// untouched.
    pub fn apply(&self, record: &M::Record) -> Result<u64, EvaluationError> {
        // Writers are serialized so no update is derived from a stale base.
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let base = self.snapshot();

        let next = match self.model.apply(&base.params, record) {
            Ok(next) => next,
            Err(err) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(problem = self.model.name(), label = err.as_label(), "{err}");
                return Err(err);
            }
        };

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.params = Arc::new(next);
        state.version += 1;
        state.pending = true;
        debug!(problem = self.model.name(), version = state.version, "parameters updated");
        Ok(state.version)
    }

    /// Evaluates `solution` against the latest committed parameters.
    pub fn evaluate(&self, solution: &M::Solution) -> Result<Vec<f64>, EvaluationError> {
        self.evaluate_versioned(solution).0
    }

    /// Like [`evaluate`](Self::evaluate), also returning the version used.
    ///
    /// Results of the wrong length or containing NaN are reported as errors.
    pub fn evaluate_versioned(
        &self,
        solution: &M::Solution,
    ) -> (Result<Vec<f64>, EvaluationError>, u64) {
        let snapshot = self.snapshot();
        let outcome = self
            .model
            .evaluate(&snapshot.params, solution)
            .and_then(|objectives| self.check_objectives(objectives));
        (outcome, snapshot.version)
    }

    fn check_objectives(&self, objectives: Vec<f64>) -> Result<Vec<f64>, EvaluationError> {
        let expected = self.model.number_of_objectives();
        if objectives.len() != expected {
            return Err(EvaluationError::WrongArity {
                expected,
                actual: objectives.len(),
            });
        }
        if let Some(index) = objectives.iter().position(|v| v.is_nan()) {
            return Err(EvaluationError::NotANumber { index });
        }
        Ok(objectives)
    }

    /// Creates a random solution for the latest parameters.
    pub fn create_solution(&self, rng: &mut dyn RngCore) -> M::Solution {
        let snapshot = self.snapshot();
        self.model.create_solution(&snapshot.params, rng)
    }

    /// Reads and clears the pending-change flag.
    ///
    /// Returns `true` at most once per committed change, however many
    /// threads race on it.
    pub fn take_pending_change(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut state.pending, false)
    }

    /// Whether a change is pending, without clearing it.
    pub fn has_pending_change(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
    }

    /// Subscribes this problem to a channel of observed records.
    ///
    /// The handler only holds a weak reference: once the problem is dropped,
    /// further records are ignored.
    pub fn subscribe_to(
        self: &Arc<Self>,
        channel: &EventChannel<ObservedRecord<M::Record>>,
    ) -> SubscriptionId {
        let weak = Arc::downgrade(self);
        channel.subscribe(move |record: &ObservedRecord<M::Record>| {
            let Some(problem) = weak.upgrade() else {
                return Ok(());
            };
            problem
                .apply(record.data())
                .map(|_| ())
                .map_err(|e| HandlerError::new(format!("record {}: {e}", record.sequence())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::Rng;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    /// Objectives are the solution scaled by each weight.
    struct Scaled;

    impl ProblemModel for Scaled {
        type Solution = f64;
        type Params = Vec<f64>;
        type Record = Vec<f64>;

        fn number_of_objectives(&self) -> usize {
            2
        }

        fn create_solution(&self, _params: &Vec<f64>, rng: &mut dyn RngCore) -> f64 {
            rng.random_range(0.0..1.0)
        }

        fn evaluate(&self, params: &Vec<f64>, x: &f64) -> Result<Vec<f64>, EvaluationError> {
            if *x < 0.0 {
                return Err(EvaluationError::Failed("negative".into()));
            }
            Ok(params.iter().map(|w| w * x).collect())
        }

        fn apply(&self, _params: &Vec<f64>, record: &Vec<f64>) -> Result<Vec<f64>, EvaluationError> {
            if record.is_empty() {
                return Err(EvaluationError::UpdateRejected("empty weights".into()));
            }
            Ok(record.clone())
        }
    }

    fn problem() -> Arc<DynamicProblem<Scaled>> {
        Arc::new(DynamicProblem::new(Scaled, vec![1.0, 2.0]))
    }

    #[test]
    fn test_initial_state() {
        let p = problem();
        assert_eq!(p.version(), 0);
        assert!(!p.take_pending_change());
        assert_eq!(p.evaluate(&2.0).unwrap(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_apply_swaps_params_and_raises_flag() {
        let p = problem();
        assert_eq!(p.apply(&vec![3.0, 3.0]).unwrap(), 1);
        assert!(p.has_pending_change());
        assert_eq!(p.evaluate(&1.0).unwrap(), vec![3.0, 3.0]);
        assert!(p.take_pending_change());
        assert!(!p.take_pending_change());
    }

    #[test]
    fn test_last_writer_wins_single_change() {
        let p = problem();
        p.apply(&vec![5.0, 5.0]).unwrap();
        p.apply(&vec![7.0, 7.0]).unwrap();
        assert!(p.take_pending_change());
        assert!(!p.take_pending_change());
        assert_eq!(p.evaluate(&1.0).unwrap(), vec![7.0, 7.0]);
        assert_eq!(p.version(), 2);
    }

    #[test]
    fn test_rejected_update_leaves_state() {
        let p = problem();
        assert!(p.apply(&vec![]).is_err());
        assert_eq!(p.version(), 0);
        assert!(!p.has_pending_change());
        assert_eq!(p.rejected_updates(), 1);
    }

    #[test]
    fn test_wrong_arity_and_nan_are_errors() {
        let p = Arc::new(DynamicProblem::new(Scaled, vec![1.0]));
        assert!(matches!(
            p.evaluate(&1.0),
            Err(EvaluationError::WrongArity { expected: 2, actual: 1 })
        ));

        let p = Arc::new(DynamicProblem::new(Scaled, vec![f64::NAN, 1.0]));
        assert!(matches!(
            p.evaluate(&1.0),
            Err(EvaluationError::NotANumber { index: 0 })
        ));
    }

    #[test]
    fn test_subscribe_applies_published_records() {
        let p = problem();
        let channel = EventChannel::new("weights");
        p.subscribe_to(&channel);

        let d = channel.publish(&ObservedRecord::new(1, vec![4.0, 4.0]));
        assert_eq!(d.delivered, 1);
        assert_eq!(p.evaluate(&1.0).unwrap(), vec![4.0, 4.0]);

        let d = channel.publish(&ObservedRecord::new(2, vec![]));
        assert_eq!(d.failed, 1);
        assert_eq!(p.version(), 1);
    }

    #[test]
    fn test_dropped_problem_ignores_records() {
        let channel = EventChannel::new("weights");
        {
            let p = problem();
            p.subscribe_to(&channel);
        }
        let d = channel.publish(&ObservedRecord::new(1, vec![4.0, 4.0]));
        assert_eq!(d, crate::channel::Delivery { delivered: 1, failed: 0 });
    }

    #[test]
    fn test_racing_takers_report_a_change_once() {
        const TAKERS: usize = 8;
        let p = problem();

        for trial in 0..200 {
            p.apply(&vec![trial as f64, 1.0]).unwrap();
            let start = Arc::new(Barrier::new(TAKERS));
            let observed = Arc::new(AtomicUsize::new(0));

            let takers: Vec<_> = (0..TAKERS)
                .map(|_| {
                    let p = Arc::clone(&p);
                    let start = Arc::clone(&start);
                    let observed = Arc::clone(&observed);
                    std::thread::spawn(move || {
                        start.wait();
                        if p.take_pending_change() {
                            observed.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for t in takers {
                t.join().unwrap();
            }

            assert_eq!(observed.load(Ordering::SeqCst), 1, "trial {trial}");
            assert!(!p.has_pending_change());
        }
    }

    #[test]
    fn test_evaluation_sees_latest_committed_version() {
        // Every committed parameter set has equal weights.
        let p = Arc::new(DynamicProblem::new(Scaled, vec![0.0, 0.0]));
        let writer = {
            let p = Arc::clone(&p);
            std::thread::spawn(move || {
                for i in 1..=500 {
                    p.apply(&vec![i as f64, i as f64]).unwrap();
                }
            })
        };

        let mut last_version = 0;
        for _ in 0..2_000 {
            let committed = p.version();
            let (outcome, used) = p.evaluate_versioned(&1.0);
            let objs = outcome.unwrap();
            // Never older than what was committed before the call.
            assert!(used >= committed);
            assert!(used >= last_version);
            // Never torn: both weights come from the same record.
            assert_eq!(objs[0], objs[1]);
            last_version = used;
        }
        writer.join().unwrap();
    }

    proptest! {
        #[test]
        fn prop_take_reports_at_most_once_per_commit(ops in prop::collection::vec(any::<bool>(), 1..100)) {
            let p = problem();
            let mut commits = 0usize;
            let mut reports = 0usize;
            let mut pending_since_last_take = false;
            for apply in ops {
                if apply {
                    p.apply(&vec![1.0, 1.0]).unwrap();
                    commits += 1;
                    pending_since_last_take = true;
                } else {
                    let took = p.take_pending_change();
                    prop_assert_eq!(took, pending_since_last_take);
                    if took {
                        reports += 1;
                    }
                    pending_since_last_take = false;
                }
            }
            prop_assert!(reports <= commits);
        }
    }
}
