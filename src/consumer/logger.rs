//! Logging consumer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::Consume;
use crate::error::ConsumerError;
use crate::observed::AlgorithmObservedData;

/// Logs one `info` line per received set (generation, size, best value per
/// objective) and each solution's objectives at `debug`.
#[derive(Debug, Clone, Default)]
pub struct FrontLogger {
    name: Option<String>,
}

impl FrontLogger {
    /// Creates a logger named `front-logger`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a logger with a custom name, used as the `consumer` field.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Minimum of each objective over the feasible solutions.
fn ideal_point<S>(data: &AlgorithmObservedData<S>) -> Vec<f64> {
    let mut ideal: Vec<f64> = Vec::new();
    for candidate in data.solutions().iter().filter(|c| c.is_feasible()) {
        let objs = candidate.objectives();
        if ideal.is_empty() {
            ideal = objs.to_vec();
        } else {
            for (best, &v) in ideal.iter_mut().zip(objs) {
                *best = best.min(v);
            }
        }
    }
    ideal
}

#[async_trait]
impl<S: Send + Sync + 'static> Consume<S> for FrontLogger {
    async fn on_data(&self, data: Arc<AlgorithmObservedData<S>>) -> Result<(), ConsumerError> {
        let consumer = Consume::<S>::name(self);
        info!(
            consumer,
            generation = data.generation(),
            evaluations = data.evaluations(),
            version = data.problem_version(),
            changes = data.changes_detected(),
            solutions = data.len(),
            ideal = ?ideal_point(&data),
            "front"
        );
        for (i, objectives) in data.objectives().enumerate() {
            debug!(consumer, generation = data.generation(), index = i, ?objectives, "solution");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("front-logger")
    }
}
