//! Error taxonomy for the dynamic optimization runtime.
//!
//! Faults are grouped by the unit that recovers from them:
//!
//! - [`EvaluationError`]: a single solution could not be evaluated. The
//!   individual is marked infeasible and the generation continues.
//! - [`OperatorError`] / [`AlgorithmError`]: a pluggable operator broke its
//!   contract. Fatal to the run.
//! - [`ChannelDeliveryFault`]: a subscriber handler failed during a publish.
//!   Isolated to that subscriber.
//! - [`LifecycleError`]: the orchestrator could not start or stop a component
//!   within its window. Surfaced to the orchestrator's caller.
//!
//! Every enum provides `as_label()` returning a short stable snake_case label
//! for logs.

use std::time::Duration;
use thiserror::Error;

/// A single solution could not be evaluated against the current parameters.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// The problem model rejected the solution.
    #[error("evaluation failed: {0}")]
    Failed(String),

    /// The model returned a vector of the wrong length.
    #[error("expected {expected} objective values, got {actual}")]
    WrongArity {
        /// Declared number of objectives.
        expected: usize,
        /// Length of the returned vector.
        actual: usize,
    },

    /// The model returned NaN for an objective.
    #[error("objective {index} is NaN")]
    NotANumber {
        /// Index of the offending objective.
        index: usize,
    },

    /// An update record could not be applied to the current parameters.
    #[error("update rejected: {0}")]
    UpdateRejected(String),
}

impl EvaluationError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EvaluationError::Failed(_) => "evaluation_failed",
            EvaluationError::WrongArity { .. } => "evaluation_wrong_arity",
            EvaluationError::NotANumber { .. } => "evaluation_nan",
            EvaluationError::UpdateRejected(_) => "update_rejected",
        }
    }
}

/// Error raised by a selection, crossover or mutation operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operator}: {message}")]
pub struct OperatorError {
    /// Name of the operator that failed.
    pub operator: String,
    /// What went wrong.
    pub message: String,
}

impl OperatorError {
    /// Creates an operator error.
    pub fn new(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            message: message.into(),
        }
    }
}

/// Fatal error terminating an algorithm run.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlgorithmError {
    /// An operator violated its contract.
    #[error("operator `{operator}` violated its contract at generation {generation}: {message}")]
    Operator {
        /// Operator name.
        operator: String,
        /// Generation in which the violation happened.
        generation: usize,
        /// Diagnostic.
        message: String,
    },
}

impl AlgorithmError {
    pub(crate) fn operator(err: OperatorError, generation: usize) -> Self {
        AlgorithmError::Operator {
            operator: err.operator,
            generation,
            message: err.message,
        }
    }

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            AlgorithmError::Operator { .. } => "operator_fault",
        }
    }
}

/// Error returned by a channel subscriber handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Creates a handler error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A subscriber handler failed (returned `Err` or panicked) during a publish.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("delivery to subscriber {subscription} on channel `{channel}` failed: {message}")]
pub struct ChannelDeliveryFault {
    /// Name of the channel.
    pub channel: String,
    /// Raw id of the failing subscription.
    pub subscription: u64,
    /// Whether the handler panicked rather than returning `Err`.
    pub panicked: bool,
    /// Failure message.
    pub message: String,
}

impl ChannelDeliveryFault {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        if self.panicked {
            "delivery_panicked"
        } else {
            "delivery_failed"
        }
    }
}

/// Error produced by a streaming source while generating a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("source `{source_name}` failed: {message}")]
pub struct SourceError {
    /// Source name.
    pub source_name: String,
    /// Failure message.
    pub message: String,
}

impl SourceError {
    /// Creates a source error.
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Error returned by a result consumer.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// I/O failure while persisting a result.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other consumer-specific failure.
    #[error("{0}")]
    Other(String),
}

impl ConsumerError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConsumerError::Io(_) => "consumer_io",
            ConsumerError::Other(_) => "consumer_failed",
        }
    }
}

/// A problem instance file could not be loaded.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InstanceError {
    /// The file could not be read.
    #[error("cannot read instance: {0}")]
    Io(#[from] std::io::Error),

    /// A line could not be parsed.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// Only `EUC_2D` instances are supported.
    #[error("unsupported edge weight type `{0}`")]
    UnsupportedEdgeWeight(String),

    /// Two instances or matrices disagree on the number of cities.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Declared or reference dimension.
        expected: usize,
        /// Actual dimension.
        found: usize,
    },
}

impl InstanceError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            InstanceError::Io(_) => "instance_io",
            InstanceError::Parse { .. } => "instance_parse",
            InstanceError::UnsupportedEdgeWeight(_) => "instance_edge_weight",
            InstanceError::DimensionMismatch { .. } => "instance_dimension",
        }
    }
}

/// Invalid configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The orchestrator failed to start or stop a component in time.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// `start` was called outside a tokio runtime.
    #[error("no tokio runtime available to start the components")]
    NoRuntime,

    /// A streaming source did not stop within its window.
    #[error("source `{name}` did not stop within {timeout:?}")]
    SourceStopTimeout {
        /// Source name.
        name: String,
        /// Configured window.
        timeout: Duration,
    },

    /// The algorithm did not finish its current generation within the window.
    #[error("algorithm did not stop within {timeout:?}")]
    AlgorithmStopTimeout {
        /// Configured window.
        timeout: Duration,
    },

    /// The algorithm thread panicked.
    #[error("algorithm thread panicked: {0}")]
    AlgorithmPanicked(String),

    /// Consumers did not drain their queues within the window.
    #[error("consumers did not drain within {timeout:?}")]
    ConsumerDrainTimeout {
        /// Configured window.
        timeout: Duration,
    },
}

impl LifecycleError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::NoRuntime => "lifecycle_no_runtime",
            LifecycleError::SourceStopTimeout { .. } => "lifecycle_source_timeout",
            LifecycleError::AlgorithmStopTimeout { .. } => "lifecycle_algorithm_timeout",
            LifecycleError::AlgorithmPanicked(_) => "lifecycle_algorithm_panicked",
            LifecycleError::ConsumerDrainTimeout { .. } => "lifecycle_drain_timeout",
        }
    }
}

/// Error surfaced by the runtime orchestrator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A component could not be started or stopped.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The algorithm terminated with a fatal fault.
    #[error(transparent)]
    Algorithm(#[from] AlgorithmError),
}

impl RuntimeError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Lifecycle(e) => e.as_label(),
            RuntimeError::Algorithm(e) => e.as_label(),
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_fault_message_names_operator_and_generation() {
        let err = AlgorithmError::operator(OperatorError::new("pmx", "returned 3 children"), 7);
        let msg = err.to_string();
        assert!(msg.contains("pmx"), "{msg}");
        assert!(msg.contains("generation 7"), "{msg}");
        assert_eq!(err.as_label(), "operator_fault");
    }

    #[test]
    fn test_delivery_fault_labels() {
        let mut fault = ChannelDeliveryFault {
            channel: "fronts".into(),
            subscription: 3,
            panicked: false,
            message: "boom".into(),
        };
        assert_eq!(fault.as_label(), "delivery_failed");
        fault.panicked = true;
        assert_eq!(fault.as_label(), "delivery_panicked");
    }

    #[test]
    fn test_runtime_error_wraps_lifecycle() {
        let err: RuntimeError = LifecycleError::AlgorithmStopTimeout {
            timeout: Duration::from_secs(1),
        }
        .into();
        assert_eq!(err.as_label(), "lifecycle_algorithm_timeout");
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}
