//! Orchestrator configuration.

use std::time::Duration;

/// Shutdown windows of the runtime orchestrator.
///
/// Each stage of the teardown is bounded by its own window; an overrun is
/// reported as a [`LifecycleError`](crate::error::LifecycleError).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuntimeConfig {
    /// Time each source gets to finish its in-flight record.
    pub source_stop_timeout: Duration,
    /// Time the algorithm gets to finish its current generation.
    pub algorithm_stop_timeout: Duration,
    /// Time consumers get to drain their queues.
    pub consumer_drain_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            source_stop_timeout: Duration::from_secs(5),
            algorithm_stop_timeout: Duration::from_secs(30),
            consumer_drain_timeout: Duration::from_secs(10),
        }
    }
}

impl RuntimeConfig {
    /// Sets the source stop window.
    pub fn with_source_stop_timeout(mut self, timeout: Duration) -> Self {
        self.source_stop_timeout = timeout;
        self
    }

    /// Sets the algorithm stop window.
    pub fn with_algorithm_stop_timeout(mut self, timeout: Duration) -> Self {
        self.algorithm_stop_timeout = timeout;
        self
    }

    /// Sets the consumer drain window.
    pub fn with_consumer_drain_timeout(mut self, timeout: Duration) -> Self {
        self.consumer_drain_timeout = timeout;
        self
    }

    /// Short windows for tests and interactive tools.
    pub fn fast() -> Self {
        Self {
            source_stop_timeout: Duration::from_secs(1),
            algorithm_stop_timeout: Duration::from_secs(5),
            consumer_drain_timeout: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = RuntimeConfig::default();
        assert_eq!(config.algorithm_stop_timeout, Duration::from_secs(30));

        let config = RuntimeConfig::fast()
            .with_source_stop_timeout(Duration::from_millis(10))
            .with_algorithm_stop_timeout(Duration::from_millis(20))
            .with_consumer_drain_timeout(Duration::from_millis(30));
        assert_eq!(config.source_stop_timeout, Duration::from_millis(10));
        assert_eq!(config.algorithm_stop_timeout, Duration::from_millis(20));
        assert_eq!(config.consumer_drain_timeout, Duration::from_millis(30));
    }
}
