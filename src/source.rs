//! Streaming sources of observed data.
//!
//! A [`StreamingSource`] produces one record per tick. [`spawn_source`] drives
//! it on a tokio task:
//!
//! ```text
//! interval tick ──► spawn_blocking { next_record() ; channel.publish(record) }
//!       ▲                          │
//!       └──── cancelled? ◄─────────┘
//! ```
//!
//! Generation runs on the blocking pool, so a slow or blocking source delays
//! only itself. Cancellation is checked before each tick; a record being
//! generated or published is always finished first.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::EventChannel;
use crate::error::{ConfigError, SourceError};
use crate::observed::ObservedRecord;

/// Producer of observed data.
///
/// `next_record` may block (file reads, polling a device); it runs on the
/// blocking pool.
pub trait StreamingSource: Send + 'static {
    /// Payload of each record.
    type Data: Send + Sync + 'static;

    /// Produces the next record. An `Err` skips this tick.
    fn next_record(&mut self) -> Result<Self::Data, SourceError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// [`StreamingSource`] backed by a closure.
///
/// ```
/// use u_dynopt::source::{from_fn, StreamingSource};
///
/// let mut n = 0;
/// let mut counter = from_fn("counter", move || {
///     n += 1;
///     Ok(n)
/// });
/// assert_eq!(counter.next_record().unwrap(), 1);
/// assert_eq!(counter.name(), "counter");
/// ```
pub struct FnSource<F> {
    name: String,
    generate: F,
}

/// Wraps a closure as a named [`StreamingSource`].
pub fn from_fn<T, F>(name: impl Into<String>, generate: F) -> FnSource<F>
where
    T: Send + Sync + 'static,
    F: FnMut() -> Result<T, SourceError> + Send + 'static,
{
    FnSource {
        name: name.into(),
        generate,
    }
}

impl<T, F> StreamingSource for FnSource<F>
where
    T: Send + Sync + 'static,
    F: FnMut() -> Result<T, SourceError> + Send + 'static,
{
    type Data = T;

    fn next_record(&mut self) -> Result<T, SourceError> {
        (self.generate)()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Scheduling of a spawned source.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SourceConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Emit the first record immediately instead of after one interval.
    pub emit_on_start: bool,
    /// Stop after this many published records.
    pub max_records: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            emit_on_start: false,
            max_records: None,
        }
    }
}

impl SourceConfig {
    /// Creates a config ticking every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Emits the first record without waiting one interval.
    pub fn with_emit_on_start(mut self, yes: bool) -> Self {
        self.emit_on_start = yes;
        self
    }

    /// Stops the source after `n` published records.
    pub fn with_max_records(mut self, n: u64) -> Self {
        self.max_records = Some(n);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::new("source interval must be positive"));
        }
        Ok(())
    }
}

/// Counters of a stopped source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    /// Source name.
    pub name: String,
    /// Records generated and published.
    pub records_published: u64,
    /// Ticks skipped because `next_record` failed.
    pub generation_failures: u64,
    /// Subscriber handler failures across all publishes.
    pub delivery_failures: u64,
    /// Whether `next_record` panicked (the source stops).
    pub panicked: bool,
}

/// Spawns `source` on the current tokio runtime, publishing each record on
/// `channel` until `cancel` fires or `max_records` is reached.
///
/// # Panics
///
/// Panics if called outside a tokio runtime, like `tokio::spawn`.
pub fn spawn_source<S: StreamingSource>(
    source: S,
    channel: EventChannel<ObservedRecord<S::Data>>,
    config: SourceConfig,
    cancel: CancellationToken,
) -> JoinHandle<SourceReport> {
    tokio::spawn(run_source(source, channel, config, cancel))
}

async fn run_source<S: StreamingSource>(
    source: S,
    channel: EventChannel<ObservedRecord<S::Data>>,
    config: SourceConfig,
    cancel: CancellationToken,
) -> SourceReport {
    let name = source.name().to_string();
    let mut report = SourceReport {
        name: name.clone(),
        ..SourceReport::default()
    };

    let period = config.interval.max(Duration::from_millis(1));
    let first = if config.emit_on_start {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(source = %name, channel = channel.name(), interval = ?period, "source started");
    let mut slot = Some(source);

    while let Some(mut source) = slot.take() {
        if config
            .max_records
            .is_some_and(|max| report.records_published >= max)
        {
            break;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sequence = report.records_published;
        let out = channel.clone();
        let tick = tokio::task::spawn_blocking(move || {
            let outcome = source
                .next_record()
                .map(|data| out.publish(&ObservedRecord::new(sequence, data)));
            (source, outcome)
        })
        .await;

        match tick {
            Ok((source, Ok(delivery))) => {
                slot = Some(source);
                report.records_published += 1;
                report.delivery_failures += delivery.failed as u64;
                debug!(
                    source = %name,
                    sequence,
                    delivered = delivery.delivered,
                    failed = delivery.failed,
                    "record published"
                );
            }
            Ok((source, Err(err))) => {
                slot = Some(source);
                report.generation_failures += 1;
                warn!(source = %name, "{err}");
            }
            Err(join) => {
                report.panicked = join.is_panic();
                error!(source = %name, "source task failed: {join}");
            }
        }
    }

    info!(
        source = %name,
        records = report.records_published,
        failures = report.generation_failures,
        "source stopped"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use std::sync::{Arc, Mutex};

    fn collecting_channel() -> (EventChannel<ObservedRecord<u32>>, Arc<Mutex<Vec<(u64, u32)>>>) {
        let channel = EventChannel::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        channel.subscribe(move |r: &ObservedRecord<u32>| {
            sink.lock().unwrap().push((r.sequence(), *r.data()));
            Ok(())
        });
        (channel, seen)
    }

    fn counter() -> FnSource<impl FnMut() -> Result<u32, SourceError> + Send + 'static> {
        let mut n = 0;
        from_fn("counter", move || {
            n += 1;
            Ok(n)
        })
    }

    #[tokio::test]
    async fn test_publishes_in_sequence_until_max_records() {
        let (channel, seen) = collecting_channel();
        let config = SourceConfig::every(Duration::from_millis(5)).with_max_records(3);
        let report = spawn_source(counter(), channel, config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.name, "counter");
        assert_eq!(report.records_published, 3);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[tokio::test]
    async fn test_generation_failure_skips_tick() {
        let (channel, seen) = collecting_channel();
        let mut n = 0u32;
        let flaky = from_fn("flaky", move || {
            n += 1;
            if n % 2 == 0 {
                Err(SourceError::new("flaky", "even tick"))
            } else {
                Ok(n)
            }
        });
        let config = SourceConfig::every(Duration::from_millis(2)).with_max_records(2);
        let report = spawn_source(flaky, channel, config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records_published, 2);
        assert_eq!(report.generation_failures, 1);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 1), (1, 3)]);
    }

    #[tokio::test]
    async fn test_cancel_before_first_tick() {
        let (channel, seen) = collecting_channel();
        let cancel = CancellationToken::new();
        let handle = spawn_source(
            counter(),
            channel,
            SourceConfig::every(Duration::from_secs(3600)),
            cancel.clone(),
        );
        cancel.cancel();
        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.records_published, 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emit_on_start() {
        let (channel, seen) = collecting_channel();
        let config = SourceConfig::every(Duration::from_secs(3600))
            .with_emit_on_start(true)
            .with_max_records(1);
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            spawn_source(counter(), channel, config, CancellationToken::new()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(report.records_published, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failures_are_counted() {
        let channel: EventChannel<ObservedRecord<u32>> =
            EventChannel::new("failing").with_failure_sink(|_| {});
        channel.subscribe(|_: &ObservedRecord<u32>| Err(HandlerError::new("nope")));
        let config = SourceConfig::every(Duration::from_millis(2)).with_max_records(2);
        let report = spawn_source(counter(), channel, config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records_published, 2);
        assert_eq!(report.delivery_failures, 2);
    }

    #[tokio::test]
    async fn test_panicking_source_stops() {
        let (channel, _) = collecting_channel();
        let boom = from_fn("boom", || -> Result<u32, SourceError> { panic!("generator exploded") });
        let config = SourceConfig::every(Duration::from_millis(2)).with_emit_on_start(true);
        let report = spawn_source(boom, channel, config, CancellationToken::new())
            .await
            .unwrap();

        assert!(report.panicked);
        assert_eq!(report.records_published, 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(SourceConfig::default().validate().is_ok());
        assert_eq!(SourceConfig::default().interval, Duration::from_secs(5));
        assert!(SourceConfig::every(Duration::ZERO).validate().is_err());
    }
}
