//! Non-blocking fan-out of published solution sets.
//!
//! ```text
//! channel.publish(data)  (algorithm thread)
//!     │
//!     └─► dispatcher ──try_send──► [queue 1] ──► worker 1 ──► consumer1.on_data()
//!                    ├─try_send──► [queue 2] ──► worker 2 ──► consumer2.on_data()
//!                    └─try_send──► [queue N] ──► worker N ──► consumerN.on_data()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: dispatch uses `try_send` and returns immediately
//! - **Overflow**: a full queue drops that snapshot for that consumer only
//! - **Per-consumer FIFO**: each consumer sees snapshots in publish order
//! - **Isolation**: errors and panics are caught per consumer and logged

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Consume;
use crate::algorithm::FrontChannel;
use crate::channel::SubscriptionId;
use crate::error::panic_message;
use crate::observed::AlgorithmObservedData;

/// Counters of one consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsumerStats {
    /// Consumer name.
    pub name: String,
    /// Snapshots handled successfully.
    pub processed: u64,
    /// Snapshots for which `on_data` returned `Err`.
    pub failed: u64,
    /// Snapshots for which `on_data` panicked.
    pub panicked: u64,
    /// Snapshots dropped because the queue was full or closed.
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self, name: &str) -> ConsumerStats {
        ConsumerStats {
            name: name.to_string(),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

struct Lane<S> {
    name: String,
    sender: mpsc::Sender<Arc<AlgorithmObservedData<S>>>,
    counters: Arc<Counters>,
}

struct Dispatcher<S> {
    lanes: RwLock<Vec<Lane<S>>>,
}

impl<S> Dispatcher<S> {
    fn emit(&self, data: &Arc<AlgorithmObservedData<S>>) {
        let lanes = self.lanes.read().unwrap_or_else(|e| e.into_inner());
        for lane in lanes.iter() {
            let reason = match lane.sender.try_send(Arc::clone(data)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            lane.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                consumer = %lane.name,
                generation = data.generation(),
                reason,
                "snapshot dropped"
            );
        }
    }
}

/// Fan-out coordinator for result consumers.
///
/// Workers are spawned on the current tokio runtime when the set is created
/// and run until [`shutdown`](Self::shutdown).
pub struct ConsumerSet<S: Send + Sync + 'static> {
    dispatcher: Arc<Dispatcher<S>>,
    workers: Vec<(String, Arc<Counters>, JoinHandle<()>)>,
    attached: Mutex<Vec<(FrontChannel<S>, SubscriptionId)>>,
}

impl<S: Send + Sync + 'static> ConsumerSet<S> {
    /// Creates the set and spawns one worker per consumer.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, like `tokio::spawn`.
    #[must_use]
    pub fn new(consumers: Vec<Arc<dyn Consume<S>>>) -> Self {
        let mut lanes = Vec::with_capacity(consumers.len());
        let mut workers = Vec::with_capacity(consumers.len());

        for consumer in consumers {
            let name = consumer.name().to_string();
            let (tx, mut rx) = mpsc::channel::<Arc<AlgorithmObservedData<S>>>(consumer.queue_capacity().max(1));
            let counters = Arc::new(Counters::default());

            let worker_counters = Arc::clone(&counters);
            let worker_name = name.clone();
            let handle = tokio::spawn(async move {
                while let Some(data) = rx.recv().await {
                    let generation = data.generation();
                    match AssertUnwindSafe(consumer.on_data(data)).catch_unwind().await {
                        Ok(Ok(())) => {
                            worker_counters.processed.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Err(err)) => {
                            worker_counters.failed.fetch_add(1, Ordering::Relaxed);
                            warn!(consumer = %worker_name, generation, label = err.as_label(), "{err}");
                        }
                        Err(payload) => {
                            worker_counters.panicked.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                consumer = %worker_name,
                                generation,
                                "consumer panicked: {}",
                                panic_message(payload.as_ref())
                            );
                        }
                    }
                }
                debug!(consumer = %worker_name, "consumer worker drained");
            });

            lanes.push(Lane {
                name: name.clone(),
                sender: tx,
                counters: Arc::clone(&counters),
            });
            workers.push((name, counters, handle));
        }

        Self {
            dispatcher: Arc::new(Dispatcher {
                lanes: RwLock::new(lanes),
            }),
            workers,
            attached: Mutex::new(Vec::new()),
        }
    }

    /// Number of consumers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the set has no consumers.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Queues `data` for every consumer without blocking.
    pub fn emit(&self, data: &Arc<AlgorithmObservedData<S>>) {
        self.dispatcher.emit(data);
    }

    /// Subscribes the dispatcher to `channel`. Every snapshot published there
    /// from now on is queued for every consumer.
    pub fn attach(&self, channel: &FrontChannel<S>) -> SubscriptionId {
        let dispatcher = Arc::clone(&self.dispatcher);
        let id = channel.subscribe(move |data: &Arc<AlgorithmObservedData<S>>| {
            dispatcher.emit(data);
            Ok(())
        });
        self.attached
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((channel.clone(), id));
        id
    }

    /// Unsubscribes from every attached channel.
    pub fn detach(&self) {
        let attached = std::mem::take(&mut *self.attached.lock().unwrap_or_else(|e| e.into_inner()));
        for (channel, id) in attached {
            channel.unsubscribe(id);
        }
    }

    /// Current counters of every consumer.
    pub fn stats(&self) -> Vec<ConsumerStats> {
        self.workers
            .iter()
            .map(|(name, counters, _)| counters.snapshot(name))
            .collect()
    }

    /// Detaches, closes every queue and waits for the workers to drain what
    /// was already queued. Returns the final counters.
    pub async fn shutdown(self) -> Vec<ConsumerStats> {
        self.detach();
        // Dropping the senders closes the queues; workers exit once empty.
        self.dispatcher
            .lanes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();

        let mut stats = Vec::with_capacity(self.workers.len());
        for (name, counters, handle) in self.workers {
            if let Err(err) = handle.await {
                warn!(consumer = %name, "consumer worker failed: {err}");
            }
            stats.push(counters.snapshot(&name));
        }
        stats
    }
}
