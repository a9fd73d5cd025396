//! Typed publish/subscribe channel with snapshot-at-publish delivery.
//!
//! [`EventChannel`] decouples producers of records from any number of
//! subscribers. Delivery is synchronous: [`publish`](EventChannel::publish)
//! invokes every handler registered when the publish began, in registration
//! order, and returns after the last one.
//!
//! ```text
//! publish(record)
//!     │  snapshot = [h1, h2, h3]      (taken under a short read lock)
//!     ├──► h1(record)  ── Err ──► failure sink (logged, delivery continues)
//!     ├──► h2(record)  ── panic ─► failure sink
//!     └──► h3(record)
//! ```
//!
//! # Rules
//!
//! - Publishes on one channel are serialized: every subscriber sees records in
//!   the same order.
//! - Subscribing or unsubscribing while a publish is in flight is safe; the
//!   in-flight publish keeps using its snapshot.
//! - A failing handler never prevents delivery to the others. No retries.
//! - A handler must not publish on the channel it is subscribed to.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::warn;

use crate::error::{panic_message, ChannelDeliveryFault, HandlerError};

/// Identity of one subscription on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Handlers that completed successfully.
    pub delivered: usize,
    /// Handlers that returned `Err` or panicked.
    pub failed: usize,
}

type Handler<T> = Arc<dyn Fn(&T) -> Result<(), HandlerError> + Send + Sync>;
type FailureSink = Arc<dyn Fn(&ChannelDeliveryFault) + Send + Sync>;

struct Inner<T> {
    name: String,
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Handler<T>)>>,
    publish_order: Mutex<()>,
    failures: AtomicU64,
    published: AtomicU64,
    sink: RwLock<Option<FailureSink>>,
}

/// Named publish/subscribe channel.
///
/// Cheap to clone: clones share the same subscriber list.
pub struct EventChannel<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.inner.name)
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.published())
            .finish()
    }
}

impl<T> EventChannel<T> {
    /// Creates an empty channel. The name appears in logs and faults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                next_id: AtomicU64::new(1),
                subscribers: RwLock::new(Vec::new()),
                publish_order: Mutex::new(()),
                failures: AtomicU64::new(0),
                published: AtomicU64::new(0),
                sink: RwLock::new(None),
            }),
        }
    }

    /// Installs a custom failure sink, replacing the default logging one.
    ///
    /// The sink is called once per failed handler invocation.
    pub fn with_failure_sink<F>(self, sink: F) -> Self
    where
        F: Fn(&ChannelDeliveryFault) + Send + Sync + 'static,
    {
        *self.inner.sink.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(sink));
        self
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Registers a handler and returns its subscription id.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a subscription. Returns `false` if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Total handler failures since creation.
    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    /// Total publishes since creation.
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Delivers `record` to every handler registered when the call begins.
    pub fn publish(&self, record: &T) -> Delivery {
        let _order = self
            .inner
            .publish_order
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let snapshot: Vec<(SubscriptionId, Handler<T>)> = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut delivery = Delivery::default();
        for (id, handler) in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| (**handler)(record)));
            let fault = match outcome {
                Ok(Ok(())) => {
                    delivery.delivered += 1;
                    continue;
                }
                Ok(Err(err)) => ChannelDeliveryFault {
                    channel: self.inner.name.clone(),
                    subscription: id.get(),
                    panicked: false,
                    message: err.to_string(),
                },
                Err(payload) => ChannelDeliveryFault {
                    channel: self.inner.name.clone(),
                    subscription: id.get(),
                    panicked: true,
                    message: panic_message(payload.as_ref()),
                },
            };
            delivery.failed += 1;
            self.report(&fault);
        }

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        delivery
    }

    fn report(&self, fault: &ChannelDeliveryFault) {
        self.inner.failures.fetch_add(1, Ordering::Relaxed);
        let sink = self
            .inner
            .sink
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match sink {
            Some(sink) => (*sink)(fault),
            None => warn!(
                channel = %fault.channel,
                subscription = fault.subscription,
                label = fault.as_label(),
                "{}",
                fault.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn test_delivers_in_registration_order() {
        let channel = EventChannel::<u32>::new("test");
        let log = Arc::new(StdMutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            channel.subscribe(move |v: &u32| {
                log.lock().unwrap().push(format!("{tag}{v}"));
                Ok(())
            });
        }

        let d = channel.publish(&1);
        channel.publish(&2);

        assert_eq!(d, Delivery { delivered: 3, failed: 0 });
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a1", "b1", "c1", "a2", "b2", "c2"]
        );
        assert_eq!(channel.published(), 2);
    }

    #[test]
    fn test_failing_handler_does_not_abort_delivery() {
        let faults = Arc::new(StdMutex::new(Vec::new()));
        let faults_sink = Arc::clone(&faults);
        let channel = EventChannel::<u32>::new("faulty").with_failure_sink(move |f| {
            faults_sink.lock().unwrap().push(f.clone());
        });
        let seen = Arc::new(AtomicU64::new(0));

        channel.subscribe(|_| Err(HandlerError::new("nope")));
        channel.subscribe(|_| panic!("handler exploded"));
        let seen_c = Arc::clone(&seen);
        channel.subscribe(move |v| {
            seen_c.fetch_add(u64::from(*v), Ordering::SeqCst);
            Ok(())
        });

        let d = channel.publish(&5);

        assert_eq!(d, Delivery { delivered: 1, failed: 2 });
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(channel.failures(), 2);
        let faults = faults.lock().unwrap();
        assert!(!faults[0].panicked);
        assert_eq!(faults[0].message, "nope");
        assert!(faults[1].panicked);
        assert_eq!(faults[1].message, "handler exploded");
    }

    #[test]
    fn test_unsubscribe() {
        let channel = EventChannel::<u32>::new("test");
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let id = channel.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        channel.publish(&0);
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.publish(&0);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_during_publish_uses_snapshot() {
        let channel = EventChannel::<u32>::new("reentrant");
        let late_calls = Arc::new(AtomicU64::new(0));

        let ch = channel.clone();
        let late = Arc::clone(&late_calls);
        channel.subscribe(move |_| {
            let late = Arc::clone(&late);
            ch.subscribe(move |_| {
                late.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        channel.publish(&1);
        // The handler added during the first publish missed it.
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        channel.publish(&2);
        // One late subscriber from publish #1 saw publish #2.
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_self_during_publish() {
        let channel = EventChannel::<u32>::new("self-remove");
        let calls = Arc::new(AtomicU64::new(0));
        let id_cell = Arc::new(StdMutex::new(None::<SubscriptionId>));

        let ch = channel.clone();
        let cell = Arc::clone(&id_cell);
        let c = Arc::clone(&calls);
        let id = channel.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *cell.lock().unwrap() {
                ch.unsubscribe(id);
            }
            Ok(())
        });
        *id_cell.lock().unwrap() = Some(id);

        channel.publish(&1);
        channel.publish(&2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_publishers_keep_one_order_for_all_subscribers() {
        let channel = EventChannel::<u64>::new("concurrent");
        let a = Arc::new(StdMutex::new(Vec::new()));
        let b = Arc::new(StdMutex::new(Vec::new()));
        for log in [&a, &b] {
            let log = Arc::clone(log);
            channel.subscribe(move |v| {
                log.lock().unwrap().push(*v);
                Ok(())
            });
        }

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let ch = channel.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        ch.publish(&(t * 1000 + i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let a = a.lock().unwrap();
        let b = b.lock().unwrap();
        assert_eq!(a.len(), 400);
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let channel = EventChannel::<()>::new("ids");
        let a = channel.subscribe(|_| Ok(()));
        let b = channel.subscribe(|_| Ok(()));
        assert_ne!(a, b);
        assert_eq!(format!("{a}"), format!("#{}", a.get()));
    }
}
