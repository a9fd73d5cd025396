//! In-memory holder of the most recent solution set.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::Consume;
use crate::error::ConsumerError;
use crate::observed::AlgorithmObservedData;

type Slot<S> = Option<Arc<AlgorithmObservedData<S>>>;

/// Keeps the latest published solution set.
///
/// Query it with [`latest`](Self::latest), or follow updates through a
/// [`watch`] receiver from [`watch`](Self::watch).
pub struct LatestFront<S> {
    name: String,
    tx: watch::Sender<Slot<S>>,
}

impl<S> Default for LatestFront<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> LatestFront<S> {
    /// Creates an empty holder.
    pub fn new() -> Self {
        Self::named("latest-front")
    }

    /// Creates an empty holder with a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Most recent solution set, if any was received.
    pub fn latest(&self) -> Option<Arc<AlgorithmObservedData<S>>> {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every new set.
    pub fn watch(&self) -> watch::Receiver<Slot<S>> {
        self.tx.subscribe()
    }

    /// Waits until a set of at least `generation` has been received.
    pub async fn wait_for_generation(&self, generation: usize) -> Arc<AlgorithmObservedData<S>> {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(data) = rx
                .borrow_and_update()
                .as_ref()
                .filter(|d| d.generation() >= generation)
            {
                return Arc::clone(data);
            }
            // The sender lives in `self`, so `changed` cannot fail here.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[async_trait]
impl<S: Send + Sync + 'static> Consume<S> for LatestFront<S> {
    async fn on_data(&self, data: Arc<AlgorithmObservedData<S>>) -> Result<(), ConsumerError> {
        self.tx.send_replace(Some(data));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn queue_capacity(&self) -> usize {
        16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Candidate;
    use std::time::Duration;

    fn data(generation: usize) -> Arc<AlgorithmObservedData<u8>> {
        Arc::new(AlgorithmObservedData::new(generation, 0, 0, 0, Vec::<Candidate<u8>>::new()))
    }

    #[tokio::test]
    async fn test_latest_replaces_previous() {
        let front = LatestFront::new();
        assert!(front.latest().is_none());
        front.on_data(data(1)).await.unwrap();
        front.on_data(data(2)).await.unwrap();
        assert_eq!(front.latest().unwrap().generation(), 2);
        assert_eq!(Consume::<u8>::name(&front), "latest-front");
    }

    #[tokio::test]
    async fn test_watch_sees_updates() {
        let front = LatestFront::named("watched");
        let mut rx = front.watch();
        front.on_data(data(7)).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().generation(), 7);
    }

    #[tokio::test]
    async fn test_wait_for_generation() {
        let front = Arc::new(LatestFront::new());
        let feeder = Arc::clone(&front);
        tokio::spawn(async move {
            for g in 1..=5 {
                tokio::time::sleep(Duration::from_millis(2)).await;
                feeder.on_data(data(g)).await.unwrap();
            }
        });
        let reached = tokio::time::timeout(Duration::from_secs(5), front.wait_for_generation(4))
            .await
            .unwrap();
        assert!(reached.generation() >= 4);
    }
}
